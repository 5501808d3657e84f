//! Arduino firmware emitter.
//!
//! Turns validated LED configurations into a self-contained `.ino` sketch
//! whose runtime implements the engine's transition table against `millis()`
//! and `random()`. Only the configuration table depends on the input; the
//! preamble and the runtime body are the same for every export.

use std::fmt;

use log::debug;

use crate::config::{DurationRange, Fade, LedConfig};
use crate::engine::Mode;

/// Generate the sketch for `configs`, one table row per LED in order.
///
/// Expects at least one validated configuration. Millisecond values beyond
/// the 32-bit `unsigned long` range of the board are clamped to its maximum.
#[must_use]
pub fn emit_firmware(configs: &[LedConfig]) -> String {
    debug!("Emitting firmware for {} LEDs", configs.len());
    Sketch(configs).to_string()
}

struct Sketch<'a>(&'a [LedConfig]);

impl fmt::Display for Sketch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(HEADER)?;
        for mode in Mode::ALL {
            writeln!(f, "#define {:<14}{}", mode.firmware_constant(), mode.code())?;
        }
        f.write_str(RECORD)?;

        f.write_str(TABLE_OPEN)?;
        for (index, config) in self.0.iter().enumerate() {
            write_row(f, index, config)?;
        }
        f.write_str(TABLE_CLOSE)?;

        f.write_str(RUNTIME)
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, index: usize, config: &LedConfig) -> fmt::Result {
    let vb = config.variable_brightness();
    let blink = config.blink();

    writeln!(f, "  // LED {} ({})", index + 1, config.profile())?;
    f.write_str("  {\n")?;
    writeln!(f, "    {},", config.pin())?;
    writeln!(f, "    {}, // on", range(config.on()))?;
    writeln!(f, "    {}, // off", range(config.off()))?;
    writeln!(f, "    {}, // fade in", fade(config.fade_in()))?;
    writeln!(f, "    {}, // fade out", fade(config.fade_out()))?;
    writeln!(f, "    {}, {}, {}, // brightness", vb.enabled, vb.min, vb.max)?;
    writeln!(
        f,
        "    {}, {}, {} // blink",
        config.blink_active(),
        millis(u64::from(blink.on_ms)),
        millis(u64::from(blink.off_ms))
    )?;
    f.write_str("  },\n")
}

fn millis(ms: u64) -> String {
    format!("{}UL", ms.min(u64::from(u32::MAX)))
}

fn range(range: DurationRange) -> String {
    format!("{}, {}", millis(range.min_ms), millis(range.max_ms))
}

fn fade(fade: Fade) -> String {
    format!("{}, {}", fade.enabled, range(fade.range))
}

const HEADER: &str = "\
// Generated by railglow. Edit the layout and export again instead of
// changing this file by hand. All times are in milliseconds.

";

const RECORD: &str = "
struct LedConfig {
  int pin;
  unsigned long minOnMillis;
  unsigned long maxOnMillis;
  unsigned long minOffMillis;
  unsigned long maxOffMillis;
  bool fadeInEnabled;
  unsigned long minFadeInMillis;
  unsigned long maxFadeInMillis;
  bool fadeOutEnabled;
  unsigned long minFadeOutMillis;
  unsigned long maxFadeOutMillis;
  // Brightness is chosen once per ON phase and for every blink flash
  bool variableBrightnessEnabled;
  int minBrightness;
  int maxBrightness;
  bool blinkEnabled;
  unsigned long blinkOnMillis;
  unsigned long blinkOffMillis;
};

";

const TABLE_OPEN: &str = "LedConfig ledConfigs[] = {\n";

const TABLE_CLOSE: &str = "};\n";

const RUNTIME: &str = r#"
const int NUM_LEDS = sizeof(ledConfigs) / sizeof(ledConfigs[0]);

struct LedState {
  int mode;
  int brightness;
  unsigned long phaseStart;
  unsigned long phaseDuration;
  int fadeTarget;
  int fadeFrom;
  bool blinkHigh;
  unsigned long blinkStart;
};

LedState ledStates[NUM_LEDS];

unsigned long lastTick = 0;
bool ticked = false;

unsigned long sampleRange(unsigned long lo, unsigned long hi) {
  if (lo >= hi) {
    return lo;
  }
  // random() takes a signed long
  unsigned long span = hi - lo;
  if (span > 0x7FFFFFFEUL) {
    span = 0x7FFFFFFEUL;
  }
  return lo + (unsigned long)random(0L, (long)span + 1L);
}

int sampleBrightness(int lo, int hi) {
  if (lo >= hi) {
    return lo;
  }
  return (int)random(lo, hi + 1);
}

int onBrightness(const LedConfig &cfg) {
  if (cfg.variableBrightnessEnabled) {
    return sampleBrightness(cfg.minBrightness, cfg.maxBrightness);
  }
  return 255;
}

int fadeLevel(unsigned long elapsed, unsigned long duration, int from, int to) {
  if (duration == 0) {
    return from;
  }
  long long level = (long long)elapsed * (to - from) / (long long)duration + from;
  if (level < 0) {
    level = 0;
  }
  if (level > 255) {
    level = 255;
  }
  return (int)level;
}

bool isDark(const LedConfig &cfg) {
  bool noOn = cfg.minOnMillis == 0 && cfg.maxOnMillis == 0;
  bool noOff = cfg.minOffMillis == 0 && cfg.maxOffMillis == 0;
  return noOn && !noOff;
}

void writeLed(int i) {
  analogWrite(ledConfigs[i].pin, ledStates[i].brightness);
}

const char *modeLabel(int mode) {
  switch (mode) {
    case MODE_ON: return "ON";
    case MODE_FADE_IN: return "FADE_IN";
    case MODE_FADE_OUT: return "FADE_OUT";
    case MODE_BLINK: return "BLINK";
    default: return "OFF";
  }
}

void beginPhase(int i, int mode, unsigned long now) {
  if (ledStates[i].mode != mode) {
    Serial.print("LED pin ");
    Serial.print(ledConfigs[i].pin);
    Serial.print(": ");
    Serial.print(modeLabel(ledStates[i].mode));
    Serial.print(" -> ");
    Serial.println(modeLabel(mode));
  }
  ledStates[i].mode = mode;
  ledStates[i].phaseStart = now;
}

void enterOff(int i, unsigned long now) {
  const LedConfig &cfg = ledConfigs[i];
  beginPhase(i, MODE_OFF, now);
  ledStates[i].blinkHigh = false;
  ledStates[i].brightness = 0;
  ledStates[i].phaseDuration = sampleRange(cfg.minOffMillis, cfg.maxOffMillis);
  writeLed(i);
}

void enterOn(int i, unsigned long now, int brightness) {
  const LedConfig &cfg = ledConfigs[i];
  beginPhase(i, MODE_ON, now);
  ledStates[i].brightness = brightness;
  ledStates[i].phaseDuration = sampleRange(cfg.minOnMillis, cfg.maxOnMillis);
  writeLed(i);
}

void enterFadeIn(int i, unsigned long now) {
  const LedConfig &cfg = ledConfigs[i];
  beginPhase(i, MODE_FADE_IN, now);
  ledStates[i].phaseDuration = sampleRange(cfg.minFadeInMillis, cfg.maxFadeInMillis);
  ledStates[i].fadeTarget = onBrightness(cfg);
  ledStates[i].brightness = 0;
  writeLed(i);
  if (ledStates[i].phaseDuration == 0) {
    enterOn(i, now, ledStates[i].fadeTarget);
  }
}

void enterFadeOut(int i, unsigned long now) {
  const LedConfig &cfg = ledConfigs[i];
  beginPhase(i, MODE_FADE_OUT, now);
  ledStates[i].phaseDuration = sampleRange(cfg.minFadeOutMillis, cfg.maxFadeOutMillis);
  ledStates[i].fadeFrom = ledStates[i].brightness;
  if (ledStates[i].phaseDuration == 0) {
    enterOff(i, now);
  }
}

void enterBlink(int i, unsigned long now) {
  const LedConfig &cfg = ledConfigs[i];
  beginPhase(i, MODE_BLINK, now);
  ledStates[i].phaseDuration = sampleRange(cfg.minOnMillis, cfg.maxOnMillis);
  ledStates[i].blinkHigh = true;
  ledStates[i].blinkStart = now;
  ledStates[i].brightness = sampleBrightness(cfg.minBrightness, cfg.maxBrightness);
  writeLed(i);
}

void advanceLed(int i, unsigned long now) {
  const LedConfig &cfg = ledConfigs[i];
  LedState &st = ledStates[i];
  unsigned long elapsed = now - st.phaseStart;
  bool phaseOver = elapsed >= st.phaseDuration;

  switch (st.mode) {
    case MODE_OFF:
      if (!phaseOver) {
        break;
      }
      if (isDark(cfg)) {
        enterOff(i, now);
      } else if (cfg.fadeInEnabled) {
        enterFadeIn(i, now);
      } else if (cfg.blinkEnabled) {
        enterBlink(i, now);
      } else {
        enterOn(i, now, onBrightness(cfg));
      }
      break;

    case MODE_ON:
      if (!phaseOver) {
        break;
      }
      if (cfg.fadeOutEnabled) {
        enterFadeOut(i, now);
      } else {
        enterOff(i, now);
      }
      break;

    case MODE_FADE_IN:
      if (phaseOver) {
        enterOn(i, now, st.fadeTarget);
      } else {
        st.brightness = fadeLevel(elapsed, st.phaseDuration, 0, st.fadeTarget);
        writeLed(i);
      }
      break;

    case MODE_FADE_OUT:
      if (phaseOver) {
        enterOff(i, now);
      } else {
        st.brightness = fadeLevel(elapsed, st.phaseDuration, st.fadeFrom, 0);
        writeLed(i);
      }
      break;

    case MODE_BLINK:
      if (phaseOver) {
        enterOff(i, now);
      } else if (st.blinkHigh && now - st.blinkStart >= cfg.blinkOnMillis) {
        st.brightness = 0;
        st.blinkHigh = false;
        st.blinkStart = now;
        writeLed(i);
      } else if (!st.blinkHigh && now - st.blinkStart >= cfg.blinkOffMillis) {
        st.brightness = sampleBrightness(cfg.minBrightness, cfg.maxBrightness);
        st.blinkHigh = true;
        st.blinkStart = now;
        writeLed(i);
      }
      break;
  }
}

void setup() {
  Serial.begin(9600);
  randomSeed(analogRead(A0));
  unsigned long now = millis();
  for (int i = 0; i < NUM_LEDS; i++) {
    pinMode(ledConfigs[i].pin, OUTPUT);
    ledStates[i].mode = MODE_OFF;
    enterOff(i, now);
  }
}

void loop() {
  unsigned long now = millis();
  if (ticked && now == lastTick) {
    return;
  }
  ticked = true;
  lastTick = now;
  for (int i = 0; i < NUM_LEDS; i++) {
    advanceLed(i, now);
  }
}
"#;

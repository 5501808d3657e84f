//! Built-in light profiles.
//!
//! A profile is a named preset that supplies default values for every field
//! of a [`LedConfig`] and decides which behaviors the LED may use. The
//! capability rules live in exactly one place, [`LightProfile::capabilities`],
//! which both the validator and any editing surface consult.

use std::fmt;

use crate::config::{Blink, DurationRange, Fade, LedConfig, VariableBrightness};

/// One year in milliseconds. The "Disabled" profile uses it as off time so a
/// disabled LED never wakes up in practice.
const DISABLED_OFF_MS: u64 = 31_536_000 * 1000;

/// Named preset bundling field defaults and capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LightProfile {
    /// Never lights up.
    #[default]
    Disabled,
    /// Slow fades with a random brightness per evening.
    LivingRoom,
    /// Short on/off periods at full brightness.
    Hall,
    /// Flickering television glow; the only profile allowed to blink.
    TvSimulation,
    /// Plain random on/off without fading.
    RandomOnOff,
}

/// Which behaviors a LED may enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub allow_blink: bool,
    pub allow_fade: bool,
    pub allow_variable_brightness: bool,
}

impl Capabilities {
    /// Narrow the capabilities for a LED whose blink flag is `blink_enabled`.
    ///
    /// Blinking and fading are mutually exclusive, so an active blink removes
    /// the fade capability. Variable brightness stays available because it
    /// picks the level of every blink flash.
    #[must_use]
    pub const fn with_blink(self, blink_enabled: bool) -> Self {
        if blink_enabled && self.allow_blink {
            Self {
                allow_fade: false,
                ..self
            }
        } else {
            self
        }
    }
}

impl LightProfile {
    pub const ALL: [Self; 5] = [
        Self::Disabled,
        Self::LivingRoom,
        Self::Hall,
        Self::TvSimulation,
        Self::RandomOnOff,
    ];

    /// Display name, also used as `light_type` in saved documents.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disabled => "Disabled",
            Self::LivingRoom => "Living Room Light",
            Self::Hall => "Hall Light",
            Self::TvSimulation => "TV Simulation",
            Self::RandomOnOff => "Random On/Off",
        }
    }

    /// Name written by older Dutch versions of the tool. Only read, never
    /// written.
    const fn legacy_name(self) -> &'static str {
        match self {
            Self::Disabled => "Uitgeschakeld",
            Self::LivingRoom => "Woonkamer Licht",
            Self::Hall => "Hal Licht",
            Self::TvSimulation => "TV Simulatie",
            Self::RandomOnOff => "Willekeurig Aan/Uit",
        }
    }

    /// Look up a profile by its name or legacy Dutch name, ignoring ASCII
    /// case and surrounding spaces.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|p| {
            p.name().eq_ignore_ascii_case(name) || p.legacy_name().eq_ignore_ascii_case(name)
        })
    }

    #[must_use]
    pub const fn capabilities(self) -> Capabilities {
        Capabilities {
            allow_blink: matches!(self, Self::TvSimulation),
            allow_fade: true,
            allow_variable_brightness: true,
        }
    }

    /// Configuration for a LED on `pin` using this profile's defaults.
    #[must_use]
    pub fn defaults(self, pin: u8) -> LedConfig {
        let secs = |min: u64, max: u64| DurationRange::new(min * 1000, max * 1000);
        let no_fade = Fade::disabled();
        let no_blink = Blink::disabled();

        let (on, off, fade_in, fade_out, variable_brightness, blink) = match self {
            Self::Disabled => (
                DurationRange::ZERO,
                DurationRange::new(DISABLED_OFF_MS, DISABLED_OFF_MS),
                no_fade,
                no_fade,
                VariableBrightness::new(false, 0, 0),
                no_blink,
            ),
            Self::LivingRoom => (
                secs(10, 30),
                secs(5, 15),
                Fade::new(true, secs(1, 5)),
                Fade::new(true, secs(1, 4)),
                VariableBrightness::new(true, 100, 255),
                no_blink,
            ),
            Self::Hall => (
                secs(3, 10),
                secs(2, 8),
                no_fade,
                no_fade,
                VariableBrightness::new(false, 255, 255),
                no_blink,
            ),
            Self::TvSimulation => (
                secs(20, 40),
                secs(10, 20),
                no_fade,
                no_fade,
                VariableBrightness::new(true, 50, 200),
                Blink::new(true, 50, 150),
            ),
            Self::RandomOnOff => (
                secs(5, 20),
                secs(10, 40),
                no_fade,
                no_fade,
                VariableBrightness::new(false, 255, 255),
                no_blink,
            ),
        };

        LedConfig {
            pin,
            profile: self,
            on,
            off,
            fade_in,
            fade_out,
            variable_brightness,
            brightness_interval_ms: 0,
            blink,
        }
    }
}

impl fmt::Display for LightProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

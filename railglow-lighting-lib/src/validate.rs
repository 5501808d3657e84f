//! Validation of raw LED fields into [`LedConfig`].
//!
//! Checks run in a fixed order: field coercion, pin membership and
//! uniqueness, min/max orderings, then mode compatibility and profile blink
//! permission. Every issue found for one LED is collected into a single
//! [`ValidationError`]; warnings never block installation.

use std::fmt;

use derive_more::{Display, Error};
use log::{debug, warn};
use smallvec::SmallVec;

use crate::config::{
    parse_integer, parse_seconds_ms, Blink, DurationRange, Fade, LedConfig, NumberProblem,
    RawLedFields, VariableBrightness,
};
use crate::profile::LightProfile;
use crate::{is_pwm_pin, PWM_PINS};

/// A value outside its allowed range or ordering.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum RangeIssue {
    #[display("pin {pin} is not a PWM pin {:?}", PWM_PINS)]
    PinNotPwm { pin: u64 },
    #[display("'{field}' must not be negative")]
    Negative { field: &'static str },
    #[display("'{field}' is too large")]
    TooLarge { field: &'static str },
    #[display("'{field}' ({value}) must be between 0 and 255")]
    BrightnessOutOfRange { field: &'static str, value: u64 },
    #[display("'{min_field}' cannot be greater than '{max_field}'")]
    MinAboveMax {
        min_field: &'static str,
        max_field: &'static str,
    },
    #[display("'blink_on_ms' and 'blink_off_ms' must be greater than 0 while blinking")]
    BlinkDurationNotPositive,
    #[display("there is no LED {}", index + 1)]
    NoSuchLed { index: usize },
}

/// Behaviors that cannot be combined, or that the profile does not permit.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum CompatibilityIssue {
    #[display("profile '{profile}' does not allow blinking")]
    BlinkNotPermitted { profile: LightProfile },
    #[display("fading is not allowed while blinking; disable fade in and fade out")]
    BlinkWithFade,
}

/// One problem with one LED configuration.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Issue {
    #[display("'{field}' must be {expected} (got {value:?})")]
    FieldFormat {
        field: &'static str,
        expected: &'static str,
        value: String,
    },
    #[display("{_0}")]
    Range(RangeIssue),
    #[display("pin {pin} is already assigned to LED {}", other_index + 1)]
    Uniqueness {
        pin: u8,
        index: usize,
        other_index: usize,
    },
    #[display("{_0}")]
    Compatibility(CompatibilityIssue),
}

/// All issues found while validating the LED at `index`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub index: usize,
    pub issues: SmallVec<[Issue; 4]>,
}

impl ValidationError {
    fn single(index: usize, issue: Issue) -> Self {
        Self {
            index,
            issues: smallvec::smallvec![issue],
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LED {} is invalid:", self.index + 1)?;
        for issue in &self.issues {
            write!(f, "\n  - {issue}")?;
        }
        Ok(())
    }
}

/// Non-fatal findings about an otherwise valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Warning {
    #[display("LED {}: blink on time is set but blink off time is 0 ms", index + 1)]
    BlinkOffMissing { index: usize },
    #[display("LED {}: blink off time is set but blink on time is 0 ms", index + 1)]
    BlinkOnMissing { index: usize },
    #[display("LED {}: brightness interval has no effect while blinking and is ignored", index + 1)]
    InertBrightnessInterval { index: usize },
}

/// A configuration that passed validation, with its warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    pub config: LedConfig,
    pub warnings: SmallVec<[Warning; 2]>,
}

/// Coerces text fields, recording an issue for each one that fails.
struct Coercer<'a> {
    issues: &'a mut SmallVec<[Issue; 4]>,
}

impl Coercer<'_> {
    fn report(
        &mut self,
        field: &'static str,
        expected: &'static str,
        text: &str,
        problem: NumberProblem,
    ) {
        let issue = match problem {
            NumberProblem::Malformed => Issue::FieldFormat {
                field,
                expected,
                value: text.to_string(),
            },
            NumberProblem::Negative => Issue::Range(RangeIssue::Negative { field }),
            NumberProblem::Overflow => Issue::Range(RangeIssue::TooLarge { field }),
        };
        self.issues.push(issue);
    }

    fn seconds(&mut self, field: &'static str, text: &str) -> Option<u64> {
        parse_seconds_ms(text)
            .map_err(|p| self.report(field, "a number of seconds", text, p))
            .ok()
    }

    fn integer(&mut self, field: &'static str, text: &str) -> Option<u64> {
        parse_integer(text)
            .map_err(|p| self.report(field, "a whole number", text, p))
            .ok()
    }

    fn brightness(&mut self, field: &'static str, text: &str) -> Option<u8> {
        let value = self.integer(field, text)?;
        match u8::try_from(value) {
            Ok(level) => Some(level),
            Err(_) => {
                self.issues
                    .push(Issue::Range(RangeIssue::BrightnessOutOfRange { field, value }));
                None
            }
        }
    }

    fn millis(&mut self, field: &'static str, text: &str) -> Option<u32> {
        let value = self.integer(field, text)?;
        match u32::try_from(value) {
            Ok(ms) => Some(ms),
            Err(_) => {
                self.issues.push(Issue::Range(RangeIssue::TooLarge { field }));
                None
            }
        }
    }

    fn pin(&mut self, text: &str) -> Option<u64> {
        match parse_integer(text) {
            Ok(pin) if !text.trim().is_empty() => Some(pin),
            _ => {
                self.issues.push(Issue::FieldFormat {
                    field: "pin",
                    expected: "a pin number",
                    value: text.to_string(),
                });
                None
            }
        }
    }

    fn profile(&mut self, text: &str) -> Option<LightProfile> {
        let profile = LightProfile::from_name(text);
        if profile.is_none() {
            self.issues.push(Issue::FieldFormat {
                field: "light_type",
                expected: "a known light profile",
                value: text.to_string(),
            });
        }
        profile
    }

    /// Require `min <= max` when both sides parsed.
    fn ordered<T: PartialOrd>(
        &mut self,
        min: Option<T>,
        max: Option<T>,
        min_field: &'static str,
        max_field: &'static str,
    ) {
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                self.issues
                    .push(Issue::Range(RangeIssue::MinAboveMax { min_field, max_field }));
            }
        }
    }
}

/// Validate the fields of the LED at `index` against the active set.
///
/// `existing` is only consulted for pin uniqueness; its entry at `index` (the
/// configuration being replaced) is skipped.
///
/// # Errors
/// Returns every issue found for this LED when any check fails.
pub fn validate(
    raw: &RawLedFields,
    existing: &[LedConfig],
    index: usize,
) -> Result<Validated, ValidationError> {
    let mut issues: SmallVec<[Issue; 4]> = SmallVec::new();
    let mut warnings: SmallVec<[Warning; 2]> = SmallVec::new();
    let mut coerce = Coercer {
        issues: &mut issues,
    };

    let pin = coerce.pin(&raw.pin);
    let profile = coerce.profile(&raw.light_type);
    let min_on = coerce.seconds("min_on_s", &raw.min_on_s);
    let max_on = coerce.seconds("max_on_s", &raw.max_on_s);
    let min_off = coerce.seconds("min_off_s", &raw.min_off_s);
    let max_off = coerce.seconds("max_off_s", &raw.max_off_s);
    let min_fade_in = coerce.seconds("min_fade_in_s", &raw.min_fade_in_s);
    let max_fade_in = coerce.seconds("max_fade_in_s", &raw.max_fade_in_s);
    let min_fade_out = coerce.seconds("min_fade_out_s", &raw.min_fade_out_s);
    let max_fade_out = coerce.seconds("max_fade_out_s", &raw.max_fade_out_s);
    let interval = coerce.seconds("bright_interval_s", &raw.bright_interval_s);
    let blink_on = coerce.millis("blink_on_ms", &raw.blink_on_ms);
    let blink_off = coerce.millis("blink_off_ms", &raw.blink_off_ms);
    let min_bright = coerce.brightness("min_bright", &raw.min_bright);
    let max_bright = coerce.brightness("max_bright", &raw.max_bright);

    let pin = pin.and_then(|pin| {
        if !is_pwm_pin_u64(pin) {
            coerce
                .issues
                .push(Issue::Range(RangeIssue::PinNotPwm { pin }));
            return None;
        }
        let pin = u8::try_from(pin).ok()?;
        let clash = existing
            .iter()
            .enumerate()
            .find(|&(i, other)| i != index && other.pin() == pin);
        if let Some((other_index, _)) = clash {
            coerce.issues.push(Issue::Uniqueness {
                pin,
                index,
                other_index,
            });
        }
        Some(pin)
    });

    coerce.ordered(min_on, max_on, "min_on_s", "max_on_s");
    coerce.ordered(min_off, max_off, "min_off_s", "max_off_s");
    coerce.ordered(min_fade_in, max_fade_in, "min_fade_in_s", "max_fade_in_s");
    coerce.ordered(min_fade_out, max_fade_out, "min_fade_out_s", "max_fade_out_s");
    coerce.ordered(min_bright, max_bright, "min_bright", "max_bright");

    let blink_on_ms = blink_on.unwrap_or(0);
    let blink_off_ms = blink_off.unwrap_or(0);
    if blink_on_ms > 0 && blink_off_ms == 0 {
        warnings.push(Warning::BlinkOffMissing { index });
    }
    if blink_off_ms > 0 && blink_on_ms == 0 {
        warnings.push(Warning::BlinkOnMissing { index });
    }

    // Mode compatibility first, then whether the profile may blink at all
    if let Some(profile) = profile {
        let caps = profile.capabilities();
        if (raw.fade_in || raw.fade_out) && !caps.with_blink(raw.blinking).allow_fade {
            coerce
                .issues
                .push(Issue::Compatibility(CompatibilityIssue::BlinkWithFade));
        }
        if raw.blinking {
            if caps.allow_blink {
                if interval.unwrap_or(0) > 0 {
                    warnings.push(Warning::InertBrightnessInterval { index });
                }
            } else {
                coerce
                    .issues
                    .push(Issue::Compatibility(CompatibilityIssue::BlinkNotPermitted {
                        profile,
                    }));
            }
        }
    }
    if raw.blinking && (blink_on == Some(0) || blink_off == Some(0)) {
        coerce
            .issues
            .push(Issue::Range(RangeIssue::BlinkDurationNotPositive));
    }

    if !issues.is_empty() {
        let error = ValidationError { index, issues };
        warn!("{error}");
        return Err(error);
    }

    let range = |min: Option<u64>, max: Option<u64>| {
        DurationRange::new(min.unwrap_or_default(), max.unwrap_or_default())
    };
    let config = LedConfig {
        pin: pin.unwrap_or_default(),
        profile: profile.unwrap_or_default(),
        on: range(min_on, max_on),
        off: range(min_off, max_off),
        fade_in: Fade::new(raw.fade_in, range(min_fade_in, max_fade_in)),
        fade_out: Fade::new(raw.fade_out, range(min_fade_out, max_fade_out)),
        variable_brightness: VariableBrightness::new(
            raw.var_bright,
            min_bright.unwrap_or_default(),
            max_bright.unwrap_or_default(),
        ),
        brightness_interval_ms: interval.unwrap_or_default(),
        blink: Blink::new(raw.blinking, blink_on_ms, blink_off_ms),
    };
    debug!(
        "LED {} validated: pin {} as {} ({} warnings)",
        index + 1,
        config.pin,
        config.profile,
        warnings.len()
    );

    Ok(Validated { config, warnings })
}

fn is_pwm_pin_u64(pin: u64) -> bool {
    u32::try_from(pin).is_ok_and(is_pwm_pin)
}

/// The active set of LED configurations, one slot per LED.
///
/// Slots are only replaced by configurations that pass validation, so a
/// rejected edit leaves the previous configuration in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedSet {
    leds: Vec<LedConfig>,
}

impl Default for LedSet {
    /// Every PWM pin with a "Disabled" LED.
    fn default() -> Self {
        Self {
            leds: PWM_PINS
                .iter()
                .map(|&pin| LightProfile::Disabled.defaults(pin))
                .collect(),
        }
    }
}

impl LedSet {
    /// Validate a whole list of raw configurations in order.
    ///
    /// Pin uniqueness is checked against the entries before each one, so a
    /// duplicate is reported on its second occurrence.
    ///
    /// # Errors
    /// Stops at the first LED that fails validation.
    pub fn from_raw(raws: &[RawLedFields]) -> Result<(Self, Vec<Warning>), ValidationError> {
        let mut leds = Vec::with_capacity(raws.len());
        let mut warnings = Vec::new();
        for (index, raw) in raws.iter().enumerate() {
            let validated = validate(raw, &leds, index)?;
            warnings.extend(validated.warnings);
            leds.push(validated.config);
        }
        Ok((Self { leds }, warnings))
    }

    #[must_use]
    pub fn leds(&self) -> &[LedConfig] {
        &self.leds
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&LedConfig> {
        self.leds.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.leds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leds.is_empty()
    }

    /// Replace the LED at `index` if `raw` validates.
    ///
    /// # Errors
    /// Returns the validation issues and leaves the slot untouched.
    pub fn install(
        &mut self,
        index: usize,
        raw: &RawLedFields,
    ) -> Result<SmallVec<[Warning; 2]>, ValidationError> {
        if index >= self.leds.len() {
            return Err(ValidationError::single(
                index,
                Issue::Range(RangeIssue::NoSuchLed { index }),
            ));
        }
        let validated = validate(raw, &self.leds, index)?;
        self.leds[index] = validated.config;
        Ok(validated.warnings)
    }

    /// Reset the LED at `index` to the defaults of `profile`, keeping its pin.
    ///
    /// # Errors
    /// Fails only when `index` is out of range.
    pub fn apply_profile(
        &mut self,
        index: usize,
        profile: LightProfile,
    ) -> Result<(), ValidationError> {
        let slot = self.leds.get_mut(index).ok_or_else(|| {
            ValidationError::single(index, Issue::Range(RangeIssue::NoSuchLed { index }))
        })?;
        *slot = profile.defaults(slot.pin());
        Ok(())
    }

    /// Flat field maps of every LED, as stored in documents.
    #[must_use]
    pub fn to_raw(&self) -> Vec<RawLedFields> {
        self.leds.iter().map(LedConfig::to_raw).collect()
    }

    /// Re-check every LED before export, collecting all warnings.
    ///
    /// # Errors
    /// Returns the first LED that no longer validates.
    pub fn validate_all(&self) -> Result<Vec<Warning>, ValidationError> {
        let mut warnings = Vec::new();
        for (index, config) in self.leds.iter().enumerate() {
            let validated = validate(&config.to_raw(), &self.leds, index)?;
            warnings.extend(validated.warnings);
        }
        Ok(warnings)
    }
}

//! Per-LED configuration.
//!
//! [`RawLedFields`] is the flat, text-typed field map exchanged with editing
//! surfaces and stored in documents. [`LedConfig`] is its validated, typed
//! counterpart; it can only be obtained from [`crate::validate`] or from a
//! profile's defaults, so holders can trust every invariant.

use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::profile::LightProfile;

/// Inclusive duration range in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DurationRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DurationRange {
    pub const ZERO: Self = Self::new(0, 0);

    #[must_use]
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Both bounds are zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.min_ms == 0 && self.max_ms == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fade {
    pub enabled: bool,
    pub range: DurationRange,
}

impl Fade {
    #[must_use]
    pub const fn new(enabled: bool, range: DurationRange) -> Self {
        Self { enabled, range }
    }

    #[must_use]
    pub const fn disabled() -> Self {
        Self::new(false, DurationRange::ZERO)
    }
}

/// Brightness chosen once per ON phase (and per blink flash).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VariableBrightness {
    pub enabled: bool,
    pub min: u8,
    pub max: u8,
}

impl VariableBrightness {
    #[must_use]
    pub const fn new(enabled: bool, min: u8, max: u8) -> Self {
        Self { enabled, min, max }
    }
}

/// Strobe timing used while in BLINK mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Blink {
    pub enabled: bool,
    pub on_ms: u32,
    pub off_ms: u32,
}

impl Blink {
    #[must_use]
    pub const fn new(enabled: bool, on_ms: u32, off_ms: u32) -> Self {
        Self {
            enabled,
            on_ms,
            off_ms,
        }
    }

    #[must_use]
    pub const fn disabled() -> Self {
        Self::new(false, 0, 0)
    }
}

/// Validated behavior parameters of one LED.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedConfig {
    pub(crate) pin: u8,
    pub(crate) profile: LightProfile,
    pub(crate) on: DurationRange,
    pub(crate) off: DurationRange,
    pub(crate) fade_in: Fade,
    pub(crate) fade_out: Fade,
    pub(crate) variable_brightness: VariableBrightness,
    /// Legacy field without effect; kept so documents round-trip.
    pub(crate) brightness_interval_ms: u64,
    pub(crate) blink: Blink,
}

impl LedConfig {
    #[must_use]
    pub const fn pin(&self) -> u8 {
        self.pin
    }

    #[must_use]
    pub const fn profile(&self) -> LightProfile {
        self.profile
    }

    #[must_use]
    pub const fn on(&self) -> DurationRange {
        self.on
    }

    #[must_use]
    pub const fn off(&self) -> DurationRange {
        self.off
    }

    #[must_use]
    pub const fn fade_in(&self) -> Fade {
        self.fade_in
    }

    #[must_use]
    pub const fn fade_out(&self) -> Fade {
        self.fade_out
    }

    #[must_use]
    pub const fn variable_brightness(&self) -> VariableBrightness {
        self.variable_brightness
    }

    #[must_use]
    pub const fn brightness_interval_ms(&self) -> u64 {
        self.brightness_interval_ms
    }

    #[must_use]
    pub const fn blink(&self) -> Blink {
        self.blink
    }

    /// A LED with no on time but some off time never lights up.
    #[must_use]
    pub const fn is_dark(&self) -> bool {
        self.on.is_zero() && !self.off.is_zero()
    }

    /// Blink is enabled and the profile permits it.
    #[must_use]
    pub const fn blink_active(&self) -> bool {
        self.blink.enabled && self.profile.capabilities().allow_blink
    }

    /// Convert back to the flat field map, normalizing numeric text.
    #[must_use]
    pub fn to_raw(&self) -> RawLedFields {
        RawLedFields {
            pin: self.pin.to_string(),
            light_type: self.profile.name().to_string(),
            min_on_s: format_seconds(self.on.min_ms),
            max_on_s: format_seconds(self.on.max_ms),
            min_off_s: format_seconds(self.off.min_ms),
            max_off_s: format_seconds(self.off.max_ms),
            fade_in: self.fade_in.enabled,
            min_fade_in_s: format_seconds(self.fade_in.range.min_ms),
            max_fade_in_s: format_seconds(self.fade_in.range.max_ms),
            fade_out: self.fade_out.enabled,
            min_fade_out_s: format_seconds(self.fade_out.range.min_ms),
            max_fade_out_s: format_seconds(self.fade_out.range.max_ms),
            var_bright: self.variable_brightness.enabled,
            min_bright: self.variable_brightness.min.to_string(),
            max_bright: self.variable_brightness.max.to_string(),
            bright_interval_s: format_seconds(self.brightness_interval_ms),
            blinking: self.blink.enabled,
            blink_on_ms: self.blink.on_ms.to_string(),
            blink_off_ms: self.blink.off_ms.to_string(),
            extra: IndexMap::new(),
        }
    }
}

/// Unvalidated per-LED fields as typed by a user or stored in a document.
///
/// Durations ending in `_s` are decimal seconds, brightness and blink fields
/// are integers. Values may arrive as JSON strings or numbers, flags as
/// booleans or `"true"`/`"false"`. Missing fields read as empty text, which
/// validation treats as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLedFields {
    #[serde(default, deserialize_with = "lenient_text")]
    pub pin: String,
    #[serde(default = "default_light_type", deserialize_with = "lenient_text")]
    pub light_type: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub min_on_s: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub max_on_s: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub min_off_s: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub max_off_s: String,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub fade_in: bool,
    #[serde(default, deserialize_with = "lenient_text")]
    pub min_fade_in_s: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub max_fade_in_s: String,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub fade_out: bool,
    #[serde(default, deserialize_with = "lenient_text")]
    pub min_fade_out_s: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub max_fade_out_s: String,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub var_bright: bool,
    #[serde(default, deserialize_with = "lenient_text")]
    pub min_bright: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub max_bright: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub bright_interval_s: String,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub blinking: bool,
    #[serde(default, deserialize_with = "lenient_text")]
    pub blink_on_ms: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub blink_off_ms: String,
    /// Keys this version does not know about, preserved in document order.
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

fn default_light_type() -> String {
    LightProfile::Disabled.name().to_string()
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(de::Error::custom(format!(
            "expected text or a number, got {other}"
        ))),
    }
}

fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" | "" => Ok(false),
            _ => Err(de::Error::custom(format!("expected a boolean, got {s:?}"))),
        },
        other => Err(de::Error::custom(format!("expected a boolean, got {other}"))),
    }
}

/// Why a numeric field could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NumberProblem {
    /// Not a number at all.
    Malformed,
    /// A number below zero.
    Negative,
    /// Too large to represent.
    Overflow,
}

/// Parse decimal seconds into whole milliseconds.
///
/// Digits past the third decimal are truncated. Parsing is exact for plain
/// decimal text; exponent notation falls back to floating point.
pub(crate) fn parse_seconds_ms(text: &str) -> Result<u64, NumberProblem> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(0);
    }
    if text.contains(['e', 'E']) {
        return parse_scientific_ms(text);
    }

    let unsigned = match text.strip_prefix('-') {
        Some(rest) => {
            // "-0" and "-0.000" are still zero
            return match parse_seconds_ms(rest) {
                Ok(0) => Ok(0),
                Ok(_) | Err(NumberProblem::Overflow) => Err(NumberProblem::Negative),
                Err(e) => Err(e),
            };
        }
        None => text.strip_prefix('+').unwrap_or(text),
    };

    let (whole, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
        return Err(NumberProblem::Malformed);
    }

    let whole_ms = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u64>()
            .map_err(|_| NumberProblem::Overflow)?
            .checked_mul(1000)
            .ok_or(NumberProblem::Overflow)?
    };
    let frac_ms = frac
        .bytes()
        .chain(std::iter::repeat(b'0'))
        .take(3)
        .fold(0u64, |acc, b| acc * 10 + u64::from(b - b'0'));

    whole_ms.checked_add(frac_ms).ok_or(NumberProblem::Overflow)
}

fn parse_scientific_ms(text: &str) -> Result<u64, NumberProblem> {
    let seconds: f64 = text.parse().map_err(|_| NumberProblem::Malformed)?;
    if !seconds.is_finite() {
        return Err(NumberProblem::Malformed);
    }
    if seconds < 0.0 {
        return Err(NumberProblem::Negative);
    }
    let ms = (seconds * 1000.0).trunc();
    // u64::MAX as f64 rounds up, so compare with >=
    #[allow(clippy::cast_precision_loss)]
    let limit = u64::MAX as f64;
    if ms >= limit {
        return Err(NumberProblem::Overflow);
    }
    // Range checked above
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(ms as u64)
}

/// Parse a non-negative integer field; empty text reads as zero.
pub(crate) fn parse_integer(text: &str) -> Result<u64, NumberProblem> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(0);
    }
    if let Some(rest) = text.strip_prefix('-') {
        return match parse_integer(rest) {
            Ok(0) => Ok(0),
            Ok(_) | Err(NumberProblem::Overflow) => Err(NumberProblem::Negative),
            Err(e) => Err(e),
        };
    }
    let digits = text.strip_prefix('+').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NumberProblem::Malformed);
    }
    digits.parse().map_err(|_| NumberProblem::Overflow)
}

/// Format milliseconds as decimal seconds without trailing zeros.
pub(crate) fn format_seconds(ms: u64) -> String {
    let whole = ms / 1000;
    let frac = ms % 1000;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:03}");
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

//! Lighting behavior logic for Railglow
//!
//! This library holds everything needed to configure, preview and export the
//! autonomous lighting of a model layout: light profiles, the validated
//! per-LED configuration, the timed behavior engine used for previews, and
//! the emitter producing equivalent Arduino firmware. It is hardware-agnostic
//! and can be tested without embedded hardware.
//!
//! The preview engine ([`EngineState`]) and the generated firmware
//! ([`emit_firmware`]) implement the same transition table
//! ([`engine::TRANSITIONS`]), so one validated configuration behaves the same
//! in both places apart from the literal random sequence.

pub mod config;
pub mod document;
pub mod engine;
pub mod firmware;
pub mod layout;
pub mod profile;
pub mod sampler;
pub mod validate;

pub use config::{Blink, DurationRange, Fade, LedConfig, RawLedFields, VariableBrightness};
pub use document::{Document, DocumentError, LoadWarning};
pub use engine::{suggested_tick_interval, BlinkPhase, EngineState, Mode, Snapshot};
pub use firmware::emit_firmware;
pub use layout::{Layout, LoadError, LoadReport};
pub use profile::{Capabilities, LightProfile};
pub use rgb::RGB8;
pub use sampler::{RandSampler, Sampler};
pub use validate::{
    validate, CompatibilityIssue, Issue, LedSet, RangeIssue, Validated, ValidationError, Warning,
};

/// PWM-capable pins of an Arduino Mega 2560 (digital 2-13 and 44-46).
pub const PWM_PINS: [u8; 15] = [2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 44, 45, 46];

/// Maximum number of LEDs in a layout, one per PWM pin.
pub const MAX_LEDS: usize = PWM_PINS.len();

/// Whether `pin` can drive a LED with variable intensity.
#[must_use]
pub fn is_pwm_pin(pin: u32) -> bool {
    PWM_PINS.iter().any(|&p| u32::from(p) == pin)
}

//! JSON persistence of a layout.
//!
//! A saved document is an object holding the LED list and the simulation
//! settings. Older files are a bare list of LEDs; both shapes load.
//!
//! ```json
//! {
//!     "led_configurations": [ { "pin": "2", "light_type": "Disabled", ... } ],
//!     "simulation_settings": { "simulation_speed_factor": 1.0 }
//! }
//! ```

use derive_more::{Display, Error, From};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use smallvec::SmallVec;

use crate::config::RawLedFields;
use crate::profile::LightProfile;
use crate::{MAX_LEDS, PWM_PINS};

const LEDS_KEY: &str = "led_configurations";
const SETTINGS_KEY: &str = "simulation_settings";
const SPEED_KEY: &str = "simulation_speed_factor";

/// Something was off with a document, but it still loaded.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum LoadWarning {
    #[display("document has {found} LEDs but at most {max} are supported; the extra LEDs were ignored")]
    Truncated { found: usize, max: usize },
    #[display("invalid simulation speed {value}; using 1.0")]
    InvalidSpeed { value: String },
    #[display("document contains no LED configurations; loaded the defaults")]
    Empty,
}

/// Why a document could not be loaded.
#[derive(Debug, Display, Error, From)]
pub enum DocumentError {
    #[display("invalid JSON: {_0}")]
    #[from]
    Json(#[error(source)] serde_json::Error),
    #[display("expected a list of LEDs or an object with '{}'", LEDS_KEY)]
    WrongShape,
    #[display("'{}' is not a list", LEDS_KEY)]
    NotAList,
    #[display("LED {} has malformed fields: {source}", index + 1)]
    Entry {
        index: usize,
        source: serde_json::Error,
    },
}

/// Document contents before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Always exactly [`MAX_LEDS`] entries after [`Document::parse`].
    pub leds: Vec<RawLedFields>,
    /// `None` when the document stores no speed, meaning keep the current one.
    pub speed_factor: Option<f64>,
}

#[derive(Serialize, Deserialize)]
struct SimulationSettings {
    #[serde(default = "default_speed_factor")]
    simulation_speed_factor: f64,
}

fn default_speed_factor() -> f64 {
    1.0
}

#[derive(Serialize)]
struct SavedDocument<'a> {
    led_configurations: &'a [RawLedFields],
    simulation_settings: SimulationSettings,
}

impl Document {
    #[must_use]
    pub fn new(leds: Vec<RawLedFields>, speed_factor: Option<f64>) -> Self {
        Self { leds, speed_factor }
    }

    /// Parse either document shape, normalizing the LED list to
    /// [`MAX_LEDS`] entries.
    ///
    /// # Errors
    /// Fails on malformed JSON, an unexpected top-level shape, or an LED
    /// entry whose fields cannot be read at all.
    pub fn parse(text: &str) -> Result<(Self, SmallVec<[LoadWarning; 2]>), DocumentError> {
        let mut warnings = SmallVec::new();

        let (entries, settings) = match serde_json::from_str::<Value>(text)? {
            Value::Array(entries) => (entries, None),
            Value::Object(mut object) => {
                let entries = match object.remove(LEDS_KEY) {
                    Some(Value::Array(entries)) => entries,
                    Some(_) => return Err(DocumentError::NotAList),
                    None => return Err(DocumentError::WrongShape),
                };
                (entries, object.remove(SETTINGS_KEY))
            }
            _ => return Err(DocumentError::WrongShape),
        };

        let found = entries.len();
        let mut leds = entries
            .into_iter()
            .take(MAX_LEDS)
            .enumerate()
            .map(|(index, entry)| {
                RawLedFields::deserialize(entry).map_err(|source| DocumentError::Entry { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if found == 0 {
            warn!("Document contains no LEDs, loading defaults");
            warnings.push(LoadWarning::Empty);
        } else if found > MAX_LEDS {
            warn!("Document has {found} LEDs, keeping the first {MAX_LEDS}");
            warnings.push(LoadWarning::Truncated {
                found,
                max: MAX_LEDS,
            });
        }

        // Fill the remaining slots with disabled LEDs on the next free PWM pins
        let used: Vec<u8> = leds.iter().filter_map(|raw| raw.pin.trim().parse().ok()).collect();
        let missing = MAX_LEDS - leds.len();
        leds.extend(
            PWM_PINS
                .iter()
                .filter(|pin| !used.contains(pin))
                .take(missing)
                .map(|&pin| LightProfile::Disabled.defaults(pin).to_raw()),
        );

        let speed_factor = match settings.as_ref().and_then(|s| s.get(SPEED_KEY)) {
            None | Some(Value::Null) => None,
            Some(value) => match parse_speed(value) {
                Some(speed) => Some(speed),
                None => {
                    warn!("Invalid simulation speed {value}, using 1.0");
                    warnings.push(LoadWarning::InvalidSpeed {
                        value: value.to_string(),
                    });
                    Some(default_speed_factor())
                }
            },
        };

        info!(
            "Loaded document with {} LEDs (speed {})",
            found.min(MAX_LEDS),
            speed_factor.map_or_else(|| "unchanged".to_string(), |s| format!("{s:.1}x"))
        );

        Ok((Self { leds, speed_factor }, warnings))
    }

    /// Serialize in the object shape, indented with four spaces.
    ///
    /// # Errors
    /// Only fails if a preserved unknown key cannot be serialized.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        let saved = SavedDocument {
            led_configurations: &self.leds,
            simulation_settings: SimulationSettings {
                simulation_speed_factor: self.speed_factor.unwrap_or_else(default_speed_factor),
            },
        };

        let mut out = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
        saved.serialize(&mut serializer)?;
        out.push(b'\n');
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

/// A usable speed multiplier: a finite positive number, or text holding one.
fn parse_speed(value: &Value) -> Option<f64> {
    let speed = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (speed.is_finite() && speed > 0.0).then_some(speed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pin: u8) -> String {
        format!(r#"{{"pin": "{pin}", "light_type": "Hall Light", "min_on_s": "3", "max_on_s": "10"}}"#)
    }

    fn list(count: usize) -> String {
        let entries: Vec<_> = (0..count).map(|i| entry(PWM_PINS[i % MAX_LEDS])).collect();
        format!("[{}]", entries.join(", "))
    }

    #[test]
    fn test_truncates_long_list() {
        let (doc, warnings) = Document::parse(&list(20)).unwrap();
        assert_eq!(doc.leds.len(), MAX_LEDS);
        assert_eq!(
            warnings.as_slice(),
            &[LoadWarning::Truncated {
                found: 20,
                max: MAX_LEDS
            }]
        );
    }

    #[test]
    fn test_legacy_list_is_padded() {
        let (doc, warnings) = Document::parse(&list(2)).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(doc.speed_factor, None);
        assert_eq!(doc.leds.len(), MAX_LEDS);
        assert_eq!(doc.leds[1].light_type, "Hall Light");
        assert_eq!(doc.leds[2].pin, PWM_PINS[2].to_string());
        assert_eq!(doc.leds[2].light_type, "Disabled");
        assert_eq!(doc.leds[14].pin, "46");
    }

    #[test]
    fn test_padding_skips_used_pins() {
        let (doc, _) = Document::parse(&format!("[{}]", entry(9))).unwrap();
        let pins: Vec<&str> = doc.leds.iter().map(|raw| raw.pin.as_str()).collect();
        assert_eq!(pins.len(), MAX_LEDS);
        assert_eq!(pins.iter().filter(|&&p| p == "9").count(), 1);
        assert_eq!(&pins[..3], &["9", "2", "3"]);
    }

    #[test]
    fn test_object_shape_with_speed() {
        let text = format!(
            r#"{{"led_configurations": [{}], "simulation_settings": {{"simulation_speed_factor": 2.5}}}}"#,
            entry(9)
        );
        let (doc, warnings) = Document::parse(&text).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(doc.speed_factor, Some(2.5));
        assert_eq!(doc.leds[0].pin, "9");
    }

    #[test]
    fn test_missing_and_invalid_speed() {
        let text = format!(r#"{{"led_configurations": [{}]}}"#, entry(9));
        assert_eq!(Document::parse(&text).unwrap().0.speed_factor, None);

        let text = format!(
            r#"{{"led_configurations": [{}], "simulation_settings": {{"simulation_speed_factor": "fast"}}}}"#,
            entry(9)
        );
        let (doc, warnings) = Document::parse(&text).unwrap();
        assert_eq!(doc.speed_factor, Some(1.0));
        assert!(matches!(warnings[0], LoadWarning::InvalidSpeed { .. }));

        let text = format!(
            r#"{{"led_configurations": [{}], "simulation_settings": {{"simulation_speed_factor": "0.5"}}}}"#,
            entry(9)
        );
        assert_eq!(Document::parse(&text).unwrap().0.speed_factor, Some(0.5));
    }

    #[test]
    fn test_empty_list_loads_defaults() {
        let (doc, warnings) = Document::parse("[]").unwrap();
        assert_eq!(warnings.as_slice(), &[LoadWarning::Empty]);
        assert!(doc.leds.iter().all(|raw| raw.light_type == "Disabled"));
        assert_eq!(doc.leds.len(), MAX_LEDS);
    }

    #[test]
    fn test_numbers_and_string_flags_accepted() {
        let text = r#"[{"pin": 9, "light_type": "Living Room Light", "min_on_s": 1.5, "fade_in": "true"}]"#;
        let (doc, _) = Document::parse(text).unwrap();
        assert_eq!(doc.leds[0].pin, "9");
        assert_eq!(doc.leds[0].min_on_s, "1.5");
        assert!(doc.leds[0].fade_in);
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(Document::parse("{"), Err(DocumentError::Json(_))));
        assert!(matches!(Document::parse("42"), Err(DocumentError::WrongShape)));
        assert!(matches!(
            Document::parse(r#"{"leds": []}"#),
            Err(DocumentError::WrongShape)
        ));
        assert!(matches!(
            Document::parse(r#"{"led_configurations": {}}"#),
            Err(DocumentError::NotAList)
        ));
        let err = Document::parse(r#"[{"pin": "2"}, "nope"]"#).unwrap_err();
        assert!(matches!(err, DocumentError::Entry { index: 1, .. }));
        assert!(err.to_string().starts_with("LED 2 "));
    }

    #[test]
    fn test_saved_shape_and_unknown_keys() {
        let text = r#"[{"pin": "9", "light_type": "Hall Light", "note": "porch", "z": 1}]"#;
        let (doc, _) = Document::parse(text).unwrap();
        let saved = Document::new(doc.leds, Some(3.0)).to_json().unwrap();

        assert!(saved.starts_with("{\n    \"led_configurations\": [\n"));
        assert!(saved.contains("\"simulation_speed_factor\": 3.0"));
        let note = saved.find("\"note\": \"porch\"").unwrap();
        let z = saved.find("\"z\": 1").unwrap();
        assert!(note < z);

        let (reloaded, warnings) = Document::parse(&saved).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(reloaded.speed_factor, Some(3.0));
        assert_eq!(reloaded.leds[0].extra["note"], "porch");
    }
}

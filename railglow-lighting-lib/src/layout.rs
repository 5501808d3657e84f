//! The active layout: LED set plus preview speed.

use derive_more::{Display, Error, From};
use log::info;
use smallvec::SmallVec;

use crate::document::{Document, DocumentError, LoadWarning};
use crate::firmware::emit_firmware;
use crate::validate::{LedSet, ValidationError, Warning};

/// Why loading a document into a [`Layout`] failed.
#[derive(Debug, Display, Error, From)]
pub enum LoadError {
    #[display("{_0}")]
    Document(#[error(source)] DocumentError),
    #[display("{_0}")]
    Invalid(#[error(source)] ValidationError),
}

/// Findings from a successful load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub load_warnings: SmallVec<[LoadWarning; 2]>,
    pub validation_warnings: Vec<Warning>,
}

impl LoadReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.load_warnings.is_empty() && self.validation_warnings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    set: LedSet,
    speed_factor: f64,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            set: LedSet::default(),
            speed_factor: 1.0,
        }
    }
}

impl Layout {
    #[must_use]
    pub const fn leds(&self) -> &LedSet {
        &self.set
    }

    pub fn leds_mut(&mut self) -> &mut LedSet {
        &mut self.set
    }

    #[must_use]
    pub const fn speed_factor(&self) -> f64 {
        self.speed_factor
    }

    /// Ignored unless finite and positive.
    pub fn set_speed_factor(&mut self, speed: f64) {
        if speed.is_finite() && speed > 0.0 {
            self.speed_factor = speed;
        }
    }

    /// Replace the layout with the contents of a JSON document.
    ///
    /// Nothing changes unless the document parses and every LED validates.
    ///
    /// # Errors
    /// Returns the document error or the first invalid LED.
    pub fn load_json(&mut self, text: &str) -> Result<LoadReport, LoadError> {
        let (document, load_warnings) = Document::parse(text)?;
        let (set, validation_warnings) = LedSet::from_raw(&document.leds)?;

        self.set = set;
        if let Some(speed) = document.speed_factor {
            self.speed_factor = speed;
        }
        info!("Layout loaded, speed {:.1}x", self.speed_factor);

        Ok(LoadReport {
            load_warnings,
            validation_warnings,
        })
    }

    /// Save in the object document shape.
    ///
    /// # Errors
    /// See [`Document::to_json`].
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Document::new(self.set.to_raw(), Some(self.speed_factor)).to_json()
    }

    /// Validate every LED and generate the firmware sketch.
    ///
    /// # Errors
    /// Returns the first LED that fails validation; no sketch is produced.
    pub fn export_firmware(&self) -> Result<(String, Vec<Warning>), ValidationError> {
        let warnings = self.set.validate_all()?;
        Ok((emit_firmware(self.set.leds()), warnings))
    }
}

//! The pipe-delimited payload of a `<gen>` tag:
//! `CropName|GenerationType|Location|YYYY-MM-DD|NPKString`.

use crate::errors::FormatError;
use std::fmt;
use std::str::FromStr;

/// Sentinel the model uses for an unknown location or NPK reading.
pub const UNKNOWN_FIELD: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationType {
    Timeline,
    CheckupSchedule,
    Other(String),
}

impl From<&str> for GenerationType {
    fn from(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "timeline" => GenerationType::Timeline,
            "checkup_schedule" => GenerationType::CheckupSchedule,
            _ => GenerationType::Other(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationDirective {
    pub crop_name: String,
    /// As written by the model; see [`kind`](Self::kind).
    pub generation_type: String,
    pub location: String,
    pub current_date: String,
    pub npk: String,
}

impl GenerationDirective {
    pub fn kind(&self) -> GenerationType {
        GenerationType::from(self.generation_type.as_str())
    }

    /// Multi-line field summary handed to the generation persona.
    pub fn summary(&self) -> String {
        format!(
            "Crop Name: {}\nGeneration Type: {}\nLocation: {}\nCurrent Date: {}\nNPK Readings: {}",
            self.crop_name, self.generation_type, self.location, self.current_date, self.npk
        )
    }

    pub fn location_known(&self) -> bool {
        !self.location.eq_ignore_ascii_case(UNKNOWN_FIELD)
    }

    pub fn npk_known(&self) -> bool {
        !self.npk.eq_ignore_ascii_case(UNKNOWN_FIELD)
    }
}

impl FromStr for GenerationDirective {
    type Err = FormatError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = raw.split('|').map(str::trim).collect();
        let &[crop_name, generation_type, location, current_date, npk] = fields.as_slice() else {
            return Err(FormatError::DirectiveArity {
                found: fields.len(),
            });
        };

        Ok(Self {
            crop_name: crop_name.to_string(),
            generation_type: generation_type.to_string(),
            location: location.to_string(),
            current_date: current_date.to_string(),
            npk: npk.to_string(),
        })
    }
}

impl fmt::Display for GenerationDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}",
            self.crop_name, self.generation_type, self.location, self.current_date, self.npk
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_still_count() {
        let directive: GenerationDirective = "Corn||||".parse().unwrap();
        assert_eq!(directive.crop_name, "Corn");
        assert_eq!(directive.location, "");
    }

    #[test]
    fn unknown_sentinels_are_detected() {
        let directive: GenerationDirective = "Wheat|timeline|N/A|2024-06-01|n/a".parse().unwrap();
        assert!(!directive.location_known());
        assert!(!directive.npk_known());
        assert_eq!(directive.kind(), GenerationType::Timeline);
    }

    #[test]
    fn mixed_case_type_is_classified_but_kept_as_written() {
        let raw = "Corn|Timeline|Ames, Iowa|2024-05-15|N/A";
        let directive: GenerationDirective = raw.parse().unwrap();
        assert_eq!(directive.kind(), GenerationType::Timeline);
        assert_eq!(directive.to_string(), raw);
        assert!(directive.summary().contains("Generation Type: Timeline"));
    }

    #[test]
    fn display_restores_wire_format() {
        let raw = "Tomato|checkup_schedule|Central Valley, California|2024-04-10|N:90,P:50,K:150";
        let directive: GenerationDirective = raw.parse().unwrap();
        assert_eq!(directive.to_string(), raw);
    }
}

use serde::{Deserialize, Serialize};

/// Clause used when no environment field is known.
pub const NO_CONTEXT: &str = "No specific context provided.";

/// Environment facts about the farmer, all optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentContext {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub npk: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl EnvironmentContext {
    pub fn new(location: Option<String>, npk: Option<String>, date: Option<String>) -> Self {
        Self {
            location,
            npk,
            date,
        }
    }

    /// `"Location: L, NPK Reading: N, Current Date: D"`, skipping blank
    /// fields, or [`NO_CONTEXT`].
    pub fn clause(&self) -> String {
        let fields = [
            ("Location", &self.location),
            ("NPK Reading", &self.npk),
            ("Current Date", &self.date),
        ];
        let present: Vec<String> = fields
            .iter()
            .filter_map(|(label, value)| {
                value
                    .as_deref()
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(|value| format!("{}: {}", label, value))
            })
            .collect();

        if present.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            present.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clause_lists_present_fields_in_order() {
        let context = EnvironmentContext::new(
            Some("Ibadan, Nigeria".into()),
            Some("N:10,P:5,K:8".into()),
            Some("2025-07-10".into()),
        );
        assert_eq!(
            context.clause(),
            "Location: Ibadan, Nigeria, NPK Reading: N:10,P:5,K:8, Current Date: 2025-07-10"
        );
    }

    #[test]
    fn blank_fields_are_omitted() {
        let context = EnvironmentContext::new(None, Some("  ".into()), Some("2025-07-10".into()));
        assert_eq!(context.clause(), "Current Date: 2025-07-10");
        assert_eq!(EnvironmentContext::default().clause(), NO_CONTEXT);
    }
}

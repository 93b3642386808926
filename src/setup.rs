//! # Interview Setup Context
//!
//! Candidate-supplied interview parameters (target role, company, interview format,
//! experience, focus areas). The browser either posts them to `/api/setup` ahead of the
//! realtime connection or attaches them to the offer as `request_data`.
//!
//! ## Two delivery paths:
//! - **Offer field** (preferred): the offer carries its own context, so concurrent offers
//!   from different tabs never see each other's setup.
//! - **Setup store** (deprecated fallback): the most recently posted setup, shared by the
//!   whole process. Last write wins.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Interview parameters for one session.
///
/// Known fields are typed; anything else the client sends is kept verbatim in `extra`
/// so `GET /api/setup` echoes exactly what was received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview_format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub focus_areas: Vec<String>,

    /// Fields the server does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SetupContext {
    pub fn job_title(&self) -> Option<&str> {
        non_blank(&self.job_title)
    }

    pub fn company(&self) -> Option<&str> {
        non_blank(&self.company)
    }

    pub fn interview_format(&self) -> Option<&str> {
        non_blank(&self.interview_format)
    }

    pub fn experience(&self) -> Option<&str> {
        non_blank(&self.experience)
    }

    /// Focus-area tags, trimmed and lowercased, blanks removed.
    pub fn focus_tags(&self) -> Vec<String> {
        self.focus_areas
            .iter()
            .map(|tag| tag.trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Process-wide "current setup" slot behind `POST /api/setup`.
///
/// ## Known race:
/// Two browser tabs posting setups back to back overwrite each other before either
/// offer arrives. Offers without their own `request_data` pick up whichever setup was
/// written last.
#[derive(Debug, Default)]
pub struct SetupStore {
    current: RwLock<Option<SetupContext>>,
}

impl SetupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current setup.
    pub fn record(&self, setup: SetupContext) {
        info!(
            job_title = setup.job_title().unwrap_or("-"),
            company = setup.company().unwrap_or("-"),
            "Received interview setup"
        );
        *self.current.write() = Some(setup);
    }

    /// Latest setup, if one has been posted.
    pub fn current(&self) -> Option<SetupContext> {
        self.current.read().clone()
    }

    /// Pick the setup for a new session: the offer's own context wins, otherwise the
    /// latest posted one.
    pub fn resolve(&self, attached: Option<SetupContext>) -> Option<SetupContext> {
        attached.or_else(|| self.current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_setup_deserializes_camel_case_and_keeps_extra_fields() {
        let setup: SetupContext = serde_json::from_value(json!({
            "jobTitle": "Backend Engineer",
            "company": "Acme",
            "focusAreas": ["Technical", " "],
            "resumeNotes": "10 years Rust"
        }))
        .unwrap();

        assert_eq!(setup.job_title(), Some("Backend Engineer"));
        assert_eq!(setup.company(), Some("Acme"));
        assert_eq!(setup.interview_format(), None);
        assert_eq!(setup.focus_tags(), vec!["technical".to_string()]);
        assert_eq!(setup.extra.get("resumeNotes"), Some(&json!("10 years Rust")));

        let echoed = serde_json::to_value(&setup).unwrap();
        assert_eq!(echoed["jobTitle"], "Backend Engineer");
        assert_eq!(echoed["resumeNotes"], "10 years Rust");
    }

    #[test]
    fn test_blank_fields_count_as_missing() {
        let setup = SetupContext {
            job_title: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(setup.job_title(), None);
    }

    #[test]
    fn test_store_is_last_write_wins() {
        let store = SetupStore::new();
        assert!(store.current().is_none());

        store.record(SetupContext { job_title: Some("First".into()), ..Default::default() });
        store.record(SetupContext { job_title: Some("Second".into()), ..Default::default() });

        assert_eq!(store.current().unwrap().job_title(), Some("Second"));
    }

    #[test]
    fn test_attached_setup_wins_over_store() {
        let store = SetupStore::new();
        store.record(SetupContext { job_title: Some("Stored".into()), ..Default::default() });

        let attached = SetupContext { job_title: Some("Attached".into()), ..Default::default() };
        let resolved = store.resolve(Some(attached)).unwrap();
        assert_eq!(resolved.job_title(), Some("Attached"));

        let fallback = store.resolve(None).unwrap();
        assert_eq!(fallback.job_title(), Some("Stored"));
    }
}

use serde::{Deserialize, Serialize};

/// The signed-in caller as supplied by the upstream authentication service.
/// Read-only: the core uses it to personalize prompts and to scope sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl Identity {
    /// Best available name for addressing the applicant in a prompt.
    pub fn preferred_name(&self) -> &str {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.email)
    }
}

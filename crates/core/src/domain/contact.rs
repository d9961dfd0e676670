use serde::{Deserialize, Serialize};

/// Payload of a completed contact flow, as emitted by the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactSubmission {
    /// Checks the fields a notification needs. Returns the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("contact name is empty".to_string());
        }
        if self.message.trim().is_empty() {
            return Err("contact message is empty".to_string());
        }

        let email = self.email.trim();
        let well_formed = email
            .split_once('@')
            .map(|(local, domain)| {
                !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace)
            })
            .unwrap_or(false);
        if !well_formed {
            return Err(format!("contact email `{email}` is not an address"));
        }

        Ok(())
    }
}

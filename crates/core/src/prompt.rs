//! System instruction assembly.

use chrono::{DateTime, Utc};
use tera::{Context, Tera};
use thiserror::Error;

use crate::config::TimestampPolicy;

pub const RESUME_FALLBACK: &str = "Resume not available.";
pub const BACKGROUND_FALLBACK: &str = "No additional background context.";

const TEMPLATE_NAME: &str = "system_prompt.txt";
const TIMESTAMP_FORMAT: &str = "%A, %B %-d, %Y %H:%M UTC";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("system prompt template failed: {0}")]
    Template(#[from] tera::Error),
}

pub struct PromptAssembler {
    templates: Tera,
    owner_name: String,
    policy: TimestampPolicy,
    captured_at: DateTime<Utc>,
}

impl PromptAssembler {
    pub fn new(
        owner_name: impl Into<String>,
        policy: TimestampPolicy,
    ) -> Result<Self, PromptError> {
        Self::with_template(
            include_str!("../../../templates/prompt/system_prompt.txt"),
            owner_name,
            policy,
        )
    }

    pub fn with_template(
        template: &str,
        owner_name: impl Into<String>,
        policy: TimestampPolicy,
    ) -> Result<Self, PromptError> {
        let mut templates = Tera::default();
        templates.add_raw_template(TEMPLATE_NAME, template)?;
        Ok(Self { templates, owner_name: owner_name.into(), policy, captured_at: Utc::now() })
    }

    /// Pins the process-start timestamp. Ignored under `PerRequest`.
    pub fn captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = captured_at;
        self
    }

    pub fn build(&self, resume: &str, background: &str) -> Result<String, PromptError> {
        let timestamp = match self.policy {
            TimestampPolicy::ProcessStart => self.captured_at,
            TimestampPolicy::PerRequest => Utc::now(),
        };

        let mut context = Context::new();
        context.insert("owner_name", &self.owner_name);
        context.insert("captured_at", &timestamp.format(TIMESTAMP_FORMAT).to_string());
        context.insert("resume", or_fallback(resume, RESUME_FALLBACK));
        context.insert("background", or_fallback(background, BACKGROUND_FALLBACK));

        Ok(self.templates.render(TEMPLATE_NAME, &context)?)
    }
}

fn or_fallback<'a>(text: &'a str, fallback: &'a str) -> &'a str {
    if text.trim().is_empty() {
        fallback
    } else {
        text
    }
}

use serde::Deserialize;
use time::OffsetDateTime;

pub(crate) const MIN_OPTIONS_PER_QUESTION: usize = 2;
pub(crate) const MAX_OPTIONS_PER_QUESTION: usize = 8;

/// Quiz metadata as served by the backend. The ordered question list is
/// fetched separately; the correct answers never reach this client.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct QuizMeta {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) time_limit_minutes: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) due_at: OffsetDateTime,
    #[serde(default)]
    pub(crate) pin_required: bool,
}

impl QuizMeta {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("quiz id must not be empty".to_string());
        }
        if self.time_limit_minutes == 0 {
            return Err("time_limit_minutes must be positive".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) prompt: String,
    pub(crate) options: Vec<String>,
    pub(crate) marks: u32,
    #[serde(default)]
    pub(crate) image_url: Option<String>,
}

impl Question {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("question id must not be empty".to_string());
        }
        if self.options.len() < MIN_OPTIONS_PER_QUESTION
            || self.options.len() > MAX_OPTIONS_PER_QUESTION
        {
            return Err(format!(
                "question '{}' must have between {MIN_OPTIONS_PER_QUESTION} and \
                 {MAX_OPTIONS_PER_QUESTION} options, got {}",
                self.id,
                self.options.len()
            ));
        }
        if self.marks == 0 {
            return Err(format!("question '{}' must be worth at least one mark", self.id));
        }
        Ok(())
    }
}

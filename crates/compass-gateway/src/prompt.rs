// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System prompt for the AI-chat proxy.

use std::fmt;

use compass_config::model::ChatConfig;
use serde::Deserialize;
use tracing::{info, warn};

/// Prompt used when neither a prompt file nor an inline prompt is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are Compass, a friendly school counseling assistant for students. \
Help with course planning, study habits, college and career exploration, \
and everyday school stress. Keep answers short, warm and age-appropriate. \
If a student mentions self-harm, abuse or an emergency, tell them to reach \
out to their school counselor or a trusted adult right away and share \
emergency contacts such as 988 in the United States.";

/// Optional facts about the student sent along with a chat request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub grade_level: Option<GradeLevel>,
}

/// Grade as sent by clients: either a number or free text such as "Junior".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum GradeLevel {
    Number(u32),
    Text(String),
}

impl fmt::Display for GradeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(t) => f.write_str(t.trim()),
        }
    }
}

/// The configured base prompt, personalized per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPrompt {
    base: String,
}

impl SystemPrompt {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    /// Resolves the base prompt: file, then inline text, then the default.
    ///
    /// An unreadable or empty file falls through to the next source.
    pub async fn load(config: &ChatConfig) -> Self {
        if let Some(path) = &config.system_prompt_file {
            match tokio::fs::read_to_string(path).await {
                Ok(content) if !content.trim().is_empty() => {
                    info!(path = %path, "loaded system prompt from file");
                    return Self::new(content.trim());
                }
                Ok(_) => warn!(path = %path, "system prompt file is empty, falling back"),
                Err(e) => warn!(
                    path = %path,
                    error = %e,
                    "failed to read system prompt file, falling back"
                ),
            }
        }

        if let Some(prompt) = &config.system_prompt
            && !prompt.trim().is_empty()
        {
            return Self::new(prompt.trim());
        }

        Self::new(DEFAULT_SYSTEM_PROMPT)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Base prompt plus whatever the request told us about the student.
    pub fn personalize(&self, context: Option<&UserContext>) -> String {
        let mut prompt = self.base.clone();
        let Some(context) = context else {
            return prompt;
        };

        if let Some(name) = context.first_name.as_deref().map(str::trim)
            && !name.is_empty()
        {
            prompt.push_str(&format!("\n\nThe student's first name is {name}."));
        }
        if let Some(grade) = &context.grade_level {
            let grade = grade.to_string();
            if !grade.is_empty() {
                prompt.push_str(&format!("\nThe student is in grade {grade}."));
            }
        }
        prompt
    }
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

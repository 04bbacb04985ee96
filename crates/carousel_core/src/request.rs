use std::fmt;

use serde::{Deserialize, Serialize};

/// Creator name sent when the user leaves the field blank.
pub const DEFAULT_CREATOR_NAME: &str = "none";

/// Which generation flow a request belongs to.
///
/// Each mode talks to its own pair of submit/status endpoints. The serialized
/// names match histories written by the browser client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenerationMode {
    /// Expand a short idea into a carousel.
    #[serde(rename = "ide", alias = "idea")]
    Idea,
    /// Convert a finished script into a carousel.
    #[serde(rename = "skrip", alias = "script")]
    Script,
}

impl GenerationMode {
    pub fn name(self) -> &'static str {
        match self {
            GenerationMode::Idea => "idea",
            GenerationMode::Script => "script",
        }
    }

    /// Only idea generation accepts a tone of voice.
    pub fn carries_tone(self) -> bool {
        matches!(self, GenerationMode::Idea)
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestValidationError {
    #[error("prompt must not be empty")]
    EmptyPrompt,
}

/// Submission body for the generation webhook.
///
/// Field names on the wire are fixed by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    #[serde(rename = "pesan")]
    prompt: String,
    creator_name: String,
    template_style: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tone_of_voice: Option<String>,
}

impl GenerationRequest {
    pub fn new(
        prompt: impl Into<String>,
        template_style: impl Into<String>,
    ) -> Result<Self, RequestValidationError> {
        let prompt = prompt.into().trim().to_string();
        if prompt.is_empty() {
            return Err(RequestValidationError::EmptyPrompt);
        }
        Ok(Self {
            prompt,
            creator_name: DEFAULT_CREATOR_NAME.to_string(),
            template_style: template_style.into(),
            tone_of_voice: None,
        })
    }

    pub fn with_creator_name(mut self, creator_name: impl Into<String>) -> Self {
        let name = creator_name.into().trim().to_string();
        self.creator_name = if name.is_empty() {
            DEFAULT_CREATOR_NAME.to_string()
        } else {
            name
        };
        self
    }

    pub fn with_tone_of_voice(mut self, tone: impl Into<String>) -> Self {
        let tone = tone.into().trim().to_string();
        self.tone_of_voice = (!tone.is_empty()).then_some(tone);
        self
    }

    /// Drops fields the given mode's endpoint does not accept.
    pub fn for_mode(mut self, mode: GenerationMode) -> Self {
        if !mode.carries_tone() {
            self.tone_of_voice = None;
        }
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn creator_name(&self) -> &str {
        &self.creator_name
    }

    pub fn template_style(&self) -> &str {
        &self.template_style
    }

    pub fn tone_of_voice(&self) -> Option<&str> {
        self.tone_of_voice.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_creator_falls_back_to_sentinel() {
        let request = GenerationRequest::new("  my idea ", "minimal")
            .unwrap()
            .with_creator_name("   ");
        assert_eq!(request.prompt(), "my idea");
        assert_eq!(request.creator_name(), DEFAULT_CREATOR_NAME);
    }

    #[test]
    fn script_mode_never_sends_tone() {
        let request = GenerationRequest::new("script body", "bold")
            .unwrap()
            .with_tone_of_voice("playful")
            .for_mode(GenerationMode::Script);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "pesan": "script body",
                "creator_name": "none",
                "template_style": "bold",
            })
        );
    }

    #[test]
    fn idea_mode_serializes_tone() {
        let request = GenerationRequest::new("idea", "bold")
            .unwrap()
            .with_creator_name("Dewi")
            .with_tone_of_voice("casual")
            .for_mode(GenerationMode::Idea);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["tone_of_voice"], "casual");
        assert_eq!(body["creator_name"], "Dewi");
    }

    #[test]
    fn empty_prompt_is_rejected() {
        assert_eq!(
            GenerationRequest::new(" \n ", "bold"),
            Err(RequestValidationError::EmptyPrompt)
        );
    }

    #[test]
    fn mode_accepts_both_spellings() {
        let legacy: GenerationMode = serde_json::from_str("\"skrip\"").unwrap();
        let english: GenerationMode = serde_json::from_str("\"script\"").unwrap();
        assert_eq!(legacy, english);
        assert_eq!(serde_json::to_string(&GenerationMode::Idea).unwrap(), "\"ide\"");
    }
}

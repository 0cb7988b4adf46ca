//! Process-wide user settings.
//!
//! Loaded once at startup and persisted after every change. Missing keys
//! are filled from [`Settings::default`] so records written by older
//! versions keep loading.

use serde::{Deserialize, Serialize};

/// Default base URL of the Ollama server.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default theme identifier.
pub const DEFAULT_THEME: &str = "light";

/// Themes rendered on a light background.
const LIGHT_THEMES: [&str; 2] = ["light", "solarized-light"];

/// User-editable settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Base URL of the model server.
    pub ollama_url: String,
    /// Model used when a conversation does not pick one.
    pub default_model: String,
    /// Theme identifier.
    pub theme: String,
    /// Brave Search subscription token.
    pub brave_api_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            default_model: String::new(),
            theme: DEFAULT_THEME.to_string(),
            brave_api_key: String::new(),
        }
    }
}

impl Settings {
    /// Trim user input and restore the default URL when it was cleared.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.ollama_url = self.ollama_url.trim().trim_end_matches('/').to_string();
        if self.ollama_url.is_empty() {
            self.ollama_url = DEFAULT_OLLAMA_URL.to_string();
        }
        self.brave_api_key = self.brave_api_key.trim().to_string();
        self.default_model = self.default_model.trim().to_string();
        self
    }

    /// Whether a Brave Search key is configured.
    #[must_use]
    pub fn has_search_key(&self) -> bool {
        !self.brave_api_key.is_empty()
    }

    /// Whether the theme uses a dark background.
    #[must_use]
    pub fn is_dark_theme(&self) -> bool {
        !LIGHT_THEMES.contains(&self.theme.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_are_default_filled() {
        let settings: Settings =
            serde_json::from_str(r#"{"braveApiKey": "k"}"#).unwrap_or_default();
        assert_eq!(settings.ollama_url, DEFAULT_OLLAMA_URL);
        assert_eq!(settings.theme, DEFAULT_THEME);
        assert_eq!(settings.brave_api_key, "k");
        assert!(settings.default_model.is_empty());
    }

    #[test]
    fn test_round_trip() {
        let settings = Settings {
            ollama_url: "http://gpu-box:11434".to_string(),
            default_model: "llama3".to_string(),
            theme: "dracula".to_string(),
            brave_api_key: "secret".to_string(),
        };
        let json = serde_json::to_string(&settings).unwrap_or_default();
        assert!(json.contains("ollamaUrl"));
        let back: Settings = serde_json::from_str(&json).unwrap_or_default();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let settings: Settings =
            serde_json::from_str(r#"{"theme": "nord", "fontSize": 14}"#).unwrap_or_default();
        assert_eq!(settings.theme, "nord");
    }

    #[test]
    fn test_normalized_restores_blank_url() {
        let settings = Settings {
            ollama_url: "   ".to_string(),
            brave_api_key: " key ".to_string(),
            ..Settings::default()
        }
        .normalized();
        assert_eq!(settings.ollama_url, DEFAULT_OLLAMA_URL);
        assert_eq!(settings.brave_api_key, "key");
        assert!(settings.has_search_key());
    }

    #[test]
    fn test_normalized_strips_trailing_slash() {
        let settings = Settings {
            ollama_url: "http://localhost:11434/".to_string(),
            ..Settings::default()
        }
        .normalized();
        assert_eq!(settings.ollama_url, "http://localhost:11434");
    }

    #[test]
    fn test_dark_theme_detection() {
        let mut settings = Settings::default();
        assert!(!settings.is_dark_theme());
        settings.theme = "solarized-dark".to_string();
        assert!(settings.is_dark_theme());
    }
}

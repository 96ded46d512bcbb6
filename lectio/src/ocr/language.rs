use serde::{Deserialize, Serialize};
use std::fmt;

/// Language model family an engine is built for.
///
/// Mixed Chinese/English text is served by the `Ch` models, which is also the
/// fallback for anything unrecognized.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum LanguageKey {
    #[default]
    Ch,
    En,
}

impl LanguageKey {
    pub const ALL: [LanguageKey; 2] = [LanguageKey::Ch, LanguageKey::En];

    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageKey::Ch => "ch",
            LanguageKey::En => "en",
        }
    }

    /// Tesseract traineddata selector for this key.
    pub fn tesseract_code(&self) -> &'static str {
        match self {
            LanguageKey::Ch => "chi_sim+eng",
            LanguageKey::En => "eng",
        }
    }
}

impl fmt::Display for LanguageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a caller's language selector onto a supported key. Never fails.
pub fn resolve_language(requested: &str) -> LanguageKey {
    match requested.trim().to_ascii_lowercase().as_str() {
        "en" | "eng" | "english" => LanguageKey::En,
        "auto" | "ch" | "ch_en" | "zh" | "chi_sim" => LanguageKey::Ch,
        other => {
            if !other.is_empty() {
                tracing::debug!(requested = other, "Unknown language, using default");
            }
            LanguageKey::default()
        }
    }
}

//! Language profiles for the voice assistant.
//!
//! Each profile pairs an ISO code with the tutor system prompt used for
//! that language and the synthesis voice that speaks it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    pub name: String,
    /// ISO 639-1 code, also the registry key.
    #[serde(default)]
    pub code: String,
    pub system_prompt: String,
    pub voice: String,
}

/// Languages the assistant can tutor in, keyed by code.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: HashMap<String, Language>,
}

impl LanguageRegistry {
    /// Build a registry from a code-keyed map. The key is authoritative
    /// for the code field, so TOML sections need not repeat it.
    pub fn new(mut languages: HashMap<String, Language>) -> Self {
        for (code, language) in &mut languages {
            language.code = code.clone();
        }
        Self { languages }
    }

    pub fn get(&self, code: &str) -> Option<&Language> {
        self.languages.get(code)
    }

    pub fn codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.languages.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }
}

/// The built-in tutor profiles.
pub fn builtin() -> HashMap<String, Language> {
    let mut languages = HashMap::new();
    languages.insert(
        "en".to_string(),
        Language {
            name: "English".to_string(),
            code: "en".to_string(),
            system_prompt: "You are a friendly English tutor. Respond concisely in under 100 \
                            words in English."
                .to_string(),
            voice: "af_sky".to_string(),
        },
    );
    languages.insert(
        "de".to_string(),
        Language {
            name: "Deutsch".to_string(),
            code: "de".to_string(),
            system_prompt: "Du bist ein freundlicher Deutschlehrer. Antworte kurz und prägnant \
                            in maximal 100 Wörtern auf Deutsch."
                .to_string(),
            voice: "bf_emma".to_string(),
        },
    );
    languages.insert(
        "zh".to_string(),
        Language {
            name: "中文".to_string(),
            code: "zh".to_string(),
            system_prompt: "你是一位友好的中文老师。请用100字以内的中文简洁回答。".to_string(),
            voice: "zf_xiaobei".to_string(),
        },
    );
    languages
}

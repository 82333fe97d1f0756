use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::paths::Paths;

/// Text keys for controls on the trading console, per UI language.
///
/// The console renders localized captions, so every selector that matches
/// on visible text goes through this table. Unknown keys resolve to a
/// visible placeholder instead of an error, which keeps a misconfigured
/// table from aborting a session mid-flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiText {
    language: String,
    languages: HashMap<String, HashMap<String, String>>,
}

fn english_labels() -> HashMap<String, String> {
    let pairs = [
        ("locale", "en-US"),
        ("username_label", "Username"),
        ("password_label", "Password"),
        ("accept_cookies", "Accept"),
        ("login_button", "LOG IN"),
        ("live_button", "Login to the Live Environment"),
        ("simulation_button", "Access Simulation"),
        ("filled", "Filled"),
        ("rejected", "Rejected"),
    ];
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl Default for UiText {
    fn default() -> Self {
        let mut languages = HashMap::new();
        languages.insert("English".to_string(), english_labels());
        Self {
            language: "English".to_string(),
            languages,
        }
    }
}

/// Label files may group related captions one level deep (the trade
/// status strings ship as a nested object). Grouped entries land in the
/// flat table under their leaf key.
fn flatten_labels(raw: HashMap<String, Value>) -> Result<HashMap<String, String>> {
    let mut labels = HashMap::new();
    for (key, value) in raw {
        match value {
            Value::String(text) => {
                labels.insert(key, text);
            }
            Value::Object(group) => {
                for (leaf, value) in group {
                    match value {
                        Value::String(text) => {
                            labels.insert(leaf, text);
                        }
                        _ => {
                            return Err(Error::Config(format!(
                                "Label {}.{} must be a string",
                                key, leaf
                            )));
                        }
                    }
                }
            }
            _ => {
                return Err(Error::Config(format!(
                    "Label {} must be a string or a group of strings",
                    key
                )));
            }
        }
    }
    Ok(labels)
}

impl UiText {
    pub fn load(path: &Path, language: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let raw: HashMap<String, HashMap<String, Value>> = serde_json::from_str(&content)?;
        let mut languages = HashMap::new();
        for (name, entries) in raw {
            languages.insert(name, flatten_labels(entries)?);
        }
        Ok(Self {
            language: language.to_string(),
            languages,
        })
    }

    pub fn load_or_default(paths: &Paths, language: &str) -> Result<Self> {
        let path = paths.ui_text_file();
        if path.exists() {
            Self::load(&path, language)
        } else {
            let mut text = Self::default();
            text.language = language.to_string();
            Ok(text)
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn language_names(&self) -> Vec<String> {
        self.languages.keys().cloned().collect()
    }

    /// Look up the label for `key` in the active language.
    /// Missing entries yield a placeholder so callers can proceed
    /// (and the bogus string shows up verbatim in selectors and logs).
    pub fn text(&self, key: &str) -> String {
        self.languages
            .get(&self.language)
            .and_then(|labels| labels.get(key))
            .cloned()
            .unwrap_or_else(|| format!("Missing text for key: {}", key))
    }
}

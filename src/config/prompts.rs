//! Instruction prompt for sermon analysis.
//!
//! The prompt ships with the binary and can be replaced by a text file named in
//! `analysis.prompt_path`. It is rendered once at startup; every job reuses it.

use crate::error::{Result, SermonError};
use std::collections::HashMap;
use std::path::PathBuf;

const BUNDLED_PROMPT: &str = include_str!("prompt.txt");

/// The rendered instruction prompt sent with every generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisPrompt {
    text: String,
}

impl Default for AnalysisPrompt {
    fn default() -> Self {
        Self::from_template(BUNDLED_PROMPT, &default_variables())
    }
}

impl AnalysisPrompt {
    /// Load the prompt, using `custom_path` instead of the bundled text when given.
    pub fn load(custom_path: Option<&str>, variables: &HashMap<String, String>) -> Result<Self> {
        let template = match custom_path {
            Some(path) => {
                let path = PathBuf::from(shellexpand::tilde(path).to_string());
                std::fs::read_to_string(&path).map_err(|e| {
                    SermonError::Config(format!("Cannot read prompt file {:?}: {}", path, e))
                })?
            }
            None => BUNDLED_PROMPT.to_string(),
        };

        let mut merged = default_variables();
        for (key, value) in variables {
            merged.insert(key.clone(), value.clone());
        }

        let prompt = Self::from_template(&template, &merged);
        if prompt.text.trim().is_empty() {
            return Err(SermonError::Config("Analysis prompt is empty".to_string()));
        }
        Ok(prompt)
    }

    /// Render a template with `{{name}}` variables.
    pub fn from_template(template: &str, vars: &HashMap<String, String>) -> Self {
        let mut text = template.to_string();
        for (key, value) in vars {
            text = text.replace(&format!("{{{{{}}}}}", key), value);
        }
        Self { text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

fn default_variables() -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert("church_name".to_string(), "a local church".to_string());
    vars
}

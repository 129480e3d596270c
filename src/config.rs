//! Configuration management
//!
//! Settings live in ~/.config/richiesta/config.json. The completion
//! service is optional: without an API key the engine runs fully local.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Stored key for the completion service; the OPENROUTER_API_KEY
    /// environment variable always takes precedence.
    pub openrouter_api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Deadline for one completion-service request
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Trailing debounce applied to input changes
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
}

fn default_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_debounce() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openrouter_api_key: None,
            model: default_model(),
            request_timeout_secs: default_timeout(),
            debounce_ms: default_debounce(),
        }
    }
}

impl Config {
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("richiesta"))
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return defaults. A corrupt file is backed
    /// up and replaced rather than aborting startup.
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if let Ok(content) = fs::read_to_string(&path) {
                match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(err) => {
                        preserve_corrupt_config(&path, &content);
                        eprintln!(
                            "  Warning: config file was corrupted ({}). A backup was saved and defaults were loaded.",
                            err
                        );
                    }
                }
            }
        }
        Self::default()
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<(), String> {
        let dir =
            Self::config_dir().ok_or_else(|| "could not determine config directory".to_string())?;
        fs::create_dir_all(&dir).map_err(|e| format!("failed to create config directory: {}", e))?;

        let path = dir.join("config.json");
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("failed to serialize config: {}", e))?;

        #[cfg(unix)]
        {
            write_config_atomic(&path, &content)
        }
        #[cfg(not(unix))]
        {
            fs::write(&path, content).map_err(|e| format!("failed to write config: {}", e))
        }
    }

    /// API key for the completion service, environment first.
    pub fn api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            if !key.trim().is_empty() {
                return Some(key);
            }
        }
        self.openrouter_api_key.clone()
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

#[cfg(unix)]
fn write_config_atomic(path: &Path, content: &str) -> Result<(), String> {
    let tmp_path = path.with_extension("tmp");
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)
        .map_err(|e| e.to_string())?;

    file.write_all(content.as_bytes()).map_err(|e| e.to_string())?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.openrouter_api_key.is_none());
        assert_eq!(config.debounce_ms, 1000);
        assert_eq!(config.request_timeout_secs, 10);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"openrouter_api_key": null}"#).unwrap();
        assert_eq!(config.model, default_model());
        assert_eq!(config.debounce_ms, 1000);
    }
}

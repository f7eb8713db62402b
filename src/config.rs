//! Server settings: TOML file plus environment overrides

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{HookError, Result};

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8888";
pub const DEFAULT_SETTINGS_PATH: &str = "hook_settings.toml";
pub const DEFAULT_PROXY_HEADER: &str = "X-Forwarded-For";

/// Process-wide settings, fixed once the server starts.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub bind_address: String,
    /// Directory holding `<runbook>.json` files
    pub config_dir: PathBuf,
    /// Trust `proxy_header` for the caller address
    pub proxy: bool,
    pub proxy_header: String,
    /// Return script output in the response body
    pub echo: bool,
    pub log_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            config_dir: PathBuf::from("."),
            proxy: false,
            proxy_header: DEFAULT_PROXY_HEADER.to_string(),
            echo: false,
            log_dir: None,
        }
    }
}

impl Settings {
    /// Load settings the way the binary does: settings file, then env vars.
    ///
    /// `HOOK_SETTINGS` names the file; without it a missing default file is
    /// not an error.
    pub fn load() -> Result<Self> {
        let (path, explicit) = match std::env::var("HOOK_SETTINGS") {
            Ok(p) => (PathBuf::from(p), true),
            Err(_) => (PathBuf::from(DEFAULT_SETTINGS_PATH), false),
        };

        let mut settings = if explicit || path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            HookError::Configuration(format!(
                "Failed to read settings file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&raw).map_err(|e| {
            HookError::Configuration(format!(
                "Failed to parse settings file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    pub fn from_toml(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Apply `BIND_ADDRESS`, `CONFIG_DIR`, `PROXY`, `PROXY_HEADER`, `ECHO`
    /// and `LOG_DIR` from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BIND_ADDRESS") {
            self.bind_address = v;
        }
        if let Some(v) = lookup("CONFIG_DIR") {
            self.config_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("PROXY") {
            self.proxy = parse_flag("PROXY", &v)?;
        }
        if let Some(v) = lookup("PROXY_HEADER") {
            self.proxy_header = v;
        }
        if let Some(v) = lookup("ECHO") {
            self.echo = parse_flag("ECHO", &v)?;
        }
        if let Some(v) = lookup("LOG_DIR") {
            self.log_dir = Some(PathBuf::from(v));
        }
        Ok(())
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(HookError::Configuration(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_toml_keeps_defaults() {
        let settings = Settings::from_toml("echo = true\nconfig_dir = \"/etc/hooks\"").unwrap();
        assert!(settings.echo);
        assert_eq!(settings.config_dir, PathBuf::from("/etc/hooks"));
        assert_eq!(settings.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(settings.proxy_header, DEFAULT_PROXY_HEADER);
        assert!(!settings.proxy);
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("PROXY", "yes"),
            ("PROXY_HEADER", "X-Real-Ip"),
            ("ECHO", "0"),
            ("LOG_DIR", "/var/log/hooks"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::from_toml("echo = true").unwrap();
        settings
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert!(settings.proxy);
        assert!(!settings.echo);
        assert_eq!(settings.proxy_header, "X-Real-Ip");
        assert_eq!(settings.log_dir, Some(PathBuf::from("/var/log/hooks")));
    }

    #[test]
    fn bad_flag_is_rejected() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(|k| (k == "ECHO").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, HookError::Configuration(_)));
    }

    #[test]
    fn missing_settings_file_is_an_error() {
        let err = Settings::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read settings file"));
    }
}

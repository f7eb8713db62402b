//! Runbook definitions and the store that loads them per request

use async_trait::async_trait;
use ipnetwork::IpNetwork;
use serde::Deserialize;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{HookError, Result};
use crate::templating::{Payload, TemplateError};

/// A single command invocation; `args` are templates until interpolated.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Script {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Script {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

/// On-disk shape of a runbook file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunbookFile {
    scripts: Vec<Script>,
    #[serde(default)]
    allowed_networks: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Runbook {
    pub id: String,
    pub scripts: Vec<Script>,
    pub allowed_networks: Vec<IpNetwork>,
}

impl Runbook {
    /// Parse a runbook definition; `id` is only used for error messages.
    pub fn from_json(id: &str, raw: &str) -> Result<Self> {
        let file: RunbookFile = serde_json::from_str(raw).map_err(|e| {
            HookError::Configuration(format!("Failed to parse runbook '{}': {}", id, e))
        })?;

        let allowed_networks = file
            .allowed_networks
            .iter()
            .map(|net| {
                net.parse::<IpNetwork>().map_err(|e| {
                    HookError::Configuration(format!(
                        "Runbook '{}' has invalid network '{}': {}",
                        id, net, e
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: id.to_string(),
            scripts: file.scripts,
            allowed_networks,
        })
    }

    /// Returns true if `addr` may invoke this runbook.
    ///
    /// No allowlist means anyone may; an unknown address never matches one.
    pub fn addr_is_allowed(&self, addr: Option<IpAddr>) -> bool {
        if self.allowed_networks.is_empty() {
            return true;
        }
        match addr {
            Some(ip) => self.allowed_networks.iter().any(|net| net.contains(ip)),
            None => false,
        }
    }

    /// Rewrite every script argument from the request payload.
    pub fn interpolate(&mut self, payload: &Payload<'_>) -> std::result::Result<(), TemplateError> {
        payload.apply_all(self.scripts.iter_mut().flat_map(|s| s.args.iter_mut()))
    }
}

/// Source of runbooks by identifier
#[async_trait]
pub trait RunbookStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Runbook>;
}

/// Loads `<config_dir>/<id>.json` fresh on every call.
#[derive(Debug, Clone)]
pub struct FileRunbookStore {
    config_dir: PathBuf,
}

impl FileRunbookStore {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.starts_with('.') || id.contains(['/', '\\']) {
            return Err(HookError::Configuration(format!(
                "Invalid runbook identifier '{}'",
                id
            )));
        }
        Ok(self.config_dir.join(format!("{}.json", id)))
    }
}

#[async_trait]
impl RunbookStore for FileRunbookStore {
    async fn load(&self, id: &str) -> Result<Runbook> {
        let path = self.path_for(id)?;
        debug!("Loading runbook '{}' from {:?}", id, path);

        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            HookError::Configuration(format!(
                "Failed to read runbook '{}' at {:?}: {}",
                id, path, e
            ))
        })?;

        Runbook::from_json(id, &raw)
    }
}

//! Crawl Configuration
//!
//! Which enumerator groups a crawl runs. Every group is enabled unless the
//! config names it with `fetch: false`:
//!
//! ```yaml
//! compute_instances:
//!   fetch: true
//! storage_instances:
//!   fetch: false
//! ```

use crate::resource::EnumeratorGroup;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One group's entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchToggle {
    #[serde(default = "enabled")]
    pub fetch: bool,
}

fn enabled() -> bool {
    true
}

impl FetchToggle {
    pub fn new(fetch: bool) -> Self {
        Self { fetch }
    }
}

/// Enabled flags per enumerator group; a missing entry means enabled
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_instances: Option<FetchToggle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_instances: Option<FetchToggle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gke_instances: Option<FetchToggle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mq_instances: Option<FetchToggle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_instances: Option<FetchToggle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serverless_instances: Option<FetchToggle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sourcerepo_instances: Option<FetchToggle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_instances: Option<FetchToggle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_instances: Option<FetchToggle>,
}

impl CrawlConfig {
    /// The entry governing `group`, if the config names it
    pub fn entry(&self, group: EnumeratorGroup) -> Option<FetchToggle> {
        *self.slot(group)
    }

    pub fn set(&mut self, group: EnumeratorGroup, fetch: bool) {
        *self.slot_mut(group) = Some(FetchToggle::new(fetch));
    }

    /// Builder form of [`set`](Self::set)
    pub fn with(mut self, group: EnumeratorGroup, fetch: bool) -> Self {
        self.set(group, fetch);
        self
    }

    pub fn is_enabled(&self, group: EnumeratorGroup) -> bool {
        self.entry(group).map_or(true, |toggle| toggle.fetch)
    }

    fn slot(&self, group: EnumeratorGroup) -> &Option<FetchToggle> {
        match group {
            EnumeratorGroup::Compute => &self.compute_instances,
            EnumeratorGroup::Database => &self.db_instances,
            EnumeratorGroup::Gke => &self.gke_instances,
            EnumeratorGroup::Messaging => &self.mq_instances,
            EnumeratorGroup::Network => &self.network_instances,
            EnumeratorGroup::Serverless => &self.serverless_instances,
            EnumeratorGroup::SourceRepo => &self.sourcerepo_instances,
            EnumeratorGroup::Storage => &self.storage_instances,
            EnumeratorGroup::Project => &self.project_instances,
        }
    }

    fn slot_mut(&mut self, group: EnumeratorGroup) -> &mut Option<FetchToggle> {
        match group {
            EnumeratorGroup::Compute => &mut self.compute_instances,
            EnumeratorGroup::Database => &mut self.db_instances,
            EnumeratorGroup::Gke => &mut self.gke_instances,
            EnumeratorGroup::Messaging => &mut self.mq_instances,
            EnumeratorGroup::Network => &mut self.network_instances,
            EnumeratorGroup::Serverless => &mut self.serverless_instances,
            EnumeratorGroup::SourceRepo => &mut self.sourcerepo_instances,
            EnumeratorGroup::Storage => &mut self.storage_instances,
            EnumeratorGroup::Project => &mut self.project_instances,
        }
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gcpcrawl").join("crawl.yaml"))
    }

    /// Parse a config file; `.json` is read as JSON, anything else as YAML
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read crawl config {}", path.display()))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid crawl config {}", path.display()))
        } else {
            Self::from_yaml(&content)
                .with_context(|| format!("Invalid crawl config {}", path.display()))
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty file is an empty mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load the explicit path if given, else the default location if a file
    /// exists there. `None` means no config: every group enabled.
    pub fn load(explicit: Option<&Path>) -> Result<Option<Self>> {
        if let Some(path) = explicit {
            return Self::from_path(path).map(Some);
        }

        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::info!("Using crawl config {}", path.display());
                Self::from_path(&path).map(Some)
            },
            _ => Ok(None),
        }
    }
}

/// Whether `group` runs under `config`; no config enables everything
pub fn is_enabled(config: Option<&CrawlConfig>, group: EnumeratorGroup) -> bool {
    config.map_or(true, |c| c.is_enabled(group))
}

/// Enabled groups in start order
pub fn enabled_groups(config: Option<&CrawlConfig>) -> Vec<EnumeratorGroup> {
    EnumeratorGroup::ALL
        .into_iter()
        .filter(|group| is_enabled(config, *group))
        .collect()
}

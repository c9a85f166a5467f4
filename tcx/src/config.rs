use std::{collections::BTreeMap, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tcx_collector::SubCollector;

/// Label of the namespace the legacy `interfaces` list is scraped in.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Top-level configuration of the exporter.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Address the HTTP server listens on. Default: "0.0.0.0:9704".
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Value of the `host` label. Default: the machine's hostname.
    #[serde(default)]
    pub host: Option<String>,

    /// Devices scraped in the default namespace. Kept for single-namespace configurations,
    /// merged into `namespaces`.
    #[serde(default)]
    pub interfaces: Vec<String>,

    /// Devices to scrape per namespace. A namespace is `default`, a name registered under
    /// `/run/netns`, or a path to a namespace file.
    #[serde(default)]
    pub namespaces: BTreeMap<String, Vec<String>>,

    /// Sub-collectors to run. Default: all of them.
    #[serde(default = "default_collectors")]
    pub collectors: Vec<String>,

    /// Give up on a scrape unit after this long. Default: no timeout.
    #[serde(default, with = "humantime_serde")]
    pub unit_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            host: None,
            interfaces: Vec::new(),
            namespaces: BTreeMap::new(),
            collectors: default_collectors(),
            unit_timeout: None,
        }
    }
}

fn default_listen_address() -> String {
    "0.0.0.0:9704".to_string()
}

fn default_collectors() -> Vec<String> {
    SubCollector::ALL.iter().map(|c| c.as_str().to_string()).collect()
}

impl Config {
    /// Load, normalize and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        Self::parse(&data).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Parse, normalize and validate a YAML document.
    pub fn parse(data: &str) -> Result<Self> {
        let mut cfg: Self = serde_yaml::from_str(data)?;
        cfg.normalize();
        cfg.validate()?;

        Ok(cfg)
    }

    /// Merge the legacy `interfaces` list into the default namespace.
    fn normalize(&mut self) {
        if self.interfaces.is_empty() {
            return;
        }

        let devices = self.namespaces.entry(DEFAULT_NAMESPACE.to_string()).or_default();
        for link in self.interfaces.drain(..) {
            if !devices.contains(&link) {
                devices.push(link);
            }
        }
    }

    /// Validate the configuration for required fields and consistency.
    pub fn validate(&self) -> Result<()> {
        if self.listen_address.trim().is_empty() {
            bail!("listen_address must not be empty");
        }

        if !self.namespaces.values().any(|devices| !devices.is_empty()) {
            bail!("at least one namespace with a device is required (namespaces or interfaces)");
        }

        for (name, devices) in &self.namespaces {
            if name.is_empty() {
                bail!("namespace names must not be empty");
            }
            if devices.iter().any(|link| link.is_empty()) {
                bail!("namespace {name:?} lists an empty device name");
            }
        }

        if self.collectors.is_empty() {
            bail!("at least one collector is required");
        }
        self.sub_collectors()?;

        if self.unit_timeout.is_some_and(|timeout| timeout.is_zero()) {
            bail!("unit_timeout must be positive");
        }

        Ok(())
    }

    /// The configured sub-collectors.
    pub fn sub_collectors(&self) -> Result<Vec<SubCollector>> {
        self.collectors
            .iter()
            .map(|name| name.parse::<SubCollector>().map_err(anyhow::Error::from))
            .collect()
    }

    /// The `host` label, falling back to the machine's hostname.
    pub fn host(&self) -> String {
        self.host.clone().unwrap_or_else(tcx_common::hostname)
    }
}

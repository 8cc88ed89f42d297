use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use bfdr_collect::CollectConfig;
use bfdr_core::ExtractionConfig;
use serde::Deserialize;

/// Contents of the optional `--config` TOML file.
///
/// ```toml
/// [extraction]
/// pregnancy_horizon_months = 10
/// annotate_sources = false
///
/// [server]
/// base_url = "https://ehr.example.org/fhir"
/// child_identifier_system = "urn:oid:2.16.840.1.113883.6.1000"
/// ```
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub extraction: ExtractionConfig,
    pub server: CollectConfig,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid config file")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Cannot load {}", path.display()))
    }
}

/// Values given on the command line win over the file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub pregnancy_horizon_months: Option<u32>,
    pub no_annotations: bool,
    pub server: Option<String>,
    pub token: Option<String>,
    pub child_identifier_system: Option<String>,
}

impl FileConfig {
    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(months) = overrides.pregnancy_horizon_months {
            self.extraction.pregnancy_horizon_months = months;
        }
        if overrides.no_annotations {
            self.extraction.annotate_sources = false;
        }
        if let Some(server) = overrides.server {
            self.server.base_url = server;
        }
        if overrides.token.is_some() {
            self.server.access_token = overrides.token;
        }
        if let Some(system) = overrides.child_identifier_system {
            self.server.child_identifier_system = system;
        }
        self
    }
}

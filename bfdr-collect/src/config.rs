use serde::{Deserialize, Serialize};

pub const DEFAULT_CHILD_IDENTIFIER_SYSTEM: &str = "urn:oid:2.16.840.1.113883.6.1000";

/// Where and how records are collected from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CollectConfig {
    /// FHIR base URL; search paths are appended to it.
    pub base_url: String,
    /// Identifier system the child MRNs belong to.
    pub child_identifier_system: String,
    pub access_token: Option<String>,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            child_identifier_system: DEFAULT_CHILD_IDENTIFIER_SYSTEM.to_string(),
            access_token: None,
        }
    }
}

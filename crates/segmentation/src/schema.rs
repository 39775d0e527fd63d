//! Versioned persistence format for segment definitions.
//!
//! A segment is stored as a saved query: its rule tree is kept verbatim and
//! re-evaluated against current customer data on every materialization.

use chrono::{DateTime, Utc};
use intel_core::error::IntelError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::rules::RuleNode;

/// Current schema version written by this build.
pub const SEGMENT_SCHEMA_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("unsupported segment schema version {found} (this build reads up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("malformed segment definition: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid segment rule: {0}")]
    InvalidRule(String),

    #[error("segment name must not be empty")]
    EmptyName,
}

impl From<SchemaError> for IntelError {
    fn from(err: SchemaError) -> Self {
        IntelError::Validation(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SegmentDefinition {
    /// Definitions written before versioning existed are read as version 1.
    #[serde(default = "legacy_schema_version")]
    pub schema_version: u32,
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub rule: RuleNode,
    pub created_at: DateTime<Utc>,
}

fn legacy_schema_version() -> u32 {
    1
}

impl SegmentDefinition {
    /// Create a new definition, validating the name and rule shape.
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        rule: RuleNode,
    ) -> Result<Self, SchemaError> {
        let definition = Self {
            schema_version: SEGMENT_SCHEMA_VERSION,
            id: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            description,
            rule,
            created_at: Utc::now(),
        };
        definition.validate()?;
        Ok(definition)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.schema_version > SEGMENT_SCHEMA_VERSION {
            return Err(SchemaError::UnsupportedVersion {
                found: self.schema_version,
                supported: SEGMENT_SCHEMA_VERSION,
            });
        }
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyName);
        }
        self.rule.validate().map_err(SchemaError::InvalidRule)
    }

    pub fn from_json(raw: &str) -> Result<Self, SchemaError> {
        let definition: SegmentDefinition = serde_json::from_str(raw)?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn to_json(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string(self)?)
    }
}

//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mandatory field: credential used to address the remote store.
pub const FIELD_API_KEY: &str = "api_key";
/// Mandatory field: identifier of the remote project/collection.
pub const FIELD_PROJECT_ID: &str = "project_id";

const MANDATORY_FIELDS: [&str; 2] = [FIELD_API_KEY, FIELD_PROJECT_ID];

/// Named credential and identity fields addressing the remote store.
///
/// The engine treats the configuration as an opaque mapping apart from
/// validation: [`FIELD_API_KEY`] and [`FIELD_PROJECT_ID`] must be
/// present and non-empty, everything else is pass-through for the
/// remote implementation. Serializable so an external settings surface
/// can persist it.
///
/// # Example
///
/// ```rust
/// use kvbridge_engine::SyncConfig;
///
/// let config = SyncConfig::new("AIza-example", "demo-project")
///     .with_field("auth_domain", "demo-project.example.com");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    fields: BTreeMap<String, String>,
}

impl SyncConfig {
    /// Creates a configuration with the two mandatory fields set.
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self::default()
            .with_field(FIELD_API_KEY, api_key)
            .with_field(FIELD_PROJECT_ID, project_id)
    }

    /// Creates a configuration from an existing field mapping.
    #[must_use]
    pub fn from_fields(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }

    /// Sets a named field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns a field's value, if set.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Returns all fields.
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Checks that the mandatory fields are present and non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] naming the first missing
    /// field.
    pub fn validate(&self) -> SyncResult<()> {
        for name in MANDATORY_FIELDS {
            match self.fields.get(name) {
                Some(value) if !value.is_empty() => {}
                _ => {
                    return Err(SyncError::Configuration(format!(
                        "missing mandatory field `{name}`"
                    )))
                }
            }
        }
        Ok(())
    }
}

//! CodeSystem projection
//!
//! The import engine reads CodeSystem resources but never writes them. This
//! module projects the few elements the engine cares about out of the stored
//! resource JSON while keeping the full resource around for the operation
//! response.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::{Error, Result};

/// A property definition declared by a CodeSystem resource, or synthesized
/// for implicit hierarchy properties.
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyDefinition {
    pub code: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(rename = "type", default)]
    pub property_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A stored CodeSystem resource together with the projection the import
/// engine dispatches on.
#[derive(Debug, Clone)]
pub struct CodeSystemRecord {
    /// Row id of the resource; foreign key for all terminology tables.
    pub id: String,
    pub url: String,
    pub hierarchy_meaning: Option<String>,
    pub properties: Vec<PropertyDefinition>,
    /// The unmodified resource JSON.
    pub resource: JsonValue,
}

impl CodeSystemRecord {
    pub fn from_resource(id: String, resource: JsonValue) -> Result<Self> {
        let url = resource
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Validation("CodeSystem resource has no url".to_string()))?
            .to_string();

        let hierarchy_meaning = resource
            .get("hierarchyMeaning")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let properties = match resource.get("property") {
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|e| {
                Error::Validation(format!("CodeSystem '{url}' has malformed properties: {e}"))
            })?,
            None => Vec::new(),
        };

        Ok(Self {
            id,
            url,
            hierarchy_meaning,
            properties,
            resource,
        })
    }

    pub fn declared_property(&self, code: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.code == code)
    }
}

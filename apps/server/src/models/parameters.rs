//! FHIR Parameters resource
//!
//! Operation inputs and outputs travel as a `Parameters` resource. Values are
//! kept as raw JSON keyed by their `value[x]` element name so the model stays
//! agnostic of the concrete FHIR datatype; callers pick out what they need.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameters {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameter: Vec<Parameter>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part: Option<Vec<Parameter>>,
    /// Remaining elements, notably the polymorphic `value[x]` choice.
    #[serde(flatten)]
    pub value: serde_json::Map<String, JsonValue>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self::new()
    }
}

impl Parameters {
    pub fn new() -> Self {
        Self {
            resource_type: "Parameters".to_string(),
            parameter: Vec::new(),
        }
    }

    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        let parameters: Parameters = serde_json::from_slice(bytes)
            .map_err(|e| crate::Error::Validation(format!("Invalid Parameters resource: {e}")))?;
        if parameters.resource_type != "Parameters" {
            return Err(crate::Error::Validation(format!(
                "Expected a Parameters resource, got '{}'",
                parameters.resource_type
            )));
        }
        Ok(parameters)
    }

    /// All parameters with the given name, in document order.
    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Parameter> {
        self.parameter.iter().filter(move |p| p.name == name)
    }

    /// The first `value[x]` payload carried by a parameter of the given name.
    pub fn get_value<'a>(&'a self, name: &'a str) -> Option<&'a JsonValue> {
        self.all(name).next().and_then(Parameter::value)
    }

    pub fn add_resource(&mut self, name: impl Into<String>, resource: JsonValue) {
        self.parameter.push(Parameter {
            name: name.into(),
            resource: Some(resource),
            ..Parameter::default()
        });
    }
}

impl Parameter {
    /// The polymorphic `value[x]` payload, whatever its concrete type.
    pub fn value(&self) -> Option<&JsonValue> {
        self.value
            .iter()
            .find(|(key, _)| key.starts_with("value"))
            .map(|(_, value)| value)
    }

    pub fn value_str(&self) -> Option<&str> {
        self.value().and_then(JsonValue::as_str)
    }

    pub fn part(&self, name: &str) -> Option<&Parameter> {
        self.part.as_deref()?.iter().find(|p| p.name == name)
    }

    /// String value of a named part, for part groups of primitive values.
    pub fn part_value_str(&self, name: &str) -> Option<&str> {
        self.part(name)?.value_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_import_shaped_parameters() {
        let body = json!({
            "resourceType": "Parameters",
            "parameter": [
                { "name": "system", "valueUri": "http://ex/cs" },
                { "name": "concept", "valueCoding": { "code": "A", "display": "Alpha" } },
                { "name": "concept", "valueCoding": { "code": "B" } },
                {
                    "name": "property",
                    "part": [
                        { "name": "code", "valueCode": "B" },
                        { "name": "property", "valueCode": "parent" },
                        { "name": "value", "valueString": "A" }
                    ]
                }
            ]
        });

        let params = Parameters::from_slice(body.to_string().as_bytes()).expect("parse");

        assert_eq!(
            params.get_value("system").and_then(|v| v.as_str()),
            Some("http://ex/cs")
        );
        assert_eq!(params.all("concept").count(), 2);

        let group = params.all("property").next().expect("property group");
        assert_eq!(group.part_value_str("code"), Some("B"));
        assert_eq!(group.part_value_str("property"), Some("parent"));
        assert_eq!(group.part_value_str("value"), Some("A"));
    }

    #[test]
    fn rejects_non_parameters_resource() {
        let body = json!({ "resourceType": "Patient" });
        let err = Parameters::from_slice(body.to_string().as_bytes()).expect_err("must fail");
        assert!(err.to_string().contains("Parameters"));
    }

    #[test]
    fn output_serializes_with_resource_type() {
        let mut out = Parameters::new();
        out.add_resource("return", json!({ "resourceType": "CodeSystem" }));

        let value = serde_json::to_value(&out).expect("serialize");
        assert_eq!(value["resourceType"], "Parameters");
        assert_eq!(value["parameter"][0]["name"], "return");
        assert_eq!(
            value["parameter"][0]["resource"]["resourceType"],
            "CodeSystem"
        );
    }
}

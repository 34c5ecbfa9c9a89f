//! Wire DTOs for the management server's API and topology-processor services.
//!
//! # Design
//! Targets sent by the caller are strongly typed. Targets read back from the
//! server are deserialized leniently (`ListedTarget`): every field stays as
//! opaque JSON until it is compared, so a listing with unexpected shapes
//! never turns a lookup into a hard failure.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the input field that acts as a target's natural key.
pub const TARGET_IDENTIFIER: &str = "targetIdentifier";

/// Name of the input field carrying a probe-backed target's channel.
pub const COMMUNICATION_BINDING_CHANNEL: &str = "communicationBindingChannel";

/// Session cookie issued by the API service on login.
pub const SESSION_COOKIE: &str = "JSESSIONID";

/// Resource kinds addressable through a `Request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Login,
    Targets,
    ExternalTargets,
    /// Topology-processor probe registry.
    Probe,
    /// Topology-processor target collection.
    Target,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Login => "login",
            ResourceType::Targets => "targets",
            ResourceType::ExternalTargets => "externalTargets",
            ResourceType::Probe => "probe",
            ResourceType::Target => "target",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A target to register with the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub category: String,
    #[serde(rename = "type")]
    pub target_type: String,
    #[serde(default)]
    pub input_fields: Vec<InputField>,
}

impl Target {
    pub fn new(category: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            target_type: target_type.into(),
            input_fields: Vec::new(),
        }
    }

    /// Append an input field with no group properties.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.input_fields.push(InputField::new(name, value));
        self
    }

    /// Value of the first input field called `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.input_fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.target_type)?;
        if let Some(id) = self.field(TARGET_IDENTIFIER) {
            write!(f, " ({id})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputField {
    pub name: String,
    pub value: String,
    /// Passed through untouched; the client never inspects these.
    #[serde(default)]
    pub group_properties: Vec<serde_json::Value>,
}

impl InputField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            group_properties: Vec::new(),
        }
    }
}

/// One element of the `GET /targets` listing.
///
/// Fields stay as raw JSON and are only read as strings when compared. A
/// missing or non-string value reads as `""`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedTarget {
    #[serde(default)]
    pub uuid: serde_json::Value,
    #[serde(default)]
    pub category: serde_json::Value,
    #[serde(default, rename = "type")]
    pub target_type: serde_json::Value,
    #[serde(default)]
    pub input_fields: serde_json::Value,
}

impl ListedTarget {
    /// Read one element of a listing. Anything other than a JSON object
    /// yields `None`.
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    pub fn category(&self) -> &str {
        self.category.as_str().unwrap_or("")
    }

    pub fn target_type(&self) -> &str {
        self.target_type.as_str().unwrap_or("")
    }

    /// Values of every field named `targetIdentifier`, in listing order.
    ///
    /// Non-string values read as the empty string.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.input_fields
            .as_array()
            .into_iter()
            .flatten()
            .filter(|f| f.get("name").and_then(serde_json::Value::as_str) == Some(TARGET_IDENTIFIER))
            .map(|f| f.get("value").and_then(serde_json::Value::as_str).unwrap_or(""))
    }
}

/// Error body returned by the server alongside non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorDto {
    #[serde(default)]
    pub message: Option<String>,
}

/// Opaque probe identifier. The registry reports numbers today; strings
/// are accepted and echoed back in whatever form they arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProbeId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ProbeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeId::Number(n) => write!(f, "{n}"),
            ProbeId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProbeDescription {
    pub id: ProbeId,
    #[serde(rename = "type")]
    pub probe_type: String,
    pub category: String,
}

/// Body of `GET {tp}/probe`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeRegistry {
    #[serde(default)]
    pub probes: Vec<ProbeDescription>,
}

/// Target creation payload understood by the topology processor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TpTargetSpec {
    pub probe_id: ProbeId,
    pub input_fields: Vec<TpInputField>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub communication_binding_channel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TpInputField {
    pub name: String,
    pub value: String,
}

impl From<&InputField> for TpInputField {
    fn from(field: &InputField) -> Self {
        Self {
            name: field.name.clone(),
            value: field.value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_serializes_with_wire_names() {
        let target = Target::new("Hypervisor", "vCenter").with_field("nameOrAddress", "10.0.0.1");
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["category"], "Hypervisor");
        assert_eq!(json["type"], "vCenter");
        assert_eq!(json["inputFields"][0]["name"], "nameOrAddress");
        assert_eq!(json["inputFields"][0]["value"], "10.0.0.1");
        assert!(json["inputFields"][0]["groupProperties"].as_array().unwrap().is_empty());
    }

    #[test]
    fn listed_target_tolerates_missing_and_null_fields() {
        let listed: Vec<ListedTarget> = serde_json::from_str(
            r#"[{"uuid":"1"},{"category":null,"type":"vCenter","inputFields":null}]"#,
        )
        .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].category(), "");
        assert_eq!(listed[1].target_type(), "vCenter");
        assert_eq!(listed[1].identifiers().count(), 0);
    }

    #[test]
    fn listed_target_reads_wrong_shapes_as_empty() {
        let listed: ListedTarget = serde_json::from_str(
            r#"{"category":7,"type":["x"],"inputFields":[{"name":5,"value":"a"},"junk",{"name":"targetIdentifier","value":{"k":1}}]}"#,
        )
        .unwrap();
        assert_eq!(listed.category(), "");
        assert_eq!(listed.target_type(), "");
        let ids: Vec<&str> = listed.identifiers().collect();
        assert_eq!(ids, vec![""]);

        let scalar: ListedTarget = serde_json::from_str(r#"{"inputFields":"none"}"#).unwrap();
        assert_eq!(scalar.identifiers().count(), 0);
    }

    #[test]
    fn listed_target_from_value_skips_non_objects() {
        assert!(ListedTarget::from_value(serde_json::json!("target")).is_none());
        assert!(ListedTarget::from_value(serde_json::json!(3)).is_none());
        let listed = ListedTarget::from_value(serde_json::json!({"category": "Custom"})).unwrap();
        assert_eq!(listed.category(), "Custom");
    }

    #[test]
    fn listed_identifier_reads_non_strings_as_empty() {
        let listed: ListedTarget = serde_json::from_str(
            r#"{"inputFields":[{"name":"targetIdentifier","value":42},{"name":"targetIdentifier","value":"k8s-1"}]}"#,
        )
        .unwrap();
        let ids: Vec<&str> = listed.identifiers().collect();
        assert_eq!(ids, vec!["", "k8s-1"]);
    }

    #[test]
    fn probe_id_accepts_numbers_and_strings() {
        let registry: ProbeRegistry = serde_json::from_str(
            r#"{"probes":[{"id":7,"type":"Kubernetes","category":"Cloud Native"},{"id":"abc","type":"vCenter","category":"Hypervisor"}]}"#,
        )
        .unwrap();
        assert_eq!(registry.probes[0].id, ProbeId::Number(7));
        assert_eq!(registry.probes[1].id.to_string(), "abc");
    }

    #[test]
    fn tp_spec_omits_empty_channel() {
        let spec = TpTargetSpec {
            probe_id: ProbeId::Number(3),
            input_fields: vec![TpInputField {
                name: "a".into(),
                value: "b".into(),
            }],
            communication_binding_channel: String::new(),
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["probeId"], 3);
        assert!(json.get("communicationBindingChannel").is_none());
    }
}

//! Serde model of a deployment template, plus the intrinsic-function tokens
//! used to wire resources together by logical identity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Pseudo parameters resolved by the provisioning service.
pub const PSEUDO_REGION: &str = "AWS::Region";
pub const PSEUDO_ACCOUNT_ID: &str = "AWS::AccountId";

/// A reference to another resource's primary identifier.
pub fn get_ref(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// A reference to a named attribute of another resource.
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// Concatenation deferred to the provisioning service, so parts may contain
/// other intrinsic tokens.
pub fn fn_join(separator: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [separator, parts] })
}

/// What should happen to a resource when its stack is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    Destroy,
    Retain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPolicy {
    Delete,
    Retain,
}

impl From<RemovalPolicy> for DeletionPolicy {
    fn from(policy: RemovalPolicy) -> Self {
        match policy {
            RemovalPolicy::Destroy => DeletionPolicy::Delete,
            RemovalPolicy::Retain => DeletionPolicy::Retain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Properties")]
    pub properties: Value,
    #[serde(rename = "DependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(rename = "DeletionPolicy", default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
}

impl ResourceDef {
    pub fn new(ty: impl Into<String>, properties: Value) -> Self {
        Self {
            ty: ty.into(),
            properties,
            depends_on: Vec::new(),
            deletion_policy: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterDef {
    pub fn string(description: &str) -> Self {
        Self {
            ty: "String".to_string(),
            description: Some(description.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDef {
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Value")]
    pub value: Value,
}

/// A fully assembled deployment template. String maps are `BTreeMap` so the
/// serialized form is deterministic for identical inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub version: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Parameters", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParameterDef>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, ResourceDef>,
    #[serde(rename = "Outputs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, OutputDef>,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: None,
            parameters: Default::default(),
            resources: Default::default(),
            outputs: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sections_are_elided() {
        let mut template = Template::default();
        template.resources.insert(
            "Thing".to_string(),
            ResourceDef::new("AWS::SNS::Topic", json!({})),
        );
        let body = serde_json::to_value(&template).unwrap();
        assert_eq!(body["AWSTemplateFormatVersion"], "2010-09-09");
        assert!(body.get("Parameters").is_none());
        assert!(body.get("Outputs").is_none());
        assert!(body["Resources"]["Thing"].get("DependsOn").is_none());
        assert!(body["Resources"]["Thing"].get("DeletionPolicy").is_none());
    }

    #[test]
    fn deletion_policy_serializes_as_its_wire_name() {
        let mut resource = ResourceDef::new("AWS::DynamoDB::Table", json!({}));
        resource.deletion_policy = Some(RemovalPolicy::Destroy.into());
        let body = serde_json::to_value(&resource).unwrap();
        assert_eq!(body["DeletionPolicy"], "Delete");
    }

    #[test]
    fn intrinsic_tokens_have_the_expected_shape() {
        assert_eq!(get_ref("TableItems"), json!({ "Ref": "TableItems" }));
        assert_eq!(
            get_att("TableItems", "Arn"),
            json!({ "Fn::GetAtt": ["TableItems", "Arn"] })
        );
        assert_eq!(
            fn_join("", vec![json!("a"), get_ref("B")]),
            json!({ "Fn::Join": ["", ["a", { "Ref": "B" }]] })
        );
    }
}

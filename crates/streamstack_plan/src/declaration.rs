//! JSON declaration files.
//!
//! A declaration lists resources in order with raw property bags. Values
//! use `{"$ref": "<id>.<attribute>"}` and `{"$join": {...}}` markers for
//! references. References are not checked on load; the validator reports
//! dangling targets and unknown attributes together with everything else.

use crate::dag::StackGraph;
use crate::emit::Emitter;
use crate::error::GraphResult;
use crate::output::OutputBinding;
use crate::resource::{DeletionPolicy, ResourceDescriptor};
use crate::value::{AttributeReference, PropertyValue};
use serde::{Deserialize, Serialize};
use std::path::Path;
use streamstack_core::{CoreError, LogicalId, ResourceKind};
use tracing::debug;

/// A resource entry in a declaration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourceEntry {
    /// Logical id
    pub id: LogicalId,
    /// Kind name or engine type
    pub kind: String,
    /// Raw property bag
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    /// Explicit dependencies
    #[serde(default)]
    pub depends_on: Vec<LogicalId>,
    /// `Delete` or `Retain` on stack deletion; engine default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
}

/// An output entry in a declaration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputEntry {
    /// Output name
    pub name: LogicalId,
    /// `<id>.<attribute>` of the exported value
    #[serde(rename = "ref")]
    pub reference: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A stack declared in a JSON file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackDeclaration {
    /// Template description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Resources in declaration order
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
    /// Named outputs
    #[serde(default)]
    pub outputs: Vec<OutputEntry>,
}

impl StackDeclaration {
    /// Parse from JSON text
    ///
    /// # Errors
    ///
    /// Returns error if the JSON does not match the declaration format
    pub fn from_json_str(input: &str) -> GraphResult<Self> {
        Ok(serde_json::from_str(input).map_err(CoreError::from)?)
    }

    /// Load from a JSON file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_path(path: impl AsRef<Path>) -> GraphResult<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|e| CoreError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&input)
    }

    /// Emitter carrying the declared description
    #[must_use]
    pub fn emitter(&self) -> Emitter {
        match &self.description {
            Some(description) => Emitter::new().with_description(description.clone()),
            None => Emitter::new(),
        }
    }

    /// Build the graph in declaration order
    ///
    /// # Errors
    ///
    /// Returns error on an unknown kind, a malformed marker, a malformed
    /// output reference or a duplicate id
    pub fn into_graph(self) -> GraphResult<StackGraph> {
        let mut graph = StackGraph::new();

        for entry in self.resources {
            let kind: ResourceKind = entry.kind.parse()?;
            let mut builder = entry
                .depends_on
                .iter()
                .fold(ResourceDescriptor::builder(kind, entry.id), |b, dep| {
                    b.depends_on(dep)
                });
            for (name, value) in entry.properties {
                builder = builder.property(name, PropertyValue::from_json(value)?);
            }
            if let Some(policy) = entry.deletion_policy {
                builder = builder.deletion_policy(policy);
            }
            graph.add_resource(builder.build())?;
        }

        for entry in self.outputs {
            let value = AttributeReference::parse(&entry.reference)?;
            let binding = OutputBinding::new(entry.name, value);
            let binding = match entry.description {
                Some(description) => binding.with_description(description),
                None => binding,
            };
            graph.add_output(binding)?;
        }

        debug!(
            resources = graph.len(),
            outputs = graph.outputs().count(),
            "loaded declaration"
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::validate::Validator;
    use std::io::Write;

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    const PACKAGING: &str = r#"{
        "description": "packaging only",
        "resources": [
            { "id": "pc1", "kind": "PackagingChannel", "properties": { "id": "live" } },
            {
                "id": "pe1",
                "kind": "AWS::MediaPackage::OriginEndpoint",
                "properties": { "id": "hls", "channelId": "live", "manifestName": "index" },
                "dependsOn": ["pc1"]
            }
        ],
        "outputs": [
            { "name": "PlaybackUrl", "ref": "pe1.url", "description": "HLS URL" }
        ]
    }"#;

    #[test]
    fn test_load_and_emit() {
        let declaration = StackDeclaration::from_json_str(PACKAGING).unwrap();
        let emitter = declaration.emitter();
        let valid = Validator::new()
            .validate(declaration.into_graph().unwrap())
            .unwrap();

        assert_eq!(valid.topological_order(), &[id("pc1"), id("pe1")]);
        let doc = emitter.emit(&valid);
        let value = doc.as_value();
        assert_eq!(value["Description"], "packaging only");
        assert_eq!(value["Resources"]["pe1"]["DependsOn"], serde_json::json!(["pc1"]));
        assert_eq!(
            value["Outputs"]["PlaybackUrl"]["Value"],
            serde_json::json!({ "Fn::GetAtt": ["pe1", "Url"] })
        );
    }

    #[test]
    fn test_forward_dependency_is_allowed() {
        let declaration = StackDeclaration::from_json_str(
            r#"{ "resources": [
                { "id": "b2", "kind": "Bucket", "dependsOn": ["b1"] },
                { "id": "b1", "kind": "Bucket" }
            ] }"#,
        )
        .unwrap();

        let valid = Validator::new()
            .validate(declaration.into_graph().unwrap())
            .unwrap();
        assert_eq!(valid.topological_order(), &[id("b1"), id("b2")]);
    }

    #[test]
    fn test_references_checked_at_validation() {
        let declaration = StackDeclaration::from_json_str(
            r#"{ "resources": [
                { "id": "b1", "kind": "Bucket" },
                {
                    "id": "i1",
                    "kind": "Input",
                    "properties": {
                        "type": "MP4_FILE",
                        "sources": [{ "url": { "$ref": "b1.bucketUrl" } }],
                        "roleArn": { "$ref": "ghost.arn" }
                    }
                }
            ] }"#,
        )
        .unwrap();

        let graph = declaration.into_graph().unwrap();
        let report = Validator::new().validate(graph).unwrap_err();
        assert_eq!(
            report.errors(),
            &[
                GraphError::DanglingReference {
                    from: id("i1"),
                    to: id("ghost"),
                },
                GraphError::UnknownAttribute {
                    id: id("b1"),
                    kind: ResourceKind::Bucket,
                    attribute: "bucketUrl".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_deletion_policy_entry() {
        let declaration = StackDeclaration::from_json_str(
            r#"{ "resources": [
                { "id": "b1", "kind": "Bucket", "deletionPolicy": "Retain" },
                { "id": "b2", "kind": "Bucket" }
            ] }"#,
        )
        .unwrap();
        assert_eq!(
            declaration.resources[0].deletion_policy,
            Some(DeletionPolicy::Retain)
        );

        let emitter = declaration.emitter();
        let valid = Validator::new()
            .validate(declaration.into_graph().unwrap())
            .unwrap();
        let doc = emitter.emit(&valid);
        let resources = &doc.as_value()["Resources"];
        assert_eq!(resources["b1"]["DeletionPolicy"], "Retain");
        assert!(resources["b2"].get("DeletionPolicy").is_none());
    }

    #[test]
    fn test_unknown_kind() {
        let declaration = StackDeclaration::from_json_str(
            r#"{ "resources": [{ "id": "q1", "kind": "Queue" }] }"#,
        )
        .unwrap();
        assert!(matches!(
            declaration.into_graph(),
            Err(GraphError::Core(CoreError::UnknownKind { .. }))
        ));
    }

    #[test]
    fn test_duplicate_id() {
        let declaration = StackDeclaration::from_json_str(
            r#"{ "resources": [
                { "id": "b1", "kind": "Bucket" },
                { "id": "b1", "kind": "Bucket" }
            ] }"#,
        )
        .unwrap();
        assert_eq!(
            declaration.into_graph().unwrap_err(),
            GraphError::DuplicateId { id: id("b1") }
        );
    }

    #[test]
    fn test_invalid_logical_id_rejected_on_parse() {
        let result = StackDeclaration::from_json_str(
            r#"{ "resources": [{ "id": "my-bucket", "kind": "Bucket" }] }"#,
        );
        assert!(matches!(result, Err(GraphError::Core(CoreError::Encoding { .. }))));
    }

    #[test]
    fn test_malformed_output_reference() {
        let declaration = StackDeclaration::from_json_str(
            r#"{ "outputs": [{ "name": "Url", "ref": "pe1" }] }"#,
        )
        .unwrap();
        assert!(declaration.into_graph().is_err());
    }

    #[test]
    fn test_from_path_missing_manifest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "resources": [
                {{ "id": "pe1", "kind": "PackagingEndpoint", "properties": {{ "id": "hls", "channelId": "live" }} }}
            ] }}"#
        )
        .unwrap();

        let graph = StackDeclaration::from_path(file.path())
            .unwrap()
            .into_graph()
            .unwrap();
        let report = Validator::new().validate(graph).unwrap_err();
        assert_eq!(
            report.errors(),
            &[GraphError::MissingRequiredProperty {
                id: id("pe1"),
                property: "manifestName".to_string(),
            }]
        );
    }

    #[test]
    fn test_from_missing_path() {
        let result = StackDeclaration::from_path("/nonexistent/stack.json");
        assert!(matches!(result, Err(GraphError::Core(CoreError::Io { .. }))));
    }
}

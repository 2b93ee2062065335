//! Template emitter.
//!
//! Serializes a validated graph into the provisioning engine's JSON template.
//! References are written in the engine's native syntax and never resolved
//! here. Emission is a pure function of the graph: the same declarations
//! always give the same bytes.

use crate::dag::{EdgeOrigin, StackGraph};
use crate::resource::{attribute, NativeRef, ResourceDescriptor};
use crate::validate::ValidGraph;
use crate::value::{AttributeReference, Properties, PropertyValue};
use indexmap::IndexSet;
use serde_json::{json, Map, Value};
use std::fmt;
use streamstack_core::{Digest, LogicalId};
use tracing::info;

/// Template format version written at the top of every document
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// An emitted template document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    value: Value,
    text: String,
}

impl Document {
    fn new(value: Value) -> Self {
        let text = format!("{:#}\n", value);
        Self { value, text }
    }

    /// Rendered JSON text
    #[must_use]
    pub fn render(&self) -> &str {
        &self.text
    }

    /// Structured view of the document
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.value
    }

    /// BLAKE3 digest of the rendered text
    #[must_use]
    pub fn digest(&self) -> Digest {
        Digest::compute(self.text.as_bytes())
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Emitter for validated graphs
#[derive(Debug, Clone, Default)]
pub struct Emitter {
    description: Option<String>,
}

impl Emitter {
    /// Create a new emitter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the template description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Emit a validated graph
    #[must_use]
    pub fn emit(&self, valid: &ValidGraph) -> Document {
        let graph = valid.graph();
        let mut root = Map::new();
        root.insert(
            "AWSTemplateFormatVersion".to_string(),
            Value::String(TEMPLATE_FORMAT_VERSION.to_string()),
        );
        if let Some(description) = &self.description {
            root.insert("Description".to_string(), Value::String(description.clone()));
        }

        let mut resources = Map::new();
        for id in valid.topological_order() {
            if let Some(resource) = graph.get(id) {
                resources.insert(id.to_string(), resource_block(graph, resource));
            }
        }
        root.insert("Resources".to_string(), Value::Object(resources));

        let mut outputs = Map::new();
        for output in graph.outputs() {
            let mut block = Map::new();
            if let Some(description) = output.description() {
                block.insert("Description".to_string(), Value::String(description.to_string()));
            }
            block.insert("Value".to_string(), reference_value(graph, output.value()));
            outputs.insert(output.name().to_string(), Value::Object(block));
        }
        if !outputs.is_empty() {
            root.insert("Outputs".to_string(), Value::Object(outputs));
        }

        let document = Document::new(Value::Object(root));
        info!(
            resources = graph.len(),
            bytes = document.render().len(),
            digest = %document.digest(),
            "emitted template"
        );
        document
    }
}

fn resource_block(graph: &StackGraph, resource: &ResourceDescriptor) -> Value {
    let mut block = Map::new();
    block.insert(
        "Type".to_string(),
        Value::String(resource.kind().engine_type().to_string()),
    );

    let hints = ordering_hints(graph, resource);
    if !hints.is_empty() {
        block.insert(
            "DependsOn".to_string(),
            Value::Array(hints.into_iter().map(|id| Value::String(id.to_string())).collect()),
        );
    }

    if let Some(policy) = resource.deletion_policy() {
        // also governs the old copy on replacement
        for key in ["DeletionPolicy", "UpdateReplacePolicy"] {
            block.insert(key.to_string(), Value::String(policy.as_str().to_string()));
        }
    }

    if !resource.properties().is_empty() {
        block.insert(
            "Properties".to_string(),
            properties_value(graph, resource.properties()),
        );
    }

    Value::Object(block)
}

/// Explicit dependencies not already implied by a substituted reference,
/// in declaration order
fn ordering_hints<'a>(graph: &'a StackGraph, resource: &ResourceDescriptor) -> Vec<&'a LogicalId> {
    let referenced = resource.referenced_sources();
    let explicit: IndexSet<&LogicalId> = graph
        .edges()
        .filter(|e| e.origin == EdgeOrigin::Explicit && &e.from == resource.logical_id())
        .map(|e| &e.to)
        .collect();

    graph
        .resources()
        .map(ResourceDescriptor::logical_id)
        .filter(|id| explicit.contains(id) && !referenced.contains(id))
        .collect()
}

fn properties_value(graph: &StackGraph, properties: &Properties) -> Value {
    Value::Object(
        properties
            .iter()
            .map(|(k, v)| (engine_key(k), property_value(graph, v)))
            .collect(),
    )
}

fn property_value(graph: &StackGraph, value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Null => Value::Null,
        PropertyValue::Bool(b) => Value::Bool(*b),
        PropertyValue::Number(n) => Value::Number(n.clone()),
        PropertyValue::String(s) => Value::String(s.clone()),
        PropertyValue::List(items) => {
            Value::Array(items.iter().map(|v| property_value(graph, v)).collect())
        }
        PropertyValue::Map(entries) => properties_value(graph, entries),
        PropertyValue::Ref(reference) => reference_value(graph, reference),
        PropertyValue::Join { separator, parts } => {
            let parts: Vec<Value> = parts.iter().map(|v| property_value(graph, v)).collect();
            json!({ "Fn::Join": [separator, parts] })
        }
    }
}

fn reference_value(graph: &StackGraph, reference: &AttributeReference) -> Value {
    let source = reference.source().as_str();
    let native = graph
        .get(reference.source())
        .and_then(|target| attribute(target.kind(), reference.attribute()))
        .map(|spec| spec.native);

    match native {
        Some(NativeRef::Ref) => json!({ "Ref": source }),
        Some(NativeRef::GetAtt(name)) => json!({ "Fn::GetAtt": [source, name] }),
        // unreachable for validated graphs
        None => json!({ "Fn::GetAtt": [source, reference.attribute()] }),
    }
}

/// Engine property names are PascalCase; keys with a namespace separator
/// (`aws:SourceArn`) are left alone
fn engine_key(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() && !key.contains(':') => {
            first.to_ascii_uppercase().to_string() + chars.as_str()
        }
        _ => key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputBinding;
    use crate::resource::DeletionPolicy;
    use crate::validate::Validator;
    use proptest::prelude::*;
    use streamstack_core::ResourceKind;

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    fn props<const N: usize>(entries: [(&str, PropertyValue); N]) -> Properties {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn scenario_graph() -> StackGraph {
        let mut graph = StackGraph::new();

        let b1 = graph.declare(ResourceKind::Bucket, "b1", Properties::new()).unwrap();
        let r1 = graph
            .declare(
                ResourceKind::Role,
                "r1",
                props([(
                    "assumeRolePolicyDocument",
                    PropertyValue::map([("Version", "2012-10-17")]),
                )]),
            )
            .unwrap();
        let bucket_name = graph.reference(&b1, "bucketName").unwrap();
        let i1 = graph
            .declare(
                ResourceKind::Input,
                "i1",
                props([
                    ("type", PropertyValue::from("MP4_FILE")),
                    (
                        "sources",
                        PropertyValue::list([PropertyValue::map([(
                            "url",
                            PropertyValue::join("", [
                                PropertyValue::from("s3ssl://"),
                                PropertyValue::from(bucket_name),
                                PropertyValue::from("/input.mp4"),
                            ]),
                        )])]),
                    ),
                ]),
            )
            .unwrap();
        let pc1 = graph
            .declare(
                ResourceKind::PackagingChannel,
                "pc1",
                props([("id", PropertyValue::from("pc1"))]),
            )
            .unwrap();
        let pe1 = graph
            .declare(
                ResourceKind::PackagingEndpoint,
                "pe1",
                props([
                    ("id", PropertyValue::from("pe1")),
                    ("channelId", PropertyValue::from("pc1")),
                    ("manifestName", PropertyValue::from("index")),
                ]),
            )
            .unwrap();
        graph.add_edge(pe1.logical_id(), pc1.logical_id()).unwrap();
        let role_arn = graph.reference(&r1, "arn").unwrap();
        graph
            .declare(
                ResourceKind::Channel,
                "c1",
                props([
                    ("name", PropertyValue::from("live")),
                    ("roleArn", PropertyValue::from(role_arn)),
                    (
                        "inputAttachments",
                        PropertyValue::list([PropertyValue::map([(
                            "inputId",
                            i1.reference("id").unwrap(),
                        )])]),
                    ),
                    (
                        "destinations",
                        PropertyValue::list([PropertyValue::map([
                            ("id", PropertyValue::from("packaging")),
                            (
                                "mediaPackageSettings",
                                PropertyValue::list([PropertyValue::map([(
                                    "channelId",
                                    pc1.reference("channelId").unwrap(),
                                )])]),
                            ),
                        ])]),
                    ),
                    (
                        "encoderSettings",
                        PropertyValue::map([(
                            "timecodeConfig",
                            PropertyValue::map([("source", "EMBEDDED")]),
                        )]),
                    ),
                ]),
            )
            .unwrap();
        graph
            .add_output(
                OutputBinding::new(id("PlaybackUrl"), pe1.reference("url").unwrap())
                    .with_description("HLS playback URL"),
            )
            .unwrap();

        graph
    }

    fn emit(graph: StackGraph) -> Document {
        let valid = Validator::new().validate(graph).unwrap();
        Emitter::new().with_description("test stack").emit(&valid)
    }

    fn resource_keys(doc: &Document) -> Vec<String> {
        doc.as_value()["Resources"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect()
    }

    #[test]
    fn test_end_to_end_order() {
        let valid = Validator::new().validate(scenario_graph()).unwrap();
        let order: Vec<&str> = valid.topological_order().iter().map(LogicalId::as_str).collect();
        assert_eq!(order, vec!["b1", "r1", "i1", "pc1", "pe1", "c1"]);
    }

    #[test]
    fn test_end_to_end_block_placement() {
        let doc = emit(scenario_graph());
        let keys = resource_keys(&doc);
        let position = |k: &str| keys.iter().position(|x| x == k).unwrap();

        assert!(position("b1") < position("i1"));
        assert!(position("r1") < position("i1"));
        assert!(position("pc1") < position("pe1"));
        assert!(position("pc1") < position("c1"));
        assert!(position("i1") < position("c1"));

        // rendered text places the blocks in the same order
        let text = doc.render();
        assert!(text.find("\"pc1\": {").unwrap() < text.find("\"pe1\": {").unwrap());
        assert!(text.find("\"pc1\": {").unwrap() < text.find("\"c1\": {").unwrap());
    }

    #[test]
    fn test_emit_is_byte_identical() {
        let first = emit(scenario_graph());
        let second = emit(scenario_graph());
        assert_eq!(first.render(), second.render());
        assert_eq!(first.digest(), second.digest());
    }

    #[test]
    fn test_explicit_edge_becomes_depends_on() {
        let doc = emit(scenario_graph());
        let resources = &doc.as_value()["Resources"];

        assert_eq!(resources["pe1"]["DependsOn"], json!(["pc1"]));
        // reference-implied edges need no hint
        assert!(resources["c1"].get("DependsOn").is_none());
        assert!(resources["i1"].get("DependsOn").is_none());
    }

    #[test]
    fn test_explicit_edge_implied_by_reference_not_hinted() {
        let mut graph = StackGraph::new();
        let b1 = graph.declare(ResourceKind::Bucket, "b1", Properties::new()).unwrap();
        graph
            .declare_with_dependencies(
                ResourceKind::Role,
                "r1",
                props([(
                    "assumeRolePolicyDocument",
                    PropertyValue::from(b1.reference("arn").unwrap()),
                )]),
                [b1.logical_id()],
            )
            .unwrap();

        let doc = emit(graph);
        assert!(doc.as_value()["Resources"]["r1"].get("DependsOn").is_none());
    }

    #[test]
    fn test_deletion_policy_block() {
        let mut graph = StackGraph::new();
        graph
            .add_resource(
                ResourceDescriptor::builder(ResourceKind::Bucket, id("b1"))
                    .deletion_policy(DeletionPolicy::Delete)
                    .property("bucketName", "media")
                    .build(),
            )
            .unwrap();
        graph
            .add_resource(
                ResourceDescriptor::builder(ResourceKind::Bucket, id("b2"))
                    .deletion_policy(DeletionPolicy::Retain)
                    .depends_on(&id("b1"))
                    .build(),
            )
            .unwrap();
        graph.declare(ResourceKind::Bucket, "b3", Properties::new()).unwrap();

        let doc = emit(graph);
        let resources = &doc.as_value()["Resources"];

        let b1_keys: Vec<&str> = resources["b1"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(
            b1_keys,
            vec!["Type", "DeletionPolicy", "UpdateReplacePolicy", "Properties"]
        );
        assert_eq!(resources["b1"]["DeletionPolicy"], json!("Delete"));

        let b2_keys: Vec<&str> = resources["b2"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(
            b2_keys,
            vec!["Type", "DependsOn", "DeletionPolicy", "UpdateReplacePolicy"]
        );
        assert_eq!(resources["b2"]["UpdateReplacePolicy"], json!("Retain"));

        assert!(resources["b3"].get("DeletionPolicy").is_none());
        assert!(resources["b3"].get("UpdateReplacePolicy").is_none());
    }

    #[test]
    fn test_native_reference_syntax() {
        let doc = emit(scenario_graph());
        let resources = &doc.as_value()["Resources"];
        let channel = &resources["c1"]["Properties"];

        assert_eq!(channel["RoleArn"], json!({ "Fn::GetAtt": ["r1", "Arn"] }));
        assert_eq!(channel["InputAttachments"][0]["InputId"], json!({ "Ref": "i1" }));
        assert_eq!(
            channel["Destinations"][0]["MediaPackageSettings"][0]["ChannelId"],
            json!({ "Ref": "pc1" })
        );
        assert_eq!(
            resources["i1"]["Properties"]["Sources"][0]["Url"],
            json!({ "Fn::Join": ["", ["s3ssl://", { "Ref": "b1" }, "/input.mp4"]] })
        );
    }

    #[test]
    fn test_resource_types_and_outputs() {
        let doc = emit(scenario_graph());
        let value = doc.as_value();

        assert_eq!(value["AWSTemplateFormatVersion"], json!(TEMPLATE_FORMAT_VERSION));
        assert_eq!(value["Description"], json!("test stack"));
        assert_eq!(value["Resources"]["b1"]["Type"], json!("AWS::S3::Bucket"));
        assert!(value["Resources"]["b1"].get("Properties").is_none());
        assert_eq!(
            value["Resources"]["pe1"]["Type"],
            json!("AWS::MediaPackage::OriginEndpoint")
        );
        assert_eq!(
            value["Outputs"]["PlaybackUrl"],
            json!({ "Description": "HLS playback URL", "Value": { "Fn::GetAtt": ["pe1", "Url"] } })
        );
    }

    #[test]
    fn test_document_parses_back() {
        let doc = emit(scenario_graph());
        let parsed: Value = serde_json::from_str(doc.render()).unwrap();
        assert_eq!(&parsed, doc.as_value());
        assert!(doc.digest().verify(doc.render().as_bytes()));
    }

    #[test]
    fn test_engine_key() {
        assert_eq!(engine_key("manifestName"), "ManifestName");
        assert_eq!(engine_key("h264Settings"), "H264Settings");
        assert_eq!(engine_key("Version"), "Version");
        assert_eq!(engine_key("aws:SourceArn"), "aws:SourceArn");
        assert_eq!(engine_key(""), "");
    }

    fn chain_graph(n: usize, refs: &[(usize, usize)]) -> StackGraph {
        let mut graph = StackGraph::new();
        let mut handles: Vec<crate::ResourceHandle> = Vec::new();
        for i in 0..n {
            let mut properties = Properties::new();
            for &(a, b) in refs {
                let (a, b) = (a % n, b % n);
                if a == i && b < i {
                    let arn = handles[b].reference("arn").unwrap();
                    properties.insert(format!("ref{}", b), PropertyValue::from(arn));
                }
            }
            handles.push(
                graph
                    .declare(ResourceKind::Bucket, &format!("B{}", i), properties)
                    .unwrap(),
            );
        }
        graph
    }

    proptest::proptest! {
        #[test]
        fn prop_emit_deterministic(
            n in 1usize..10,
            refs in proptest::collection::vec((0usize..10, 0usize..10), 0..20)
        ) {
            let first = emit(chain_graph(n, &refs));
            let second = emit(chain_graph(n, &refs));
            prop_assert_eq!(first.render(), second.render());
        }
    }
}

//! Resource descriptors and the per-kind schema contract.
//!
//! The schema table mirrors the provisioning engine's contract for each
//! resource kind: which attributes a resource exposes to dependents, how
//! each attribute is referenced in the template, and which properties
//! must be present.

use crate::error::{GraphError, GraphResult};
use crate::value::{AttributeReference, Properties, PropertyValue};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use streamstack_core::{LogicalId, ResourceKind};

/// Template syntax used to reference an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeRef {
    /// The resource's primary reference value (`{"Ref": id}`)
    Ref,
    /// A named attribute (`{"Fn::GetAtt": [id, name]}`)
    GetAtt(&'static str),
}

/// An attribute exposed by a resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    /// Attribute name used in declarations
    pub name: &'static str,
    /// How the engine expresses a reference to it
    pub native: NativeRef,
}

const fn attr(name: &'static str, native: NativeRef) -> AttributeSpec {
    AttributeSpec { name, native }
}

const BUCKET_ATTRIBUTES: &[AttributeSpec] = &[
    attr("bucketName", NativeRef::Ref),
    attr("arn", NativeRef::GetAtt("Arn")),
    attr("domainName", NativeRef::GetAtt("DomainName")),
];

const ROLE_ATTRIBUTES: &[AttributeSpec] = &[
    attr("roleName", NativeRef::Ref),
    attr("arn", NativeRef::GetAtt("Arn")),
];

const INPUT_ATTRIBUTES: &[AttributeSpec] = &[
    attr("id", NativeRef::Ref),
    attr("arn", NativeRef::GetAtt("Arn")),
    attr("destinations", NativeRef::GetAtt("Destinations")),
];

const CHANNEL_ATTRIBUTES: &[AttributeSpec] = &[
    attr("id", NativeRef::Ref),
    attr("arn", NativeRef::GetAtt("Arn")),
];

const PACKAGING_CHANNEL_ATTRIBUTES: &[AttributeSpec] = &[
    attr("channelId", NativeRef::Ref),
    attr("arn", NativeRef::GetAtt("Arn")),
    attr("ingestEndpoints", NativeRef::GetAtt("HlsIngest.ingestEndpoints")),
];

const PACKAGING_ENDPOINT_ATTRIBUTES: &[AttributeSpec] = &[
    attr("id", NativeRef::Ref),
    attr("arn", NativeRef::GetAtt("Arn")),
    attr("url", NativeRef::GetAtt("Url")),
];

/// Attributes a kind exposes to dependents
#[must_use]
pub fn attributes(kind: ResourceKind) -> &'static [AttributeSpec] {
    match kind {
        ResourceKind::Bucket => BUCKET_ATTRIBUTES,
        ResourceKind::Role => ROLE_ATTRIBUTES,
        ResourceKind::Input => INPUT_ATTRIBUTES,
        ResourceKind::Channel => CHANNEL_ATTRIBUTES,
        ResourceKind::PackagingChannel => PACKAGING_CHANNEL_ATTRIBUTES,
        ResourceKind::PackagingEndpoint => PACKAGING_ENDPOINT_ATTRIBUTES,
    }
}

/// Look up one attribute of a kind
#[must_use]
pub fn attribute(kind: ResourceKind, name: &str) -> Option<&'static AttributeSpec> {
    attributes(kind).iter().find(|a| a.name == name)
}

/// Properties that must be present for a kind
#[must_use]
pub fn required_properties(kind: ResourceKind) -> &'static [&'static str] {
    match kind {
        ResourceKind::Bucket => &[],
        ResourceKind::Role => &["assumeRolePolicyDocument"],
        ResourceKind::Input => &["type"],
        ResourceKind::Channel => &[
            "name",
            "roleArn",
            "inputAttachments",
            "destinations",
            "encoderSettings",
        ],
        ResourceKind::PackagingChannel => &["id"],
        ResourceKind::PackagingEndpoint => &["id", "channelId", "manifestName"],
    }
}

/// What the engine does with a resource's physical counterpart when the
/// resource leaves the stack or is replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPolicy {
    /// Destroy it
    Delete,
    /// Keep it, orphaned from the stack
    Retain,
}

impl DeletionPolicy {
    /// Engine value of the policy
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Delete => "Delete",
            Self::Retain => "Retain",
        }
    }
}

/// Immutable declaration of one resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    kind: ResourceKind,
    logical_id: LogicalId,
    properties: Properties,
    depends_on: IndexSet<LogicalId>,
    deletion_policy: Option<DeletionPolicy>,
}

impl ResourceDescriptor {
    /// Create a descriptor with no explicit dependencies
    #[must_use]
    pub fn new(kind: ResourceKind, logical_id: LogicalId, properties: Properties) -> Self {
        Self {
            kind,
            logical_id,
            properties,
            depends_on: IndexSet::new(),
            deletion_policy: None,
        }
    }

    /// Start building a descriptor
    #[must_use]
    pub fn builder(kind: ResourceKind, logical_id: LogicalId) -> DescriptorBuilder {
        DescriptorBuilder {
            inner: Self::new(kind, logical_id, Properties::new()),
        }
    }

    /// Resource kind
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Logical id
    #[must_use]
    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    /// Property bag
    #[must_use]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Explicit dependencies given at declaration time
    #[must_use]
    pub fn depends_on(&self) -> &IndexSet<LogicalId> {
        &self.depends_on
    }

    /// Deletion policy; the engine default applies when unset
    #[must_use]
    pub fn deletion_policy(&self) -> Option<DeletionPolicy> {
        self.deletion_policy
    }

    /// Resources referenced from the property bag, first occurrence order
    #[must_use]
    pub fn referenced_sources(&self) -> IndexSet<&LogicalId> {
        self.property_references().map(AttributeReference::source).collect()
    }

    /// Every attribute reference in the property bag
    pub fn property_references(&self) -> impl Iterator<Item = &AttributeReference> {
        self.properties.values().flat_map(PropertyValue::references)
    }

    /// Whether a required property is present and non-null
    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.get(name).is_some_and(|v| !v.is_null())
    }

    /// Handle for referencing this resource
    #[must_use]
    pub fn handle(&self) -> ResourceHandle {
        ResourceHandle {
            kind: self.kind,
            logical_id: self.logical_id.clone(),
        }
    }
}

/// Builder for [`ResourceDescriptor`]
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    inner: ResourceDescriptor,
}

impl DescriptorBuilder {
    /// Set a property
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.inner.properties.insert(name.into(), value.into());
        self
    }

    /// Set a property when a value is present
    #[must_use]
    pub fn optional_property<V: Into<PropertyValue>>(
        self,
        name: impl Into<String>,
        value: Option<V>,
    ) -> Self {
        match value {
            Some(v) => self.property(name, v),
            None => self,
        }
    }

    /// Add an explicit dependency
    #[must_use]
    pub fn depends_on(mut self, id: &LogicalId) -> Self {
        self.inner.depends_on.insert(id.clone());
        self
    }

    /// Set the deletion policy
    #[must_use]
    pub fn deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.inner.deletion_policy = Some(policy);
        self
    }

    /// Finish the descriptor
    #[must_use]
    pub fn build(self) -> ResourceDescriptor {
        self.inner
    }
}

/// Lightweight handle to a declared resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    kind: ResourceKind,
    logical_id: LogicalId,
}

impl ResourceHandle {
    /// Resource kind
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Logical id
    #[must_use]
    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    /// Reference one of this resource's attributes
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownAttribute`] if the kind does not expose
    /// `name`
    pub fn reference(&self, name: &str) -> GraphResult<AttributeReference> {
        if attribute(self.kind, name).is_none() {
            return Err(GraphError::UnknownAttribute {
                id: self.logical_id.clone(),
                kind: self.kind,
                attribute: name.to_string(),
            });
        }
        Ok(AttributeReference::new(self.logical_id.clone(), name))
    }
}

//! Property values and attribute references.
//!
//! A property bag is an ordered map of names to [`PropertyValue`]s. Values
//! are plain data except for [`PropertyValue::Ref`] and
//! [`PropertyValue::Join`], which point at attributes of other resources
//! whose concrete values only exist once the engine has realized them.

use crate::error::{GraphError, GraphResult};
use std::collections::BTreeMap;
use std::fmt;
use streamstack_core::{CoreError, LogicalId};

/// Property bag of a resource, ordered by key
pub type Properties = BTreeMap<String, PropertyValue>;

/// Symbolic pointer to an attribute of another declared resource
///
/// Created through [`crate::ResourceHandle::reference`], which checks the
/// attribute against the source kind's attribute set. References read from
/// declaration files are checked later by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeReference {
    source: LogicalId,
    attribute: String,
}

impl AttributeReference {
    pub(crate) fn new(source: LogicalId, attribute: impl Into<String>) -> Self {
        Self {
            source,
            attribute: attribute.into(),
        }
    }

    /// Parse the `<logicalId>.<attribute>` form used in declaration files
    ///
    /// # Errors
    ///
    /// Returns error if the separator is missing or the id is invalid
    pub(crate) fn parse(path: &str) -> GraphResult<Self> {
        let (source, attribute) = path.split_once('.').ok_or_else(|| CoreError::Encoding {
            message: format!("reference '{}' is not of the form <id>.<attribute>", path),
        })?;
        if attribute.is_empty() {
            return Err(CoreError::Encoding {
                message: format!("reference '{}' has an empty attribute", path),
            }
            .into());
        }
        Ok(Self::new(LogicalId::new(source)?, attribute))
    }

    /// Resource the attribute belongs to
    #[must_use]
    pub fn source(&self) -> &LogicalId {
        &self.source
    }

    /// Attribute name
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

impl fmt::Display for AttributeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.source, self.attribute)
    }
}

/// A single property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Explicit null
    Null,
    /// Boolean
    Bool(bool),
    /// Integer or floating point number
    Number(serde_json::Number),
    /// String literal
    String(String),
    /// Ordered list
    List(Vec<PropertyValue>),
    /// Nested map
    Map(Properties),
    /// Attribute of another resource
    Ref(AttributeReference),
    /// Concatenation of parts, resolved at apply time
    Join {
        /// Separator placed between parts
        separator: String,
        /// Literal and referenced parts
        parts: Vec<PropertyValue>,
    },
}

impl PropertyValue {
    /// Build a map value from key/value pairs
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<PropertyValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Build a list value
    pub fn list<V, I>(items: I) -> Self
    where
        V: Into<PropertyValue>,
        I: IntoIterator<Item = V>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Build a join of parts with a separator
    pub fn join<V, I>(separator: impl Into<String>, parts: I) -> Self
    where
        V: Into<PropertyValue>,
        I: IntoIterator<Item = V>,
    {
        Self::Join {
            separator: separator.into(),
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the value is null
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Every attribute reference inside this value, depth first
    #[must_use]
    pub fn references(&self) -> Vec<&AttributeReference> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a AttributeReference>) {
        match self {
            Self::Ref(r) => out.push(r),
            Self::List(items) | Self::Join { parts: items, .. } => {
                for item in items {
                    item.collect_references(out);
                }
            }
            Self::Map(entries) => {
                for value in entries.values() {
                    value.collect_references(out);
                }
            }
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_) => {}
        }
    }

    /// Convert from a JSON value, recognising reference markers
    ///
    /// `{"$ref": "<id>.<attribute>"}` becomes [`PropertyValue::Ref`] and
    /// `{"$join": {"separator": ..., "parts": [...]}}` becomes
    /// [`PropertyValue::Join`]. Every other object is a plain map.
    ///
    /// # Errors
    ///
    /// Returns error if a marker object is malformed
    pub fn from_json(value: serde_json::Value) -> GraphResult<Self> {
        use serde_json::Value;

        Ok(match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(
                items
                    .into_iter()
                    .map(Self::from_json)
                    .collect::<GraphResult<Vec<_>>>()?,
            ),
            Value::Object(mut obj) => {
                if obj.len() == 1 {
                    if let Some(target) = obj.remove("$ref") {
                        return match target {
                            Value::String(path) => Ok(Self::Ref(AttributeReference::parse(&path)?)),
                            other => Err(malformed("$ref", &other)),
                        };
                    }
                    if let Some(join) = obj.remove("$join") {
                        return parse_join(join);
                    }
                }
                Self::Map(
                    obj.into_iter()
                        .map(|(k, v)| Ok((k, Self::from_json(v)?)))
                        .collect::<GraphResult<Properties>>()?,
                )
            }
        })
    }
}

fn parse_join(join: serde_json::Value) -> GraphResult<PropertyValue> {
    use serde_json::Value;

    let Value::Object(mut fields) = join else {
        return Err(malformed("$join", &join));
    };
    let separator = match fields.remove("separator") {
        None => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => return Err(malformed("$join.separator", &other)),
    };
    let parts = match fields.remove("parts") {
        Some(Value::Array(parts)) => parts
            .into_iter()
            .map(PropertyValue::from_json)
            .collect::<GraphResult<Vec<_>>>()?,
        Some(other) => return Err(malformed("$join.parts", &other)),
        None => return Err(malformed("$join.parts", &Value::Null)),
    };
    Ok(PropertyValue::Join { separator, parts })
}

fn malformed(marker: &str, value: &serde_json::Value) -> GraphError {
    CoreError::Encoding {
        message: format!("malformed {} marker: {}", marker, value),
    }
    .into()
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u32> for PropertyValue {
    fn from(n: u32) -> Self {
        Self::Number(n.into())
    }
}

impl From<AttributeReference> for PropertyValue {
    fn from(r: AttributeReference) -> Self {
        Self::Ref(r)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(items: Vec<PropertyValue>) -> Self {
        Self::List(items)
    }
}

impl From<Properties> for PropertyValue {
    fn from(entries: Properties) -> Self {
        Self::Map(entries)
    }
}

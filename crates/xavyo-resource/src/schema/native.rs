//! Native attribute definitions, as discovered from the connector.

use serde::{Deserialize, Serialize};

use crate::matching::MatchingRule;

/// Data type of a native attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeDataType {
    String,
    Integer,
    Boolean,
    Binary,
    DateTime,
    Uuid,
    /// Distinguished Name (LDAP).
    Dn,
    /// Reference to another resource object; backs associations.
    Reference,
}

impl AttributeDataType {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeDataType::String => "string",
            AttributeDataType::Integer => "integer",
            AttributeDataType::Boolean => "boolean",
            AttributeDataType::Binary => "binary",
            AttributeDataType::DateTime => "datetime",
            AttributeDataType::Uuid => "uuid",
            AttributeDataType::Dn => "dn",
            AttributeDataType::Reference => "reference",
        }
    }

    /// Parse from string.
    #[must_use]
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "string" | "text" => Some(AttributeDataType::String),
            "integer" | "int" | "long" => Some(AttributeDataType::Integer),
            "boolean" | "bool" => Some(AttributeDataType::Boolean),
            "binary" | "bytes" => Some(AttributeDataType::Binary),
            "datetime" | "timestamp" => Some(AttributeDataType::DateTime),
            "uuid" | "guid" => Some(AttributeDataType::Uuid),
            "dn" | "distinguishedname" => Some(AttributeDataType::Dn),
            "reference" => Some(AttributeDataType::Reference),
            _ => None,
        }
    }

    /// Matching rule implied by the type when none is declared.
    pub fn implied_matching_rule(&self) -> MatchingRule {
        match self {
            AttributeDataType::Dn => MatchingRule::DistinguishedName,
            AttributeDataType::Uuid => MatchingRule::Uuid,
            _ => MatchingRule::Default,
        }
    }
}

impl std::fmt::Display for AttributeDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Attribute metadata reported by the connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeAttributeDefinition {
    /// Name used by the provisioning layer.
    pub name: String,

    /// Name in the target system (e.g., "givenName" for LDAP).
    pub native_name: String,

    pub data_type: AttributeDataType,

    #[serde(default)]
    pub min_occurs: u32,

    /// `None` means unbounded.
    #[serde(default = "default_max_occurs")]
    pub max_occurs: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_rule: Option<MatchingRule>,

    #[serde(default = "default_true")]
    pub returned_by_default: bool,

    #[serde(default = "default_true")]
    pub readable: bool,

    #[serde(default = "default_true")]
    pub creatable: bool,

    #[serde(default = "default_true")]
    pub updatable: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_occurs() -> Option<u32> {
    Some(1)
}

impl NativeAttributeDefinition {
    /// Create a single-valued, optional, fully accessible attribute.
    pub fn new(name: impl Into<String>, data_type: AttributeDataType) -> Self {
        let name = name.into();
        Self {
            native_name: name.clone(),
            name,
            data_type,
            min_occurs: 0,
            max_occurs: Some(1),
            matching_rule: None,
            returned_by_default: true,
            readable: true,
            creatable: true,
            updatable: true,
        }
    }

    /// Set the native name.
    #[must_use]
    pub fn with_native_name(mut self, native_name: impl Into<String>) -> Self {
        self.native_name = native_name.into();
        self
    }

    /// Mark this attribute as multi-valued.
    #[must_use]
    pub fn multi_valued(mut self) -> Self {
        self.max_occurs = None;
        self
    }

    /// Mark this attribute as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.min_occurs = self.min_occurs.max(1);
        self
    }

    /// Mark this attribute as read-only.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.creatable = false;
        self.updatable = false;
        self
    }

    /// Mark this attribute as not returned unless explicitly requested.
    #[must_use]
    pub fn not_returned_by_default(mut self) -> Self {
        self.returned_by_default = false;
        self
    }

    /// Set the matching rule.
    #[must_use]
    pub fn with_matching_rule(mut self, rule: MatchingRule) -> Self {
        self.matching_rule = Some(rule);
        self
    }

    /// Check if more than one value is allowed.
    pub fn is_multi_valued(&self) -> bool {
        self.max_occurs.map_or(true, |max| max > 1)
    }
}

//! Identifiers of resource objects.

use xavyo_resource::error::{ResourceError, ResourceResult};
use xavyo_resource::item::Attribute;
use xavyo_resource::schema::ResourceObjectDefinition;
use xavyo_resource::value::AttributeValue;

/// Identifier attributes known for a resource object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceObjectIdentifiers {
    /// The primary identifier is known; the object can be fetched directly.
    WithPrimary {
        primary: Attribute,
        secondary: Vec<Attribute>,
    },
    /// Only secondary identifiers are known; the object must be searched for.
    SecondaryOnly { secondary: Vec<Attribute> },
}

impl ResourceObjectIdentifiers {
    /// Collect identifiers from attributes according to the definition.
    ///
    /// Returns `None` when no identifier has a value. Composite primary
    /// identifiers are not supported: more than one valued primary identifier
    /// attribute is a schema error.
    pub fn from_attributes<'a>(
        definition: &ResourceObjectDefinition,
        attributes: impl IntoIterator<Item = &'a Attribute>,
    ) -> ResourceResult<Option<Self>> {
        let mut primary: Option<Attribute> = None;
        let mut secondary = Vec::new();
        for attr in attributes {
            if attr.is_empty() {
                continue;
            }
            if definition.is_primary_identifier(attr.name()) {
                if let Some(existing) = &primary {
                    return Err(ResourceError::schema(format!(
                        "composite primary identifier ({}, {}) in {} is not supported",
                        existing.name(),
                        attr.name(),
                        definition
                    )));
                }
                primary = Some(attr.clone());
            } else if definition.is_secondary_identifier(attr.name()) {
                secondary.push(attr.clone());
            }
        }
        Ok(match (primary, secondary.is_empty()) {
            (Some(primary), _) => Some(Self::WithPrimary { primary, secondary }),
            (None, false) => Some(Self::SecondaryOnly { secondary }),
            (None, true) => None,
        })
    }

    /// Identifiers holding only a primary identifier value.
    pub fn primary(name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::WithPrimary {
            primary: Attribute::new(name, vec![value.into()]),
            secondary: Vec::new(),
        }
    }

    pub fn primary_identifier(&self) -> Option<&Attribute> {
        match self {
            Self::WithPrimary { primary, .. } => Some(primary),
            Self::SecondaryOnly { .. } => None,
        }
    }

    /// The single primary identifier value, if known.
    pub fn primary_value(&self) -> Option<&AttributeValue> {
        self.primary_identifier()?.single_value()
    }

    pub fn secondary_identifiers(&self) -> &[Attribute] {
        match self {
            Self::WithPrimary { secondary, .. } | Self::SecondaryOnly { secondary } => secondary,
        }
    }

    pub fn has_primary(&self) -> bool {
        matches!(self, Self::WithPrimary { .. })
    }

    /// Every identifier attribute, primary first.
    pub fn all(&self) -> impl Iterator<Item = &Attribute> {
        self.primary_identifier()
            .into_iter()
            .chain(self.secondary_identifiers())
    }
}

impl std::fmt::Display for ResourceObjectIdentifiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for attr in self.all() {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            let values: Vec<String> = attr.values().iter().map(ToString::to_string).collect();
            write!(f, "{}={}", attr.name(), values.join("|"))?;
        }
        Ok(())
    }
}

//! Association definitions and participant types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::customization::AttributeCustomization;
use super::patterns::ValuePatterns;
use crate::error::ResourceResult;

/// Kind of a resource object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowKind {
    Account,
    Entitlement,
    Generic,
    #[default]
    Unknown,
}

impl ShadowKind {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShadowKind::Account => "account",
            ShadowKind::Entitlement => "entitlement",
            ShadowKind::Generic => "generic",
            ShadowKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ShadowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ShadowKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "account" => Ok(ShadowKind::Account),
            "entitlement" => Ok(ShadowKind::Entitlement),
            "generic" => Ok(ShadowKind::Generic),
            "unknown" => Ok(ShadowKind::Unknown),
            _ => Err(format!("Unknown shadow kind: {s}")),
        }
    }
}

/// Kind and intent pair identifying an object type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectTypeIdentification {
    pub kind: ShadowKind,
    pub intent: String,
}

impl ObjectTypeIdentification {
    pub fn new(kind: ShadowKind, intent: impl Into<String>) -> Self {
        Self {
            kind,
            intent: intent.into(),
        }
    }
}

impl fmt::Display for ObjectTypeIdentification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.intent)
    }
}

/// Which objects may appear on one side of an association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationParticipantType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_identification: Option<ObjectTypeIdentification>,

    pub object_class: String,
}

impl AssociationParticipantType {
    /// Participant given by object class only.
    pub fn for_class(object_class: impl Into<String>) -> Self {
        Self {
            type_identification: None,
            object_class: object_class.into(),
        }
    }

    /// Participant given by object type.
    pub fn for_type(type_identification: ObjectTypeIdentification, object_class: impl Into<String>) -> Self {
        Self {
            type_identification: Some(type_identification),
            object_class: object_class.into(),
        }
    }

    /// Check whether an object of the given type and class can participate.
    ///
    /// An exact type match wins. When both sides name a type and the types
    /// differ, the object does not match. Otherwise the object class decides.
    pub fn matches(
        &self,
        candidate_type: Option<&ObjectTypeIdentification>,
        candidate_class: &str,
    ) -> bool {
        match (&self.type_identification, candidate_type) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => self.object_class == candidate_class,
        }
    }
}

/// Where the association membership is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssociationDirection {
    /// The subject holds references to the objects (e.g. `memberOf`).
    SubjectToObject,
    /// The objects hold references to the subject (e.g. group `member`).
    ObjectToSubject,
}

/// Definition of an association between a subject and objects.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationDefinition {
    name: String,
    direction: AssociationDirection,
    /// Reference-carrying attribute on the side that stores membership.
    association_attribute: String,
    /// Attribute of the referenced side whose value is stored in
    /// `association_attribute`.
    value_attribute: String,
    subjects: Vec<AssociationParticipantType>,
    objects: Vec<AssociationParticipantType>,
    customization: AttributeCustomization,
    patterns: ValuePatterns,
}

impl AssociationDefinition {
    pub fn new(
        name: impl Into<String>,
        direction: AssociationDirection,
        association_attribute: impl Into<String>,
        value_attribute: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            direction,
            association_attribute: association_attribute.into(),
            value_attribute: value_attribute.into(),
            subjects: Vec::new(),
            objects: Vec::new(),
            customization: AttributeCustomization::default(),
            patterns: ValuePatterns::default(),
        }
    }

    #[must_use]
    pub fn with_subject(mut self, participant: AssociationParticipantType) -> Self {
        self.subjects.push(participant);
        self
    }

    #[must_use]
    pub fn with_object(mut self, participant: AssociationParticipantType) -> Self {
        self.objects.push(participant);
        self
    }

    /// Apply a customization overlay (tolerance, patterns, ignore flag).
    pub fn with_customization(mut self, customization: AttributeCustomization) -> ResourceResult<Self> {
        self.patterns = ValuePatterns::compile(
            &customization.tolerant_value_patterns,
            &customization.intolerant_value_patterns,
        )?;
        self.customization = customization;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> AssociationDirection {
        self.direction
    }

    pub fn association_attribute(&self) -> &str {
        &self.association_attribute
    }

    pub fn value_attribute(&self) -> &str {
        &self.value_attribute
    }

    pub fn subjects(&self) -> &[AssociationParticipantType] {
        &self.subjects
    }

    pub fn objects(&self) -> &[AssociationParticipantType] {
        &self.objects
    }

    pub fn is_ignored(&self) -> bool {
        self.customization.ignored
    }

    /// Tolerant unless configured otherwise.
    pub fn is_tolerant(&self) -> bool {
        self.customization.tolerant.unwrap_or(true)
    }

    /// Patterns evaluated against the naming attribute of the target object.
    pub fn patterns(&self) -> &ValuePatterns {
        &self.patterns
    }

    /// Whether an object of the given type/class can be a target.
    pub fn accepts_object(
        &self,
        candidate_type: Option<&ObjectTypeIdentification>,
        candidate_class: &str,
    ) -> bool {
        self.objects.is_empty()
            || self
                .objects
                .iter()
                .any(|p| p.matches(candidate_type, candidate_class))
    }

    /// Object class of the first declared target participant.
    pub fn target_object_class(&self) -> Option<&str> {
        self.objects.first().map(|p| p.object_class.as_str())
    }
}

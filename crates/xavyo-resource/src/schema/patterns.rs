//! Tolerant and intolerant value patterns.

use regex::Regex;

use crate::error::{ResourceError, ResourceResult};
use crate::value::AttributeValue;

/// Compiled tolerant/intolerant pattern lists.
///
/// Patterns must match the whole value.
#[derive(Debug, Clone, Default)]
pub struct ValuePatterns {
    tolerant: Vec<Regex>,
    intolerant: Vec<Regex>,
}

impl ValuePatterns {
    /// Compile pattern lists; an invalid expression is a configuration error.
    pub fn compile(tolerant: &[String], intolerant: &[String]) -> ResourceResult<Self> {
        Ok(Self {
            tolerant: compile_all(tolerant)?,
            intolerant: compile_all(intolerant)?,
        })
    }

    /// Check whether no pattern is configured.
    pub fn is_empty(&self) -> bool {
        self.tolerant.is_empty() && self.intolerant.is_empty()
    }

    pub fn has_tolerant(&self) -> bool {
        !self.tolerant.is_empty()
    }

    pub fn has_intolerant(&self) -> bool {
        !self.intolerant.is_empty()
    }

    /// Check whether a value matches any tolerant pattern.
    pub fn matches_tolerant(&self, value: &AttributeValue) -> bool {
        matches_any(&self.tolerant, value)
    }

    /// Check whether a value matches any intolerant pattern.
    pub fn matches_intolerant(&self, value: &AttributeValue) -> bool {
        matches_any(&self.intolerant, value)
    }

    fn sources(list: &[Regex]) -> impl Iterator<Item = &str> {
        list.iter().map(Regex::as_str)
    }
}

impl PartialEq for ValuePatterns {
    fn eq(&self, other: &Self) -> bool {
        Self::sources(&self.tolerant).eq(Self::sources(&other.tolerant))
            && Self::sources(&self.intolerant).eq(Self::sources(&other.intolerant))
    }
}

fn compile_all(patterns: &[String]) -> ResourceResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(&format!("^(?:{p})$")).map_err(|e| {
                ResourceError::configuration(format!("invalid value pattern '{p}': {e}"))
            })
        })
        .collect()
}

fn matches_any(patterns: &[Regex], value: &AttributeValue) -> bool {
    match value.to_text() {
        Some(text) => patterns.iter().any(|p| p.is_match(&text)),
        None => false,
    }
}

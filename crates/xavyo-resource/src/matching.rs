//! Matching rules
//!
//! A matching rule decides when two attribute values denote the same thing on
//! the resource. Reconciliation compares should-be and real values through the
//! rule of the attribute, never through raw equality.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::value::AttributeValue;

/// Value comparison rule of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchingRule {
    /// Exact equality.
    #[default]
    Default,
    /// Case-insensitive string comparison.
    StringIgnoreCase,
    /// LDAP distinguished name comparison: case-insensitive, whitespace
    /// around RDN separators ignored.
    DistinguishedName,
    /// UUID comparison: case-insensitive, braces and hyphens ignored.
    Uuid,
}

impl MatchingRule {
    /// Get the rule name as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchingRule::Default => "default",
            MatchingRule::StringIgnoreCase => "stringIgnoreCase",
            MatchingRule::DistinguishedName => "distinguishedName",
            MatchingRule::Uuid => "uuid",
        }
    }

    /// Normalize a value into its canonical comparison form.
    ///
    /// Non-string values are returned unchanged.
    pub fn normalize(&self, value: &AttributeValue) -> AttributeValue {
        let AttributeValue::String(s) = value else {
            return value.clone();
        };
        match self {
            MatchingRule::Default => value.clone(),
            MatchingRule::StringIgnoreCase => AttributeValue::String(s.to_lowercase()),
            MatchingRule::DistinguishedName => AttributeValue::String(normalize_dn(s)),
            MatchingRule::Uuid => AttributeValue::String(
                s.trim_matches(|c| c == '{' || c == '}')
                    .replace('-', "")
                    .to_lowercase(),
            ),
        }
    }

    /// Check whether two values match under this rule.
    pub fn matches(&self, a: &AttributeValue, b: &AttributeValue) -> bool {
        match self {
            MatchingRule::Default => a == b,
            _ => self.normalize(a) == self.normalize(b),
        }
    }
}

impl fmt::Display for MatchingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MatchingRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(MatchingRule::Default),
            "stringIgnoreCase" => Ok(MatchingRule::StringIgnoreCase),
            "distinguishedName" => Ok(MatchingRule::DistinguishedName),
            "uuid" => Ok(MatchingRule::Uuid),
            _ => Err(format!("Unknown matching rule: {s}")),
        }
    }
}

/// Split a DN into RDNs on unescaped commas, then trim and lowercase each
/// `type=value` pair.
fn normalize_dn(dn: &str) -> String {
    let mut rdns = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for c in dn.chars() {
        if escaped {
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            current.push(c);
            escaped = true;
        } else if c == ',' {
            rdns.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    rdns.push(current);

    rdns.iter()
        .map(|rdn| match rdn.split_once('=') {
            Some((attr, value)) => format!(
                "{}={}",
                attr.trim().to_lowercase(),
                value.trim().to_lowercase()
            ),
            None => rdn.trim().to_lowercase(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> AttributeValue {
        AttributeValue::from(v)
    }

    #[test]
    fn test_default_rule_is_exact() {
        assert!(MatchingRule::Default.matches(&s("Jack"), &s("Jack")));
        assert!(!MatchingRule::Default.matches(&s("Jack"), &s("jack")));
    }

    #[test]
    fn test_ignore_case() {
        assert!(MatchingRule::StringIgnoreCase.matches(&s("A@X.com"), &s("a@x.COM")));
    }

    #[test]
    fn test_distinguished_name() {
        let rule = MatchingRule::DistinguishedName;
        assert!(rule.matches(
            &s("uid=jack, ou=People,dc=example,dc=com"),
            &s("UID=Jack,ou=people , dc=Example,dc=com")
        ));
        assert!(!rule.matches(&s("uid=jack,ou=people"), &s("uid=jill,ou=people")));
        // escaped comma stays inside the RDN value
        assert_eq!(
            rule.normalize(&s("cn=Sparrow\\, Jack ,o=Pirates")),
            s("cn=sparrow\\, jack,o=pirates")
        );
    }

    #[test]
    fn test_uuid_rule() {
        assert!(MatchingRule::Uuid.matches(
            &s("{1B4E28BA-2FA1-11D2-883F-0016D3CCA427}"),
            &s("1b4e28ba2fa111d2883f0016d3cca427")
        ));
    }

    #[test]
    fn test_non_string_values_untouched() {
        let v = AttributeValue::from(5i64);
        assert_eq!(MatchingRule::StringIgnoreCase.normalize(&v), v);
    }

    #[test]
    fn test_parse_roundtrip_names() {
        for rule in [
            MatchingRule::Default,
            MatchingRule::StringIgnoreCase,
            MatchingRule::DistinguishedName,
            MatchingRule::Uuid,
        ] {
            assert_eq!(rule.as_str().parse::<MatchingRule>().unwrap(), rule);
        }
        assert!("polyString".parse::<MatchingRule>().is_err());
    }
}

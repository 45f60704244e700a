// src/travis/versions.rs
// =============================================================================
// This module decides whether a `.travis.yml` declares a Python version.
//
// People write the `python:` key in many ways:
//
//   python: 3.8            # a single number
//   python: "3.8"          # a single string
//   python: [3.6, "3.7"]   # a list mixing both
//   python:
//     - "2.7"
//     - pypy3
//
// So we can't just compare strings, and we can't just compare numbers. Every
// declared value is turned into its string form and compared with the target
// version the user asked about.
//
// A known trap: YAML reads `3.10` as the number 3.1. We keep that reading
// (it renders as "3.1" and won't match "3.10"), because that is literally
// what the file says. Quote your versions!
//
// Rust concepts:
// - #[serde(untagged)]: serde tries each enum variant until one fits
// - Display trait: gives us `.to_string()` for free
// =============================================================================

use std::fmt;

use serde::Deserialize;

/// One value from the `python:` key
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum VersionValue {
    Bool(bool),
    // Integer must come before Float, serde would happily read 3 as 3.0
    Integer(i64),
    Float(f64),
    Text(String),
}

impl VersionValue {
    /// Compares with a target version, falling back to the string form for
    /// numbers (so the number 3.8 matches "3.8")
    pub fn matches(&self, target: &str) -> bool {
        match self {
            VersionValue::Text(text) => text == target,
            other => other.to_string() == target,
        }
    }
}

impl fmt::Display for VersionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionValue::Bool(value) => write!(f, "{}", value),
            VersionValue::Integer(value) => write!(f, "{}", value),
            // Rust prints 3.0_f64 as "3"; keep the ".0" like the file had it
            VersionValue::Float(value) if value.is_finite() && value.fract() == 0.0 => {
                write!(f, "{:.1}", value)
            }
            VersionValue::Float(value) => write!(f, "{}", value),
            VersionValue::Text(value) => f.write_str(value),
        }
    }
}

/// The whole `python:` declaration, either one value or a list of them
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DeclaredVersions {
    List(Vec<VersionValue>),
    Single(VersionValue),
}

impl DeclaredVersions {
    /// Returns true if `target` is one of the declared versions.
    ///
    /// For a list this is membership, for a single value it's equality.
    pub fn matches(&self, target: &str) -> bool {
        match self {
            DeclaredVersions::List(values) => values.iter().any(|v| v.matches(target)),
            DeclaredVersions::Single(value) => value.matches(target),
        }
    }

    /// String forms of the declared versions, sorted for lists.
    ///
    /// The sort is lexical ("3.10" sorts before "3.6"), which is good
    /// enough for display.
    pub fn rendered(&self) -> Vec<String> {
        match self {
            DeclaredVersions::List(values) => {
                let mut rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                rendered.sort();
                rendered
            }
            DeclaredVersions::Single(value) => vec![value.to_string()],
        }
    }
}

// "3.6, 3.7, 3.8" for lists, the plain value otherwise
impl fmt::Display for DeclaredVersions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered().join(", "))
    }
}

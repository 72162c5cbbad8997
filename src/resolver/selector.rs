//! Label selectors over release and OS image labels
//!
//! Supports the Kubernetes label selector grammar:
//! - `key` / `!key` - label present / absent
//! - `key=value`, `key==value` - label present with value
//! - `key!=value` - label absent or with a different value
//! - `key in (a,b)` - label present with one of the values
//! - `key notin (a,b)` - label absent or with none of the values
//!
//! Terms are comma-separated and all must hold.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::resolver::types::Labels;

/// Longest allowed label name (the part after an optional `prefix/`)
const MAX_LABEL_NAME_LEN: usize = 63;

static LABEL_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[a-z0-9](?:[-a-z0-9]*[a-z0-9])?(?:\.[a-z0-9](?:[-a-z0-9]*[a-z0-9])?)*/)?[A-Za-z0-9](?:[-A-Za-z0-9_.]*[A-Za-z0-9])?$",
    )
    .expect("label key pattern is valid")
});

static LABEL_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9](?:[-A-Za-z0-9_.]*[A-Za-z0-9])?)?$")
        .expect("label value pattern is valid")
});

/// Set-based term: `key in (a, b)` / `key notin (a, b)`
static SET_TERM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)\s+(in|notin)\s*\(([^()]*)\)$").expect("set term pattern is valid")
});

/// Error type for selector construction and parsing
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Invalid label key: {0:?}")]
    InvalidKey(String),

    #[error("Invalid label value: {0:?}")]
    InvalidValue(String),

    #[error("Operator {operator} takes {expected} value(s), got {actual}")]
    ValueCount {
        operator: Operator,
        expected: &'static str,
        actual: usize,
    },

    #[error("Invalid selector syntax: {0:?}")]
    InvalidSyntax(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operator::Equals => "=",
            Operator::NotEquals => "!=",
            Operator::In => "in",
            Operator::NotIn => "notin",
            Operator::Exists => "exists",
            Operator::DoesNotExist => "!",
        })
    }
}

/// A single selector term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

impl Requirement {
    /// Build a validated requirement
    pub fn new<I, S>(key: impl Into<String>, operator: Operator, values: I) -> Result<Self, SelectorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = key.into();
        validate_key(&key)?;

        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        let (valid_count, expected) = match operator {
            Operator::Exists | Operator::DoesNotExist => (values.is_empty(), "0"),
            Operator::Equals | Operator::NotEquals => (values.len() == 1, "1"),
            Operator::In | Operator::NotIn => (!values.is_empty(), "1 or more"),
        };
        if !valid_count {
            return Err(SelectorError::ValueCount {
                operator,
                expected,
                actual: values.len(),
            });
        }
        if let Some(value) = values.iter().find(|v| !LABEL_VALUE_RE.is_match(v)) {
            return Err(SelectorError::InvalidValue(value.clone()));
        }

        Ok(Self {
            key,
            operator,
            values,
        })
    }

    /// `key`: the label must be present
    pub fn exists(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            operator: Operator::Exists,
            values: BTreeSet::new(),
        }
    }

    /// `!key`: the label must be absent
    pub fn does_not_exist(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            operator: Operator::DoesNotExist,
            values: BTreeSet::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn values(&self) -> &BTreeSet<String> {
        &self.values
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
            Operator::Equals | Operator::In => value.is_some_and(|v| self.values.contains(v)),
            // Absent labels satisfy negative value requirements
            Operator::NotEquals | Operator::NotIn => !value.is_some_and(|v| self.values.contains(v)),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
            Operator::Equals | Operator::NotEquals => {
                let value = self.values.iter().next().map(String::as_str).unwrap_or_default();
                write!(f, "{}{}{}", self.key, self.operator, value)
            }
            Operator::In | Operator::NotIn => {
                let values: Vec<&str> = self.values.iter().map(String::as_str).collect();
                write!(f, "{} {} ({})", self.key, self.operator, values.join(","))
            }
        }
    }
}

/// Conjunction of requirements. The empty selector matches every label set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    pub fn everything() -> Self {
        Self::default()
    }

    /// Returns the selector extended with one more requirement
    pub fn add(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self.requirements.iter().map(ToString::to_string).collect();
        f.write_str(&terms.join(","))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Selector::everything());
        }

        split_terms(s)?
            .into_iter()
            .map(parse_term)
            .collect::<Result<Vec<_>, _>>()
            .map(|requirements| Selector { requirements })
    }
}

/// Split at commas outside of parentheses
fn split_terms(s: &str) -> Result<Vec<&str>, SelectorError> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| SelectorError::InvalidSyntax(s.to_string()))?;
            }
            ',' if depth == 0 => {
                terms.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(SelectorError::InvalidSyntax(s.to_string()));
    }
    terms.push(s[start..].trim());

    Ok(terms)
}

fn parse_term(term: &str) -> Result<Requirement, SelectorError> {
    if term.is_empty() {
        return Err(SelectorError::InvalidSyntax(term.to_string()));
    }

    if let Some(captures) = SET_TERM_RE.captures(term) {
        let operator = if &captures[2] == "in" {
            Operator::In
        } else {
            Operator::NotIn
        };
        let values: Vec<&str> = captures[3]
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect();
        return Requirement::new(&captures[1], operator, values);
    }

    if let Some(key) = term.strip_prefix('!') {
        let key = key.trim();
        validate_key(key)?;
        return Ok(Requirement::does_not_exist(key));
    }

    let (key, operator, value) = if let Some((key, value)) = term.split_once("!=") {
        (key, Operator::NotEquals, value)
    } else if let Some((key, value)) = term.split_once("==") {
        (key, Operator::Equals, value)
    } else if let Some((key, value)) = term.split_once('=') {
        (key, Operator::Equals, value)
    } else {
        validate_key(term)?;
        return Ok(Requirement::exists(term));
    };

    Requirement::new(key.trim(), operator, [value.trim()])
}

fn validate_key(key: &str) -> Result<(), SelectorError> {
    let name = key.rsplit_once('/').map_or(key, |(_, name)| name);
    if name.len() > MAX_LABEL_NAME_LEN || !LABEL_KEY_RE.is_match(key) {
        return Err(SelectorError::InvalidKey(key.to_string()));
    }
    Ok(())
}

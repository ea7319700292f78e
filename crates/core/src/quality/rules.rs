//! Dataset-shape rules: which column carries record time and which
//! arithmetic invariants must hold row by row.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::CoreError;

/// Default designated timestamp column.
pub const DEFAULT_TIMESTAMP_COLUMN: &str = "date";

/// Default invariant: rentals split into casual and registered users.
pub const DEFAULT_INVARIANTS: &str = "user_counts:total_rentals=casual_users+registered_users";

/// `total = part_1 + part_2 + ...`, checked on every row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SumInvariant {
    pub name: String,
    pub total: String,
    pub parts: Vec<String>,
}

impl SumInvariant {
    pub fn new(name: impl Into<String>, total: impl Into<String>, parts: Vec<String>) -> Self {
        Self {
            name: name.into(),
            total: total.into(),
            parts,
        }
    }

    /// Every column the invariant reads.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.total.as_str()).chain(self.parts.iter().map(String::as_str))
    }
}

impl fmt::Display for SumInvariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.total, self.parts.join(" + "))
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 128
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn identifier(name: &str, invariant: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();
    if is_identifier(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(CoreError::ConfigValidation(format!(
            "invalid column name '{trimmed}' in invariant '{invariant}'"
        )))
    }
}

/// Parses `name:total=a+b`, or `total=a+b` (named after the total column).
impl FromStr for SumInvariant {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (name, expr) = match raw.split_once(':') {
            Some((name, expr)) => (Some(identifier(name, raw)?), expr),
            None => (None, raw),
        };

        let (total, sum) = expr.split_once('=').ok_or_else(|| {
            CoreError::ConfigValidation(format!("invariant '{raw}' must have the form total=a+b"))
        })?;

        let total = identifier(total, raw)?;
        let parts = sum
            .split('+')
            .map(|p| identifier(p, raw))
            .collect::<Result<Vec<_>, _>>()?;

        if parts.len() < 2 {
            return Err(CoreError::ConfigValidation(format!(
                "invariant '{raw}' needs at least two summands"
            )));
        }

        Ok(Self {
            name: name.unwrap_or_else(|| total.clone()),
            total,
            parts,
        })
    }
}

/// Shape rules applied during evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityRules {
    pub timestamp_column: String,
    pub invariants: Vec<SumInvariant>,
}

impl QualityRules {
    /// Parse a `;`-separated invariant list. Blank entries are skipped.
    pub fn parse_invariants(raw: &str) -> Result<Vec<SumInvariant>, CoreError> {
        let invariants = raw
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<SumInvariant>)
            .collect::<Result<Vec<_>, _>>()?;

        for (i, inv) in invariants.iter().enumerate() {
            if invariants[..i].iter().any(|other| other.name == inv.name) {
                return Err(CoreError::ConfigValidation(format!(
                    "duplicate invariant name '{}'",
                    inv.name
                )));
            }
        }
        Ok(invariants)
    }
}

impl Default for QualityRules {
    fn default() -> Self {
        Self {
            timestamp_column: DEFAULT_TIMESTAMP_COLUMN.to_string(),
            invariants: Self::parse_invariants(DEFAULT_INVARIANTS).unwrap_or_default(),
        }
    }
}

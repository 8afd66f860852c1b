use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::EntityRef;

/// A referring token ("it", "the selected objects") and, once the context
/// store has looked it up, the entity it points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<EntityRef>,
}

impl Reference {
    pub fn unresolved(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            resolved: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }
}

/// Spatial relation to the most recently placed entity ("above it",
/// "next to the last one").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Above,
    Below,
    NextTo,
}

impl Relation {
    /// Distance between an anchor and an object placed relative to it.
    pub const SPACING: f64 = 5.0;

    /// Offset from the anchor's position (Z up, X to the side).
    pub fn offset(&self) -> [f64; 3] {
        match self {
            Self::Above => [0.0, 0.0, Self::SPACING],
            Self::Below => [0.0, 0.0, -Self::SPACING],
            Self::NextTo => [Self::SPACING, 0.0, 0.0],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Above => "above",
            Self::Below => "below",
            Self::NextTo => "next to",
        }
    }
}

/// A typed parameter value pulled out of command text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
    Number(f64),
    Vector([f64; 3]),
    /// Canonical lowercase color name from the extractor's vocabulary.
    Color(String),
    Text(String),
    Grid { rows: u32, cols: u32 },
    Reference(Reference),
    /// Position relative to an earlier entity. Resolved to a `Vector`
    /// against the conversation context before validation.
    Placement(Relation),
}

/// Type tag of a [`ParamValue`], used by intent schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Number,
    Vector,
    Color,
    Text,
    Grid,
    Reference,
    Placement,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Vector => "vector",
            Self::Color => "color",
            Self::Text => "text",
            Self::Grid => "grid",
            Self::Reference => "reference",
            Self::Placement => "placement",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Number(_) => ParamKind::Number,
            Self::Vector(_) => ParamKind::Vector,
            Self::Color(_) => ParamKind::Color,
            Self::Text(_) => ParamKind::Text,
            Self::Grid { .. } => ParamKind::Grid,
            Self::Reference(_) => ParamKind::Reference,
            Self::Placement(_) => ParamKind::Placement,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<[f64; 3]> {
        match self {
            Self::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Color(s) | Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Self::Reference(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Vector([x, y, z]) => write!(f, "({x}, {y}, {z})"),
            Self::Color(c) => f.write_str(c),
            Self::Text(t) => write!(f, "'{t}'"),
            Self::Grid { rows, cols } => write!(f, "{rows}x{cols}"),
            Self::Reference(r) => match &r.resolved {
                Some(entity) => write!(f, "{} -> {}", r.token, entity),
                None => write!(f, "{} (unresolved)", r.token),
            },
            Self::Placement(relation) => write!(f, "{} the last object", relation.as_str()),
        }
    }
}

/// Parameter name → typed value. Keys are unique; iteration is sorted so
/// serialized output is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, ParamValue>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) -> Option<ParamValue> {
        self.0.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut ParamValue)> {
        self.0.iter_mut()
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ParamValue::as_number)
    }

    pub fn vector(&self, name: &str) -> Option<[f64; 3]> {
        self.get(name).and_then(ParamValue::as_vector)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_str)
    }

    /// The resolved entity behind a reference parameter, if any.
    pub fn entity(&self, name: &str) -> Option<&EntityRef> {
        self.get(name)
            .and_then(ParamValue::as_reference)
            .and_then(|r| r.resolved.as_ref())
    }
}

impl FromIterator<(String, ParamValue)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

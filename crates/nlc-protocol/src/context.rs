use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::params::ParameterSet;
use crate::result::ErrorKind;

/// Opaque handle naming one conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub const DEFAULT: &'static str = "default";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Descriptor of one or more host entities a turn created or mentioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRef {
    /// Host object identifiers.
    pub ids: Vec<String>,
    /// Entity kind, e.g. "sphere", or "group" for merged references.
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Placement point reported by the host, used to position new objects
    /// relative to this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[f64; 3]>,
}

impl EntityRef {
    pub fn single(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            ids: vec![id.into()],
            kind: kind.into(),
            label: None,
            position: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_position(mut self, position: [f64; 3]) -> Self {
        self.position = Some(position);
        self
    }

    /// Merge several entities into one group descriptor (ids de-duplicated,
    /// order preserved). A single entity is returned unchanged.
    pub fn group(entities: &[EntityRef]) -> Option<Self> {
        match entities {
            [] => None,
            [one] => Some(one.clone()),
            many => {
                let mut ids: Vec<String> = Vec::new();
                for id in many.iter().flat_map(|e| e.ids.iter()) {
                    if !ids.contains(id) {
                        ids.push(id.clone());
                    }
                }
                Some(Self {
                    ids,
                    kind: "group".to_string(),
                    label: None,
                    position: None,
                })
            }
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} '{}'", self.kind, label),
            None if self.ids.len() == 1 => write!(f, "{} {}", self.kind, self.ids[0]),
            None => write!(f, "{} of {}", self.kind, self.ids.len()),
        }
    }
}

/// One recorded input/outcome pair. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Raw input text as received.
    pub input: String,
    /// Resolved intent name (or best guess / "Unrecognized" on failure).
    pub intent: String,
    pub parameters: ParameterSet,
    /// Short human-readable outcome.
    pub summary: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Entities created or mentioned by this turn, oldest first.
    #[serde(default)]
    pub entities: Vec<EntityRef>,
}

impl ConversationTurn {
    pub fn new(input: impl Into<String>, intent: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            input: input.into(),
            intent: intent.into(),
            parameters: ParameterSet::new(),
            summary: String::new(),
            success: false,
            error_kind: None,
            entities: Vec::new(),
        }
    }
}

/// Axis-aligned bounding box of the host scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingBox {
    pub fn size(&self) -> [f64; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: [
                self.min[0].min(other.min[0]),
                self.min[1].min(other.min[1]),
                self.min[2].min(other.min[2]),
            ],
            max: [
                self.max[0].max(other.max[0]),
                self.max[1].max(other.max[1]),
                self.max[2].max(other.max[2]),
            ],
        }
    }
}

/// Facts about the host scene, supplied by the scene snapshot collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub object_count: usize,
    /// One entry per object (a multiset of type names).
    #[serde(default)]
    pub object_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default)]
    pub active_layers: Vec<String>,
}

impl SceneSnapshot {
    /// Multiset view of `object_types`.
    pub fn type_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for t in &self.object_types {
            *counts.entry(t.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// One-line description suitable for a model prompt.
    pub fn describe(&self) -> String {
        if self.object_count == 0 {
            return "empty scene".to_string();
        }
        let types = self
            .type_counts()
            .iter()
            .map(|(t, n)| format!("{n} {t}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut out = format!("{} objects ({types})", self.object_count);
        if let Some(bbox) = &self.bounding_box {
            let [x, y, z] = bbox.size();
            out.push_str(&format!(", extents {x:.2} x {y:.2} x {z:.2}"));
        }
        if !self.active_layers.is_empty() {
            out.push_str(&format!(", layers: {}", self.active_layers.join(", ")));
        }
        out
    }
}

/// Bounded recent history plus the latest scene snapshot for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub session_id: SessionId,
    /// Oldest first.
    pub turns: Vec<ConversationTurn>,
    pub scene: SceneSnapshot,
}

impl ConversationContext {
    /// Intent names of the last `n` turns, newest last.
    pub fn recent_intents(&self, n: usize) -> Vec<&str> {
        let start = self.turns.len().saturating_sub(n);
        self.turns[start..].iter().map(|t| t.intent.as_str()).collect()
    }
}

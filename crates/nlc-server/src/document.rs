//! In-memory CAD document.
//!
//! Plays both host collaborators (scene snapshot and action executor) so the
//! server runs without a real CAD application. Solids are axis-aligned
//! boxes described by a center and half extents; no geometry kernel.

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;

use nlc_pipeline::{ActionExecutor, ActionOutcome, ExecutorError, SceneSnapshotProvider};
use nlc_protocol::{BoundingBox, EntityRef, ParameterSet, SceneSnapshot};

pub const DEFAULT_LAYER: &str = "Default";

/// One object in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Solid {
    pub id: String,
    pub kind: String,
    pub name: Option<String>,
    pub layer: String,
    pub color: Option<String>,
    pub material: Option<String>,
    pub center: [f64; 3],
    pub half: [f64; 3],
    /// Accumulated rotation about Z, degrees in [0, 360).
    pub rotation: f64,
}

impl Solid {
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox {
            min: [0, 1, 2].map(|i| self.center[i] - self.half[i]),
            max: [0, 1, 2].map(|i| self.center[i] + self.half[i]),
        }
    }

    fn entity(&self) -> EntityRef {
        let entity = EntityRef::single(&self.id, &self.kind).with_position(self.center);
        match &self.name {
            Some(name) => entity.with_label(name),
            None => entity,
        }
    }
}

#[derive(Debug, Default)]
struct Document {
    /// Creation order.
    solids: Vec<Solid>,
    next_id: u64,
    selection: Vec<String>,
}

impl Document {
    fn mint_id(&mut self) -> String {
        self.next_id += 1;
        format!("obj-{}", self.next_id)
    }

    fn position(&self, id: &str) -> Result<usize, ExecutorError> {
        self.solids
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| ExecutorError::NotFound(id.to_string()))
    }

    /// Ids behind the `target` parameter, each checked to exist.
    fn targets(&self, parameters: &ParameterSet) -> Result<Vec<String>, ExecutorError> {
        let entity = parameters
            .entity("target")
            .ok_or_else(|| ExecutorError::Rejected("no target given".into()))?;
        for id in &entity.ids {
            self.position(id)?;
        }
        Ok(entity.ids.clone())
    }

    fn solid_mut(&mut self, id: &str) -> Result<&mut Solid, ExecutorError> {
        let index = self.position(id)?;
        Ok(&mut self.solids[index])
    }

    fn entities(&self, ids: &[String]) -> Vec<EntityRef> {
        self.solids
            .iter()
            .filter(|s| ids.contains(&s.id))
            .map(Solid::entity)
            .collect()
    }

    fn create(
        &mut self,
        kind: &str,
        half: [f64; 3],
        parameters: &ParameterSet,
    ) -> ActionOutcome {
        let solid = Solid {
            id: self.mint_id(),
            kind: kind.to_string(),
            name: parameters.text("name").map(str::to_string),
            layer: parameters
                .text("layer")
                .map_or_else(|| DEFAULT_LAYER.to_string(), str::to_string),
            color: parameters.text("color").map(str::to_string),
            material: parameters.text("material").map(str::to_string),
            center: parameters.vector("center").unwrap_or_default(),
            half,
            rotation: 0.0,
        };
        let mut summary = match &solid.color {
            Some(color) => format!("Created {color} {kind} {}", solid.id),
            None => format!("Created {kind} {}", solid.id),
        };
        if let Some(material) = &solid.material {
            summary.push_str(&format!(" made of {material}"));
        }
        let entity = solid.entity();
        self.solids.push(solid);
        ActionOutcome::new(summary).with_entities(vec![entity])
    }

    fn apply(&mut self, intent: &str, p: &ParameterSet) -> Result<ActionOutcome, ExecutorError> {
        match intent {
            "CreateSphere" => {
                let r = number(p, "radius")?;
                Ok(self.create("sphere", [r, r, r], p))
            }
            "CreateBox" => {
                let size = p
                    .vector("size")
                    .ok_or_else(|| missing("size"))?;
                Ok(self.create("box", size.map(|s| s / 2.0), p))
            }
            "CreateCylinder" => {
                let r = number(p, "radius")?;
                let h = number(p, "height")?;
                Ok(self.create("cylinder", [r, r, h / 2.0], p))
            }
            "MoveObject" => {
                let offset = p.vector("translation").ok_or_else(|| missing("translation"))?;
                self.each_target(p, "Moved", |s| {
                    s.center = [0, 1, 2].map(|i| s.center[i] + offset[i]);
                })
            }
            "ScaleObject" => {
                let factors = p.vector("scale").ok_or_else(|| missing("scale"))?;
                self.each_target(p, "Scaled", |s| {
                    s.half = [0, 1, 2].map(|i| s.half[i] * factors[i]);
                })
            }
            "RotateObject" => {
                let angle = number(p, "angle")?;
                self.each_target(p, "Rotated", |s| {
                    s.rotation = (s.rotation + angle).rem_euclid(360.0);
                    let quarters = angle / 90.0;
                    if quarters.fract() == 0.0 && (quarters as i64) % 2 != 0 {
                        s.half.swap(0, 1);
                    }
                })
            }
            "SetColor" => {
                let color = p.text("color").ok_or_else(|| missing("color"))?.to_string();
                self.each_target(p, "Colored", |s| s.color = Some(color.clone()))
            }
            "SelectObjects" => Ok(self.select(p)),
            "DeleteObject" => {
                let ids = self.targets(p)?;
                let removed = self.entities(&ids);
                self.solids.retain(|s| !ids.contains(&s.id));
                self.selection.retain(|id| !ids.contains(id));
                Ok(ActionOutcome::new(format!("Deleted {}", ids.join(", "))).with_entities(removed))
            }
            "ArrayObjects" => self.array(p),
            "BooleanUnion" => self.boolean(p, "union"),
            "BooleanDifference" => self.boolean(p, "difference"),
            "BooleanIntersection" => self.boolean(p, "intersection"),
            other => Err(ExecutorError::Unsupported(other.to_string())),
        }
    }

    fn each_target(
        &mut self,
        p: &ParameterSet,
        verb: &str,
        mut edit: impl FnMut(&mut Solid),
    ) -> Result<ActionOutcome, ExecutorError> {
        let ids = self.targets(p)?;
        for id in &ids {
            edit(self.solid_mut(id)?);
        }
        Ok(ActionOutcome::new(format!("{verb} {}", ids.join(", "))).with_entities(self.entities(&ids)))
    }

    fn select(&mut self, p: &ParameterSet) -> ActionOutcome {
        let target = p.entity("target").map(|e| e.ids.clone());
        let name = p.text("name");
        let layer = p.text("layer");
        let color = p.text("color");

        let ids: Vec<String> = self
            .solids
            .iter()
            .filter(|s| target.as_ref().is_none_or(|ids| ids.contains(&s.id)))
            .filter(|s| {
                name.is_none_or(|n| s.name.as_deref().is_some_and(|sn| sn.eq_ignore_ascii_case(n)))
            })
            .filter(|s| layer.is_none_or(|l| s.layer.eq_ignore_ascii_case(l)))
            .filter(|s| color.is_none_or(|c| s.color.as_deref() == Some(c)))
            .map(|s| s.id.clone())
            .collect();

        self.selection = ids.clone();
        let payload = json!({ "selected": ids });
        if ids.is_empty() {
            return ActionOutcome::new("Nothing matched").with_payload(payload);
        }
        ActionOutcome::new(format!("Selected {} object(s)", ids.len()))
            .with_entities(self.entities(&ids))
            .with_payload(payload)
    }

    fn array(&mut self, p: &ParameterSet) -> Result<ActionOutcome, ExecutorError> {
        let Some(nlc_protocol::ParamValue::Grid { rows, cols }) = p.get("grid").cloned() else {
            return Err(missing("grid"));
        };
        let sources: Vec<Solid> = if p.contains("target") {
            let ids = self.targets(p)?;
            self.solids.iter().filter(|s| ids.contains(&s.id)).cloned().collect()
        } else {
            self.solids.last().cloned().into_iter().collect()
        };
        if sources.is_empty() {
            return Err(ExecutorError::Rejected("nothing to array".into()));
        }

        let mut created = Vec::new();
        for source in &sources {
            let spacing = p.number("spacing").unwrap_or(2.0 * source.half[0] + 1.0);
            for row in 0..rows {
                for col in 0..cols {
                    if row == 0 && col == 0 {
                        continue;
                    }
                    let mut copy = source.clone();
                    copy.id = self.mint_id();
                    copy.center[0] += f64::from(col) * spacing;
                    copy.center[1] += f64::from(row) * spacing;
                    created.push(copy.entity());
                    self.solids.push(copy);
                }
            }
        }
        Ok(ActionOutcome::new(format!("Arrayed {rows} x {cols}, {} copies", created.len()))
            .with_entities(created))
    }

    fn boolean(&mut self, p: &ParameterSet, op: &str) -> Result<ActionOutcome, ExecutorError> {
        let ids = self.targets(p)?;
        if ids.len() < 2 {
            return Err(ExecutorError::Rejected(format!("{op} needs at least two solids")));
        }
        let inputs: Vec<Solid> = ids
            .iter()
            .map(|id| self.position(id).map(|i| self.solids[i].clone()))
            .collect::<Result<_, _>>()?;

        let first = inputs[0].bounds();
        let bounds = match op {
            "union" => inputs.iter().skip(1).fold(first, |acc, s| acc.union(&s.bounds())),
            "intersection" => {
                let overlap = inputs.iter().skip(1).fold(first, |acc, s| {
                    let b = s.bounds();
                    BoundingBox {
                        min: [0, 1, 2].map(|i| acc.min[i].max(b.min[i])),
                        max: [0, 1, 2].map(|i| acc.max[i].min(b.max[i])),
                    }
                });
                if (0..3).any(|i| overlap.min[i] > overlap.max[i]) {
                    return Err(ExecutorError::Rejected("solids do not overlap".into()));
                }
                overlap
            }
            _ => first,
        };

        let result = Solid {
            id: self.mint_id(),
            kind: op.to_string(),
            name: None,
            layer: inputs[0].layer.clone(),
            color: inputs[0].color.clone(),
            material: inputs[0].material.clone(),
            center: [0, 1, 2].map(|i| (bounds.min[i] + bounds.max[i]) / 2.0),
            half: [0, 1, 2].map(|i| (bounds.max[i] - bounds.min[i]) / 2.0),
            rotation: 0.0,
        };
        self.solids.retain(|s| !ids.contains(&s.id));
        let entity = result.entity();
        let summary = format!("Created {op} {} from {}", result.id, ids.join(", "));
        self.solids.push(result);
        Ok(ActionOutcome::new(summary).with_entities(vec![entity]))
    }

    fn snapshot(&self) -> SceneSnapshot {
        let mut layers: Vec<String> = self.solids.iter().map(|s| s.layer.clone()).collect();
        layers.sort();
        layers.dedup();
        SceneSnapshot {
            object_count: self.solids.len(),
            object_types: self.solids.iter().map(|s| s.kind.clone()).collect(),
            bounding_box: self
                .solids
                .iter()
                .map(Solid::bounds)
                .reduce(|a, b| a.union(&b)),
            active_layers: layers,
        }
    }
}

fn missing(name: &str) -> ExecutorError {
    ExecutorError::Rejected(format!("missing {name}"))
}

fn number(p: &ParameterSet, name: &str) -> Result<f64, ExecutorError> {
    p.number(name).ok_or_else(|| missing(name))
}

/// Shared in-memory document.
#[derive(Debug, Default)]
pub struct InMemoryDocument {
    inner: RwLock<Document>,
}

impl InMemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every solid, in creation order.
    pub async fn solids(&self) -> Vec<Solid> {
        self.inner.read().await.solids.clone()
    }

    pub async fn selection(&self) -> Vec<String> {
        self.inner.read().await.selection.clone()
    }
}

#[async_trait]
impl SceneSnapshotProvider for InMemoryDocument {
    async fn snapshot(&self) -> SceneSnapshot {
        self.inner.read().await.snapshot()
    }
}

#[async_trait]
impl ActionExecutor for InMemoryDocument {
    async fn execute(
        &self,
        intent: &str,
        parameters: &ParameterSet,
    ) -> Result<ActionOutcome, ExecutorError> {
        let outcome = self.inner.write().await.apply(intent, parameters);
        match &outcome {
            Ok(o) => tracing::debug!(intent, summary = %o.summary, "document updated"),
            Err(e) => tracing::debug!(intent, error = %e, "document rejected action"),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlc_protocol::{ParamValue, Reference};

    fn params(entries: &[(&str, ParamValue)]) -> ParameterSet {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn target(ids: &[&str]) -> ParamValue {
        let singles: Vec<EntityRef> = ids.iter().map(|id| EntityRef::single(*id, "solid")).collect();
        ParamValue::Reference(Reference {
            token: "it".into(),
            resolved: EntityRef::group(&singles),
        })
    }

    async fn sphere(doc: &InMemoryDocument, radius: f64) -> String {
        let outcome = doc
            .execute("CreateSphere", &params(&[("radius", ParamValue::Number(radius))]))
            .await
            .unwrap();
        outcome.entities[0].ids[0].clone()
    }

    #[tokio::test]
    async fn create_and_snapshot() {
        let doc = InMemoryDocument::new();
        let outcome = doc
            .execute(
                "CreateSphere",
                &params(&[
                    ("radius", ParamValue::Number(5.0)),
                    ("color", ParamValue::Color("red".into())),
                ]),
            )
            .await
            .unwrap();
        assert_eq!(outcome.summary, "Created red sphere obj-1");

        doc.execute(
            "CreateBox",
            &params(&[
                ("size", ParamValue::Vector([2.0, 2.0, 2.0])),
                ("center", ParamValue::Vector([10.0, 0.0, 0.0])),
                ("layer", ParamValue::Text("Walls".into())),
            ]),
        )
        .await
        .unwrap();

        assert_eq!(doc.solids().await[1].entity().position, Some([10.0, 0.0, 0.0]));

        let scene = doc.snapshot().await;
        assert_eq!(scene.object_count, 2);
        assert_eq!(scene.object_types, vec!["sphere", "box"]);
        assert_eq!(scene.active_layers, vec!["Default", "Walls"]);
        let bbox = scene.bounding_box.unwrap();
        assert_eq!(bbox.min, [-5.0, -5.0, -5.0]);
        assert_eq!(bbox.max, [11.0, 5.0, 5.0]);
    }

    #[tokio::test]
    async fn material_is_recorded_and_reported() {
        let doc = InMemoryDocument::new();
        let outcome = doc
            .execute(
                "CreateCylinder",
                &params(&[
                    ("radius", ParamValue::Number(1.0)),
                    ("height", ParamValue::Number(4.0)),
                    ("material", ParamValue::Text("oak".into())),
                ]),
            )
            .await
            .unwrap();
        assert_eq!(outcome.summary, "Created cylinder obj-1 made of oak");
        assert_eq!(outcome.entities[0].position, Some([0.0, 0.0, 0.0]));
        assert_eq!(doc.solids().await[0].material.as_deref(), Some("oak"));
    }

    #[tokio::test]
    async fn empty_document_has_no_bounds() {
        let scene = InMemoryDocument::new().snapshot().await;
        assert_eq!(scene.object_count, 0);
        assert!(scene.bounding_box.is_none());
    }

    #[tokio::test]
    async fn move_and_delete() {
        let doc = InMemoryDocument::new();
        let id = sphere(&doc, 1.0).await;
        doc.execute(
            "MoveObject",
            &params(&[
                ("target", target(&[id.as_str()])),
                ("translation", ParamValue::Vector([0.0, 0.0, 5.0])),
            ]),
        )
        .await
        .unwrap();
        assert_eq!(doc.solids().await[0].center, [0.0, 0.0, 5.0]);

        let outcome = doc
            .execute("DeleteObject", &params(&[("target", target(&[id.as_str()]))]))
            .await
            .unwrap();
        assert_eq!(outcome.summary, "Deleted obj-1");
        assert!(doc.solids().await.is_empty());

        let err = doc
            .execute("DeleteObject", &params(&[("target", target(&[id.as_str()]))]))
            .await
            .unwrap_err();
        assert_eq!(err, ExecutorError::NotFound("obj-1".into()));
    }

    #[tokio::test]
    async fn array_copies_last_solid() {
        let doc = InMemoryDocument::new();
        sphere(&doc, 1.0).await;
        let outcome = doc
            .execute(
                "ArrayObjects",
                &params(&[
                    ("grid", ParamValue::Grid { rows: 2, cols: 3 }),
                    ("spacing", ParamValue::Number(4.0)),
                ]),
            )
            .await
            .unwrap();
        assert_eq!(outcome.entities.len(), 5);
        let solids = doc.solids().await;
        assert_eq!(solids.len(), 6);
        assert_eq!(solids.last().unwrap().center, [8.0, 4.0, 0.0]);
    }

    #[tokio::test]
    async fn select_by_color_and_layer() {
        let doc = InMemoryDocument::new();
        for color in ["red", "blue", "red"] {
            doc.execute(
                "CreateSphere",
                &params(&[
                    ("radius", ParamValue::Number(1.0)),
                    ("color", ParamValue::Color(color.into())),
                ]),
            )
            .await
            .unwrap();
        }
        let outcome = doc
            .execute("SelectObjects", &params(&[("color", ParamValue::Color("red".into()))]))
            .await
            .unwrap();
        assert_eq!(outcome.summary, "Selected 2 object(s)");
        assert_eq!(outcome.payload.unwrap()["selected"], json!(["obj-1", "obj-3"]));
        assert_eq!(doc.selection().await, vec!["obj-1", "obj-3"]);

        let outcome = doc
            .execute("SelectObjects", &params(&[("layer", ParamValue::Text("Walls".into()))]))
            .await
            .unwrap();
        assert_eq!(outcome.summary, "Nothing matched");
        assert!(outcome.entities.is_empty());
    }

    #[tokio::test]
    async fn boolean_needs_two_solids() {
        let doc = InMemoryDocument::new();
        let a = sphere(&doc, 1.0).await;
        let err = doc
            .execute("BooleanUnion", &params(&[("target", target(&[a.as_str()]))]))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Rejected(_)));
    }

    #[tokio::test]
    async fn union_replaces_inputs() {
        let doc = InMemoryDocument::new();
        let a = sphere(&doc, 1.0).await;
        let b = sphere(&doc, 2.0).await;
        let outcome = doc
            .execute("BooleanUnion", &params(&[("target", target(&[a.as_str(), b.as_str()]))]))
            .await
            .unwrap();
        assert_eq!(outcome.entities[0].kind, "union");
        let solids = doc.solids().await;
        assert_eq!(solids.len(), 1);
        assert_eq!(solids[0].half, [2.0, 2.0, 2.0]);
    }

    #[tokio::test]
    async fn disjoint_intersection_rejected() {
        let doc = InMemoryDocument::new();
        let a = sphere(&doc, 1.0).await;
        let b = sphere(&doc, 1.0).await;
        doc.execute(
            "MoveObject",
            &params(&[
                ("target", target(&[b.as_str()])),
                ("translation", ParamValue::Vector([10.0, 0.0, 0.0])),
            ]),
        )
        .await
        .unwrap();
        let err = doc
            .execute("BooleanIntersection", &params(&[("target", target(&[a.as_str(), b.as_str()]))]))
            .await
            .unwrap_err();
        assert_eq!(err, ExecutorError::Rejected("solids do not overlap".into()));
        assert_eq!(doc.solids().await.len(), 2);
    }

    #[tokio::test]
    async fn quarter_turn_swaps_extents() {
        let doc = InMemoryDocument::new();
        let outcome = doc
            .execute("CreateBox", &params(&[("size", ParamValue::Vector([4.0, 2.0, 1.0]))]))
            .await
            .unwrap();
        let id = outcome.entities[0].ids[0].clone();
        doc.execute(
            "RotateObject",
            &params(&[("target", target(&[id.as_str()])), ("angle", ParamValue::Number(90.0))]),
        )
        .await
        .unwrap();
        let solid = &doc.solids().await[0];
        assert_eq!(solid.half, [1.0, 2.0, 0.5]);
        assert_eq!(solid.rotation, 90.0);
    }

    #[tokio::test]
    async fn unknown_intent_unsupported() {
        let err = InMemoryDocument::new()
            .execute("Extrude", &ParameterSet::new())
            .await
            .unwrap_err();
        assert_eq!(err, ExecutorError::Unsupported("Extrude".into()));
    }
}

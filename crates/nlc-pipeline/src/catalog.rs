//! Intent catalog: classifier cues and parameter schemas per intent.

use serde::Serialize;

use nlc_protocol::{DispatchKind, Intent, ParamKind};

/// Schema entry for one parameter of an intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    /// Inclusive bounds for numbers, each vector component, and grid sides.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl ParamSpec {
    fn new(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            min: None,
            max: None,
        }
    }

    pub fn number(name: &'static str) -> Self {
        Self::new(name, ParamKind::Number)
    }
    pub fn vector(name: &'static str) -> Self {
        Self::new(name, ParamKind::Vector)
    }
    pub fn color(name: &'static str) -> Self {
        Self::new(name, ParamKind::Color)
    }
    pub fn text(name: &'static str) -> Self {
        Self::new(name, ParamKind::Text)
    }
    pub fn grid(name: &'static str) -> Self {
        Self::new(name, ParamKind::Grid)
    }
    pub fn reference(name: &'static str) -> Self {
        Self::new(name, ParamKind::Reference)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// Everything the pipeline knows about one intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentSpec {
    pub name: &'static str,
    pub dispatch: DispatchKind,
    pub description: &'static str,
    /// Verb phrases that announce the intent ("create", "how do i").
    #[serde(skip)]
    pub triggers: &'static [&'static str],
    /// Nouns the intent acts on ("sphere", "ball").
    #[serde(skip)]
    pub subjects: &'static [&'static str],
    /// A trigger without a subject is only weak evidence.
    #[serde(skip)]
    pub subject_required: bool,
    /// Score when only a subject appears.
    #[serde(skip)]
    pub subject_only: f64,
    pub params: Vec<ParamSpec>,
}

impl IntentSpec {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn param_names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name.to_string()).collect()
    }

    /// A classified intent of this kind with the given confidence.
    pub fn intent(&self, confidence: f64) -> Intent {
        Intent {
            name: self.name.to_string(),
            confidence,
            expected_params: self.param_names(),
            dispatch: self.dispatch,
            best_guess: None,
        }
    }
}

/// Ordered set of intents. Order breaks classifier ties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentCatalog {
    intents: Vec<IntentSpec>,
}

const CREATE: &[&str] = &[
    "create", "make", "add", "draw", "place", "insert", "build", "generate", "new",
];
const COORD: (f64, f64) = (-1000.0, 1000.0);
const EXTENT: (f64, f64) = (0.001, 1000.0);

fn placement(params: &mut Vec<ParamSpec>) {
    params.extend([
        ParamSpec::vector("center").range(COORD.0, COORD.1),
        ParamSpec::color("color"),
        ParamSpec::text("name"),
        ParamSpec::text("layer"),
        ParamSpec::text("material"),
    ]);
}

impl IntentCatalog {
    pub fn new(intents: Vec<IntentSpec>) -> Self {
        Self { intents }
    }

    /// The default CAD command set.
    pub fn cad() -> Self {
        let mut sphere = vec![ParamSpec::number("radius").required().range(EXTENT.0, EXTENT.1)];
        placement(&mut sphere);

        let mut boxed = vec![ParamSpec::vector("size").required().range(EXTENT.0, EXTENT.1)];
        placement(&mut boxed);

        let mut cylinder = vec![
            ParamSpec::number("radius").required().range(EXTENT.0, EXTENT.1),
            ParamSpec::number("height").required().range(EXTENT.0, EXTENT.1),
        ];
        placement(&mut cylinder);

        let target = || ParamSpec::reference("target").required();

        Self::new(vec![
            IntentSpec {
                name: "CreateSphere",
                dispatch: DispatchKind::Action,
                description: "Create a sphere",
                triggers: CREATE,
                subjects: &["sphere", "spheres", "ball", "balls", "orb"],
                subject_required: true,
                subject_only: 0.72,
                params: sphere,
            },
            IntentSpec {
                name: "CreateBox",
                dispatch: DispatchKind::Action,
                description: "Create a box",
                triggers: CREATE,
                subjects: &["box", "boxes", "cube", "cubes", "block", "blocks", "cuboid"],
                subject_required: true,
                subject_only: 0.72,
                params: boxed,
            },
            IntentSpec {
                name: "CreateCylinder",
                dispatch: DispatchKind::Action,
                description: "Create a cylinder",
                triggers: CREATE,
                subjects: &["cylinder", "cylinders", "tube", "rod", "pipe", "column"],
                subject_required: true,
                subject_only: 0.72,
                params: cylinder,
            },
            IntentSpec {
                name: "ArrayObjects",
                dispatch: DispatchKind::Action,
                description: "Copy objects into a rows x columns grid",
                triggers: &["array", "pattern", "arrange", "tile", "repeat"],
                subjects: &["grid", "copies", "rows", "columns"],
                subject_required: false,
                subject_only: 0.5,
                params: vec![
                    ParamSpec::reference("target"),
                    ParamSpec::grid("grid").required().range(1.0, 100.0),
                    ParamSpec::number("spacing").range(EXTENT.0, EXTENT.1),
                ],
            },
            IntentSpec {
                name: "MoveObject",
                dispatch: DispatchKind::Action,
                description: "Move objects by an offset",
                triggers: &["move", "translate", "shift", "nudge", "offset", "push", "slide"],
                subjects: &[],
                subject_required: false,
                subject_only: 0.0,
                params: vec![
                    target(),
                    ParamSpec::vector("translation").required().range(COORD.0, COORD.1),
                ],
            },
            IntentSpec {
                name: "ScaleObject",
                dispatch: DispatchKind::Action,
                description: "Scale objects by per-axis factors",
                triggers: &["scale", "resize", "enlarge", "shrink", "grow", "stretch"],
                subjects: &[],
                subject_required: false,
                subject_only: 0.0,
                params: vec![
                    target(),
                    ParamSpec::vector("scale").required().range(EXTENT.0, 100.0),
                ],
            },
            IntentSpec {
                name: "RotateObject",
                dispatch: DispatchKind::Action,
                description: "Rotate objects about their vertical axis",
                triggers: &["rotate", "turn", "spin", "twist"],
                subjects: &[],
                subject_required: false,
                subject_only: 0.0,
                params: vec![
                    target(),
                    ParamSpec::number("angle").required().range(-360.0, 360.0),
                ],
            },
            IntentSpec {
                name: "SetColor",
                dispatch: DispatchKind::Action,
                description: "Change object color",
                triggers: &["color", "colour", "paint", "recolor", "recolour", "tint"],
                subjects: crate::extract::COLOR_WORDS,
                subject_required: false,
                subject_only: 0.75,
                params: vec![target(), ParamSpec::color("color").required()],
            },
            IntentSpec {
                name: "SelectObjects",
                dispatch: DispatchKind::Action,
                description: "Select objects by reference, name, layer, or color",
                triggers: &["select", "pick", "highlight", "choose"],
                subjects: &["all", "everything"],
                subject_required: false,
                subject_only: 0.3,
                params: vec![
                    ParamSpec::reference("target"),
                    ParamSpec::text("name"),
                    ParamSpec::text("layer"),
                    ParamSpec::color("color"),
                ],
            },
            IntentSpec {
                name: "DeleteObject",
                dispatch: DispatchKind::Action,
                description: "Delete objects",
                triggers: &["delete", "remove", "erase", "destroy", "get rid of"],
                subjects: &[],
                subject_required: false,
                subject_only: 0.0,
                params: vec![target()],
            },
            IntentSpec {
                name: "BooleanUnion",
                dispatch: DispatchKind::Action,
                description: "Union of solids",
                triggers: &["union", "merge", "combine", "join", "fuse", "weld"],
                subjects: &[],
                subject_required: false,
                subject_only: 0.0,
                params: vec![target()],
            },
            IntentSpec {
                name: "BooleanDifference",
                dispatch: DispatchKind::Action,
                description: "Subtract solids",
                triggers: &["subtract", "difference", "cut", "minus", "carve"],
                subjects: &[],
                subject_required: false,
                subject_only: 0.0,
                params: vec![target()],
            },
            IntentSpec {
                name: "BooleanIntersection",
                dispatch: DispatchKind::Action,
                description: "Intersection of solids",
                triggers: &["intersect", "intersection", "overlap of", "common part"],
                subjects: &[],
                subject_required: false,
                subject_only: 0.0,
                params: vec![target()],
            },
            IntentSpec {
                name: "AnalyzeScene",
                dispatch: DispatchKind::Generative,
                description: "Describe or analyze the current scene",
                triggers: &[
                    "analyze", "analyse", "describe", "summarize", "summarise", "inspect",
                    "review", "overview of",
                ],
                subjects: &["scene", "model", "drawing", "design", "document"],
                subject_required: false,
                subject_only: 0.5,
                params: vec![],
            },
            IntentSpec {
                name: "AskQuestion",
                dispatch: DispatchKind::Generative,
                description: "Answer a modeling question",
                triggers: &[
                    "how do i", "how can i", "how to", "what is", "what are", "what does",
                    "why", "explain", "help me", "can you tell",
                ],
                subjects: &[],
                subject_required: false,
                subject_only: 0.0,
                params: vec![],
            },
        ])
    }

    pub fn get(&self, name: &str) -> Option<&IntentSpec> {
        self.intents.iter().find(|i| i.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IntentSpec> {
        self.intents.iter()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.intents.iter().map(|i| i.name).collect()
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}

impl Default for IntentCatalog {
    fn default() -> Self {
        Self::cad()
    }
}

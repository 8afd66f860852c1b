//! Parameter extraction from command text.
//!
//! Lexical scans (numbers, colors, naming/layer/material phrases, grid
//! tokens, spacing phrases, direction and placement words, referring tokens)
//! followed by a fixed assignment order over the requested parameter names:
//!
//! 1. vectors: `center`, `translation`, `size`, `scale`. `center` is the
//!    origin for "at the origin", a relative placement for "above it" and
//!    similar, otherwise three numbers
//! 2. `grid`
//! 3. `spacing`
//! 4. scalars (`radius`, `height`, `angle`, ...), keyword-anchored first
//! 5. `color`, `name`, `layer`, `material`
//! 6. `target` (a referring token, left unresolved)
//!
//! Every number is used at most once. Parameters without input are absent.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use nlc_protocol::{ParamValue, ParameterSet, Reference, Relation};

/// Canonical color vocabulary (`grey` is folded into `gray`).
pub const COLOR_WORDS: &[&str] = &[
    "red", "green", "blue", "yellow", "orange", "purple", "pink", "white", "black", "gray",
    "grey", "brown", "cyan", "magenta",
];

const VECTOR_PARAMS: &[&str] = &["center", "translation", "size", "scale"];

/// Scalar parameters and the words that anchor a number to them.
const SCALAR_PARAMS: &[(&str, &[&str])] = &[
    ("radius", &["radius"]),
    ("height", &["height", "tall", "high"]),
    ("angle", &["angle", "degrees", "degree", "deg"]),
    ("distance", &["distance"]),
    ("count", &["count", "copies", "times", "instances"]),
    ("thickness", &["thickness", "thick"]),
    ("width", &["width", "wide"]),
    ("depth", &["depth", "deep"]),
    ("length", &["length", "long"]),
];

const NUM: &str = r"-?(?:\d+(?:\.\d+)?|\.\d+)";

static RE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?|\.\d+").unwrap());

static RE_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b({})\b", COLOR_WORDS.join("|"))).unwrap()
});

static RE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:named|called|call\s+it)\s+(?:"([^"]+)"|'([^']+)'|([\w\-]+))"#).unwrap()
});

static RE_LAYER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bon\s+(?:the\s+)?layer\s+(?:"([^"]+)"|'([^']+)'|([\w\-]+))"#).unwrap()
});

static RE_MATERIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(?:made\s+(?:out\s+)?(?:of|from)|material)\s+(?:"([^"]+)"|'([^']+)'|([\w\-]+))"#,
    )
    .unwrap()
});

static RE_ORIGIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bat\s+(?:the\s+)?origin\b").unwrap());

static RE_PLACEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(on\s+top\s+of|above|over|below|beneath|underneath|under|next\s+to|beside|alongside)\b",
    )
    .unwrap()
});

static RE_GRID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d+)\s*[x×]\s*(\d+)\b").unwrap());

static RE_DIMENSION_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*[x×]\s*\d").unwrap());

static RE_SPACING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:spacing|gap|spaced)(?:\s+(?:of|at|by))?\s*[:=]?\s*({NUM})"
    ))
    .unwrap()
});

static RE_DIRECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(upwards|upward|up|downwards|downward|down|left|right|forwards|forward|backwards|backward|back)\b",
    )
    .unwrap()
});

static RE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(the last one|the previous one|the selected objects|the selection|it|that|this|them|those|these)\b",
    )
    .unwrap()
});

/// Words after which "that"/"this"/"these"/"those" open a relative clause
/// ("spheres that are red") rather than name an object.
const CLAUSE_VERBS: &[&str] = &[
    "is", "are", "was", "were", "has", "have", "had", "can", "could", "will", "would",
    "should", "do", "does", "did", "contain", "contains", "match", "matches", "look", "looks",
];

static RE_NEXT_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s+(\w+)").unwrap());

/// Per scalar: (name, "keyword 5" pattern, "5 units keyword" pattern).
static SCALAR_ANCHORS: LazyLock<Vec<(&'static str, Regex, Regex)>> = LazyLock::new(|| {
    SCALAR_PARAMS
        .iter()
        .map(|(name, words)| {
            let words = words.join("|");
            let after = Regex::new(&format!(
                r"(?i)\b(?:{words})\s*(?:of|is|=|:|to|by)?\s*({NUM})"
            ))
            .unwrap();
            let before = Regex::new(&format!(
                r"(?i)({NUM})\s*(?:units?|mm|cm|m)?\s*\b(?:{words})\b"
            ))
            .unwrap();
            (*name, after, before)
        })
        .collect()
});

/// Unit direction for a direction word. Z is up, Y is forward.
fn direction_vector(word: &str) -> Option<[f64; 3]> {
    let v = match word.to_lowercase().as_str() {
        "up" | "upward" | "upwards" => [0.0, 0.0, 1.0],
        "down" | "downward" | "downwards" => [0.0, 0.0, -1.0],
        "left" => [-1.0, 0.0, 0.0],
        "right" => [1.0, 0.0, 0.0],
        "forward" | "forwards" => [0.0, 1.0, 0.0],
        "back" | "backward" | "backwards" => [0.0, -1.0, 0.0],
        _ => return None,
    };
    Some(v)
}

fn relation(phrase: &str) -> Option<Relation> {
    let phrase = phrase.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    let relation = match phrase.as_str() {
        "on top of" | "above" | "over" => Relation::Above,
        "below" | "beneath" | "underneath" | "under" => Relation::Below,
        "next to" | "beside" | "alongside" => Relation::NextTo,
        _ => return None,
    };
    Some(relation)
}

/// Whether the demonstrative at `m` introduces a clause instead of naming
/// an object, judged by the word that follows it.
fn opens_clause(text: &str, m: &regex::Match<'_>) -> bool {
    if !matches!(
        m.as_str().to_lowercase().as_str(),
        "that" | "this" | "these" | "those"
    ) {
        return false;
    }
    RE_NEXT_WORD
        .captures(&text[m.end()..])
        .and_then(|caps| caps.get(1))
        .is_some_and(|w| CLAUSE_VERBS.contains(&w.as_str().to_lowercase().as_str()))
}

fn canonical_color(word: &str) -> String {
    match word.to_lowercase().as_str() {
        "grey" => "gray".to_string(),
        other => other.to_string(),
    }
}

/// Value of a quoted-or-bare phrase capture (groups 1..=3).
fn phrase_value(caps: &regex::Captures<'_>) -> Option<(String, Range<usize>)> {
    (1..=3)
        .filter_map(|i| caps.get(i))
        .next()
        .map(|m| (m.as_str().trim().to_string(), m.range()))
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

#[derive(Debug)]
struct Num {
    value: f64,
    /// Byte offset of the number, including a leading minus sign.
    start: usize,
    used: bool,
}

/// The numbers found in the text, in order, each consumable once.
#[derive(Debug)]
struct NumberPool {
    nums: Vec<Num>,
}

impl NumberPool {
    /// Scan `text`, skipping digits glued to identifiers (`layer2`) but
    /// keeping those inside dimension tokens (`2x3`), and anything inside
    /// an `excluded` span. A bare leading dot (`.5`) is a decimal.
    fn scan(text: &str, excluded: &[Range<usize>]) -> Self {
        let mut nums = Vec::new();
        for m in RE_NUMBER.find_iter(text) {
            let mut start = m.start();
            let mut negative = false;
            let mut before = text[..start].chars().rev();
            match before.next() {
                Some('-') => {
                    if !before.next().is_some_and(char::is_alphanumeric) {
                        negative = true;
                        start -= 1;
                    }
                }
                Some(c) if c.is_alphabetic() || c == '_' => {
                    let dimension =
                        matches!(c, 'x' | 'X' | '×') && before.next().is_some_and(|d| d.is_ascii_digit());
                    if !dimension {
                        continue;
                    }
                }
                // "1.2.3" style trailing fragments
                Some(c) if c == '.' || c.is_ascii_digit() => continue,
                _ => {}
            }
            if excluded.iter().any(|r| r.contains(&m.start())) {
                continue;
            }
            let Ok(value) = m.as_str().parse::<f64>() else {
                continue;
            };
            nums.push(Num {
                value: if negative { -value } else { value },
                start,
                used: false,
            });
        }
        Self { nums }
    }

    fn unused(&self) -> usize {
        self.nums.iter().filter(|n| !n.used).count()
    }

    fn take_next(&mut self) -> Option<f64> {
        let n = self.nums.iter_mut().find(|n| !n.used)?;
        n.used = true;
        Some(n.value)
    }

    /// Consume the unused number starting at byte `start`.
    fn take_at(&mut self, start: usize) -> Option<f64> {
        let n = self.nums.iter_mut().find(|n| n.start == start && !n.used)?;
        n.used = true;
        Some(n.value)
    }

    fn is_unused_at(&self, start: usize) -> bool {
        self.nums.iter().any(|n| n.start == start && !n.used)
    }

    fn take_three(&mut self) -> Option<[f64; 3]> {
        if self.unused() < 3 {
            return None;
        }
        Some([self.take_next()?, self.take_next()?, self.take_next()?])
    }
}

/// Deterministic, side-effect-free parameter extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterExtractor;

impl ParameterExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract values for the `expected` parameter names from `text`.
    pub fn extract<S: AsRef<str>>(&self, text: &str, expected: &[S]) -> ParameterSet {
        let wants = |name: &str| expected.iter().any(|e| e.as_ref() == name);
        let mut params = ParameterSet::new();

        let name_phrase = RE_NAME.captures(text);
        let name_span = name_phrase.as_ref().and_then(|c| c.get(0)).map(|m| m.range());
        let layer_phrase = RE_LAYER.captures(text);
        let material_phrase = RE_MATERIAL.captures(text);
        let material_span = material_phrase.as_ref().and_then(|c| c.get(0)).map(|m| m.range());
        // Spans whose words belong to a phrase value, not to other slots.
        let quoted = |r: &Range<usize>| {
            name_span.as_ref().is_some_and(|s| overlaps(s, r))
                || material_span.as_ref().is_some_and(|s| overlaps(s, r))
        };

        let excluded: Vec<Range<usize>> = [
            name_phrase.as_ref(),
            layer_phrase.as_ref(),
            material_phrase.as_ref(),
        ]
        .into_iter()
            .flatten()
            .filter_map(phrase_value)
            .map(|(_, range)| range)
            .collect();
        let mut pool = NumberPool::scan(text, &excluded);

        // 1. vectors
        for &name in VECTOR_PARAMS {
            if !wants(name) {
                continue;
            }
            if name == "center" {
                if RE_ORIGIN.find_iter(text).any(|m| !quoted(&m.range())) {
                    params.insert(name, ParamValue::Vector([0.0, 0.0, 0.0]));
                    continue;
                }
                let placed = RE_PLACEMENT
                    .find_iter(text)
                    .filter(|m| !quoted(&m.range()))
                    .find_map(|m| relation(m.as_str()));
                if let Some(relation) = placed {
                    params.insert(name, ParamValue::Placement(relation));
                    continue;
                }
            }
            let value = pool.take_three().or_else(|| match name {
                "size" | "scale" => pool.take_next().map(|n| [n, n, n]),
                "translation" => RE_DIRECTION
                    .find(text)
                    .and_then(|m| direction_vector(m.as_str()))
                    .and_then(|dir| {
                        let n = pool.take_next()?;
                        Some([dir[0] * n, dir[1] * n, dir[2] * n])
                    }),
                _ => None,
            });
            if let Some(v) = value {
                // + 0.0 turns -0.0 from direction scaling into 0.0
                params.insert(name, ParamValue::Vector(v.map(|c| c + 0.0)));
            }
        }

        // 2. grid
        if wants("grid") {
            for caps in RE_GRID.captures_iter(text) {
                let (Some(whole), Some(r), Some(c)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                    continue;
                };
                if RE_DIMENSION_TAIL.is_match(&text[whole.end()..]) {
                    continue;
                }
                let (Ok(rows), Ok(cols)) = (r.as_str().parse::<u32>(), c.as_str().parse::<u32>())
                else {
                    continue;
                };
                if pool.is_unused_at(r.start()) && pool.is_unused_at(c.start()) {
                    pool.take_at(r.start());
                    pool.take_at(c.start());
                    params.insert("grid", ParamValue::Grid { rows, cols });
                    break;
                }
            }
        }

        // 3. spacing
        if wants("spacing") {
            let spacing = RE_SPACING
                .captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .find_map(|m| pool.take_at(m.start()));
            if let Some(n) = spacing {
                params.insert("spacing", ParamValue::Number(n));
            }
        }

        // 4. scalars: anchored numbers for every scalar first, then fill the
        // rest from the remaining pool in order
        let scalars: Vec<&(&str, Regex, Regex)> =
            SCALAR_ANCHORS.iter().filter(|(name, _, _)| wants(name)).collect();
        for (name, after, before) in &scalars {
            let anchored = after
                .captures_iter(text)
                .chain(before.captures_iter(text))
                .filter_map(|caps| caps.get(1))
                .find_map(|m| pool.take_at(m.start()));
            if let Some(n) = anchored {
                params.insert(*name, ParamValue::Number(n));
            }
        }
        for (name, _, _) in &scalars {
            if params.contains(name) {
                continue;
            }
            if let Some(n) = pool.take_next() {
                params.insert(*name, ParamValue::Number(n));
            }
        }

        // 5. color, name, layer, material
        if wants("color") {
            let color = RE_COLOR.find_iter(text).find(|m| !quoted(&m.range()));
            if let Some(m) = color {
                params.insert("color", ParamValue::Color(canonical_color(m.as_str())));
            }
        }
        if wants("name")
            && let Some((value, _)) = name_phrase.as_ref().and_then(phrase_value)
        {
            params.insert("name", ParamValue::Text(value));
        }
        if wants("layer")
            && let Some((value, _)) = layer_phrase.as_ref().and_then(phrase_value)
        {
            params.insert("layer", ParamValue::Text(value));
        }
        if wants("material")
            && let Some((value, _)) = material_phrase.as_ref().and_then(phrase_value)
        {
            params.insert("material", ParamValue::Text(value.to_lowercase()));
        }

        // 6. reference
        if wants("target") {
            let token = RE_REFERENCE
                .find_iter(text)
                .find(|m| !quoted(&m.range()) && !opens_clause(text, m));
            if let Some(m) = token {
                params.insert(
                    "target",
                    ParamValue::Reference(Reference::unresolved(m.as_str().to_lowercase())),
                );
            }
        }

        params
    }
}

//! Response parsing: recover `{relevant, irrelevant}` from a model reply.
//!
//! Models are told to answer with a bare JSON object but routinely wrap it
//! in code fences, surround it with prose, leave trailing commas, or ignore
//! the format altogether. Parsing is therefore an ordered fallback chain,
//! written as an explicit state machine so the order and the termination
//! condition can be tested stage by stage:
//!
//! ```text
//! Raw ──▶ FenceStripped ──▶ JsonCandidate ──▶ Parsed
//!               │                 │
//!               └──── no braces ──┴── decode error ──▶ Heuristic ──▶ Parsed | Empty
//! ```
//!
//! Every path ends in `Parsed` or `Empty`; [`parse_response`] never fails.

use crate::report::{ClassificationSet, MedicineEntry};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// One state of the parsing chain.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseStage<'a> {
    /// The reply as received.
    Raw(&'a str),
    /// Reply with an outer code fence removed (if there was one).
    FenceStripped(&'a str),
    /// The `{ … }` region of `text`, about to be decoded.
    JsonCandidate { text: &'a str, candidate: &'a str },
    /// No usable JSON; look for "Relevant:" / "Irrelevant:" sections.
    Heuristic(&'a str),
    /// Terminal: entries recovered (possibly none, when the JSON said so).
    Parsed(ClassificationSet),
    /// Terminal: nothing recoverable.
    Empty,
}

/// Stage names, for tracing the path a reply took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Raw,
    FenceStripped,
    JsonCandidate,
    Heuristic,
    Parsed,
    Empty,
}

impl<'a> ParseStage<'a> {
    pub fn kind(&self) -> StageKind {
        match self {
            ParseStage::Raw(_) => StageKind::Raw,
            ParseStage::FenceStripped(_) => StageKind::FenceStripped,
            ParseStage::JsonCandidate { .. } => StageKind::JsonCandidate,
            ParseStage::Heuristic(_) => StageKind::Heuristic,
            ParseStage::Parsed(_) => StageKind::Parsed,
            ParseStage::Empty => StageKind::Empty,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ParseStage::Parsed(_) | ParseStage::Empty)
    }

    /// Advance one transition. Terminal stages return themselves.
    pub fn step(self) -> ParseStage<'a> {
        match self {
            ParseStage::Raw(raw) => ParseStage::FenceStripped(strip_fences(raw)),
            ParseStage::FenceStripped(text) => match isolate_json(text) {
                Some(candidate) => ParseStage::JsonCandidate { text, candidate },
                None => ParseStage::Heuristic(text),
            },
            ParseStage::JsonCandidate { text, candidate } => match decode_lenient(candidate) {
                Some(set) => ParseStage::Parsed(set),
                None => ParseStage::Heuristic(text),
            },
            ParseStage::Heuristic(text) => {
                let set = split_sections(text);
                if set.is_empty() {
                    ParseStage::Empty
                } else {
                    ParseStage::Parsed(set)
                }
            }
            terminal => terminal,
        }
    }

    fn into_set(self) -> ClassificationSet {
        match self {
            ParseStage::Parsed(set) => set,
            _ => ClassificationSet::new(),
        }
    }
}

/// Parse a model reply into a classification set. Never fails.
pub fn parse_response(raw: &str) -> ClassificationSet {
    parse_with_trace(raw).0
}

/// Like [`parse_response`], also returning the stages visited.
pub fn parse_with_trace(raw: &str) -> (ClassificationSet, Vec<StageKind>) {
    let mut stage = ParseStage::Raw(raw);
    let mut trace = vec![stage.kind()];
    while !stage.is_terminal() {
        stage = stage.step();
        trace.push(stage.kind());
    }
    (stage.into_set(), trace)
}

// ── Stage 1: fence stripping ─────────────────────────────────────────────

static RE_OPEN_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```[\w-]*[ \t]*\r?\n?").unwrap());
static RE_CLOSE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n?```\s*$").unwrap());

/// Remove one opening fence line (with optional language tag) and one
/// closing fence. Text that does not start with a fence is only trimmed.
pub fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    if !text.starts_with("```") {
        return text;
    }
    let body = match RE_OPEN_FENCE.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    };
    let body = match RE_CLOSE_FENCE.find(body) {
        Some(m) => &body[..m.start()],
        None => body,
    };
    body.trim()
}

// ── Stage 2: brace isolation ─────────────────────────────────────────────

/// The region from the first `{` to the last `}`, if both exist in order.
pub fn isolate_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

// ── Stage 3: lenient decode ──────────────────────────────────────────────

static RE_TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*[}\]])").unwrap());

/// Drop commas that directly precede a closing `}` or `]`.
pub fn remove_trailing_commas(json: &str) -> String {
    RE_TRAILING_COMMA.replace_all(json, "$1").into_owned()
}

fn decode_lenient(candidate: &str) -> Option<ClassificationSet> {
    let cleaned = remove_trailing_commas(candidate);
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(value @ Value::Object(_)) => Some(classification_from_value(&value)),
        _ => None,
    }
}

/// Build a set from a decoded `{relevant: [...], irrelevant: [...]}` object.
///
/// Absent keys and non-array values count as empty lists.
pub fn classification_from_value(value: &Value) -> ClassificationSet {
    ClassificationSet::from_entries(
        normalize_entries(category_values(value, "relevant")),
        normalize_entries(category_values(value, "irrelevant")),
    )
}

fn category_values<'v>(value: &'v Value, key: &str) -> &'v [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Normalize candidate entries, silently dropping malformed ones.
///
/// - object with a non-blank string `name` → kept (`explanation` defaults to "")
/// - bare string → trimmed name, empty explanation
/// - anything else → dropped
pub fn normalize_entries(values: &[Value]) -> Vec<MedicineEntry> {
    values.iter().filter_map(normalize_entry).collect()
}

fn normalize_entry(value: &Value) -> Option<MedicineEntry> {
    match value {
        Value::Object(map) => {
            let name = map.get("name")?.as_str()?;
            let explanation = map
                .get("explanation")
                .and_then(Value::as_str)
                .unwrap_or("");
            MedicineEntry::new(name, explanation)
        }
        Value::String(s) => MedicineEntry::new(s.trim(), ""),
        _ => None,
    }
}

// ── Stage 4: heuristic section split ─────────────────────────────────────

static RE_RELEVANT_SECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\brelevant[^:\n]*[:\n](.+?)(?:\n\s*irrelevant|\z)").unwrap()
});
static RE_IRRELEVANT_SECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\birrelevant[^:\n]*[:\n](.+?)(?:\n\s*relevant|\z)").unwrap()
});

fn split_sections(text: &str) -> ClassificationSet {
    ClassificationSet::from_entries(
        section_entries(&RE_RELEVANT_SECTION, text),
        section_entries(&RE_IRRELEVANT_SECTION, text),
    )
}

fn section_entries(re: &Regex, text: &str) -> Vec<MedicineEntry> {
    let Some(caps) = re.captures(text) else {
        return Vec::new();
    };
    caps.get(1)
        .map(|m| m.as_str())
        .unwrap_or("")
        .lines()
        .map(strip_bullet)
        .filter_map(|line| MedicineEntry::new(line, ""))
        .collect()
}

fn strip_bullet(line: &str) -> &str {
    line.trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '*' | '•'))
}

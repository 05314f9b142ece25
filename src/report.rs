//! Report data model: medicine entries, classification sets, per-chunk
//! results and the final aggregated report.
//!
//! Everything here is created fresh for one analysis and is only ever
//! appended to, never edited in place. The types serialise to the JSON shape
//! consumed downstream (`relevant` / `irrelevant` / `results` / `summary`).

use crate::error::ChunkError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// ── MedicineEntry ────────────────────────────────────────────────────────

/// One classified medicine. The name is never blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEntry")]
pub struct MedicineEntry {
    name: String,
    explanation: String,
}

#[derive(Deserialize)]
struct RawEntry {
    name: String,
    #[serde(default)]
    explanation: String,
}

impl TryFrom<RawEntry> for MedicineEntry {
    type Error = &'static str;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        MedicineEntry::new(raw.name, raw.explanation).ok_or("medicine name must not be blank")
    }
}

impl MedicineEntry {
    /// Build an entry, or `None` when `name` is blank.
    ///
    /// The name is kept exactly as received (no trimming, no case folding);
    /// identity is case-sensitive.
    pub fn new(name: impl Into<String>, explanation: impl Into<String>) -> Option<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return None;
        }
        Some(Self {
            name,
            explanation: explanation.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }
}

// ── EntryMap ─────────────────────────────────────────────────────────────

/// Insertion-ordered map from medicine name to entry, first write wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMap {
    entries: Vec<MedicineEntry>,
    index: HashMap<String, usize>,
}

impl EntryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry` unless its name is already present.
    ///
    /// Returns `true` if the entry was stored.
    pub fn insert(&mut self, entry: MedicineEntry) -> bool {
        if self.index.contains_key(entry.name()) {
            return false;
        }
        self.index.insert(entry.name.clone(), self.entries.len());
        self.entries.push(entry);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&MedicineEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[MedicineEntry] {
        &self.entries
    }

    /// Entries sorted by name, case-insensitive ascending.
    ///
    /// The sort is stable: names that compare equal ignoring case keep the
    /// order in which they were first seen.
    pub fn into_sorted(self) -> Vec<MedicineEntry> {
        let mut entries = self.entries;
        entries.sort_by_cached_key(|e| e.name.to_lowercase());
        entries
    }
}

// ── ClassificationSet ────────────────────────────────────────────────────

/// Which side of the classification an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Relevant,
    Irrelevant,
}

/// The relevant/irrelevant verdicts extracted from one model reply.
///
/// A name lives in at most one of the two categories: once a name is
/// relevant, a later irrelevant entry with the same name is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationSet {
    relevant: EntryMap,
    irrelevant: EntryMap,
}

impl ClassificationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from already-normalized entry lists.
    pub fn from_entries(
        relevant: impl IntoIterator<Item = MedicineEntry>,
        irrelevant: impl IntoIterator<Item = MedicineEntry>,
    ) -> Self {
        let mut set = Self::new();
        for entry in relevant {
            set.insert(Category::Relevant, entry);
        }
        for entry in irrelevant {
            set.insert(Category::Irrelevant, entry);
        }
        set
    }

    /// Returns `true` if the entry was stored.
    pub fn insert(&mut self, category: Category, entry: MedicineEntry) -> bool {
        match category {
            Category::Relevant => {
                if self.irrelevant.contains(entry.name()) {
                    return false;
                }
                self.relevant.insert(entry)
            }
            Category::Irrelevant => {
                if self.relevant.contains(entry.name()) {
                    return false;
                }
                self.irrelevant.insert(entry)
            }
        }
    }

    pub fn relevant(&self) -> &[MedicineEntry] {
        self.relevant.entries()
    }

    pub fn irrelevant(&self) -> &[MedicineEntry] {
        self.irrelevant.entries()
    }

    pub fn is_empty(&self) -> bool {
        self.relevant.is_empty() && self.irrelevant.is_empty()
    }
}

// ── Per-chunk results ────────────────────────────────────────────────────

/// Token accounting reported by the gateway for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(rename = "in")]
    pub input: u64,
    #[serde(rename = "out")]
    pub output: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self { input, output }
    }
}

/// Outcome of one chunk, in the order chunks were processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    /// 1-based chunk position.
    #[serde(rename = "idx")]
    pub index: usize,

    /// Wall-clock time of the gateway call, serialised as seconds.
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,

    pub usage: TokenUsage,

    pub relevant: Vec<MedicineEntry>,

    pub irrelevant: Vec<MedicineEntry>,

    /// Status code reported by the gateway (0 when the transport failed
    /// before any status was received).
    pub status: u16,

    /// Failure detail; `None` for successful chunks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ChunkError>,
}

impl ChunkResult {
    pub fn success(
        index: usize,
        elapsed: Duration,
        usage: TokenUsage,
        classification: &ClassificationSet,
        status: u16,
    ) -> Self {
        Self {
            index,
            elapsed,
            usage,
            relevant: classification.relevant().to_vec(),
            irrelevant: classification.irrelevant().to_vec(),
            status,
            error: None,
        }
    }

    /// A failed call contributes nothing: no entries, zero usage.
    pub fn failure(index: usize, elapsed: Duration, status: u16, error: ChunkError) -> Self {
        Self {
            index,
            elapsed,
            usage: TokenUsage::default(),
            relevant: Vec::new(),
            irrelevant: Vec::new(),
            status,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

// ── Report ───────────────────────────────────────────────────────────────

/// Run-level counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of chunks sent to the gateway.
    pub calls: usize,
    /// Sum of input tokens over successful calls.
    pub tokens_in: u64,
    /// Sum of output tokens over successful calls.
    pub tokens_out: u64,
    /// Number of chunks whose gateway call failed.
    #[serde(default)]
    pub failed_calls: usize,
    /// Total wall-clock time of the analysis.
    #[serde(default)]
    pub duration_ms: u64,
}

/// The aggregated result of one document analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Deduplicated relevant medicines, sorted case-insensitively by name.
    pub relevant: Vec<MedicineEntry>,
    /// Deduplicated irrelevant medicines, sorted case-insensitively by name.
    pub irrelevant: Vec<MedicineEntry>,
    /// Per-chunk outcomes in processing order.
    pub results: Vec<ChunkResult>,
    pub summary: Summary,
}

impl Report {
    /// Results of chunks whose gateway call failed.
    pub fn failed_chunks(&self) -> impl Iterator<Item = &ChunkResult> {
        self.results.iter().filter(|r| !r.is_ok())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

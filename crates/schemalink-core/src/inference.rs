//! Relationship inference: propose `inferred` edges that the catalog never declared.
//!
//! The pipeline is split in three steps so that sampling (which needs I/O) can run
//! between them:
//!
//! 1. [`propose_candidates`] pairs columns across distinct tables whose types share a
//!    family and whose names match (exact stem, `<singular table>_id` convention, or
//!    fuzzy similarity).
//! 2. [`score_candidates`] combines name, type and optional sampled overlap into a
//!    confidence and ranks the result deterministically.
//! 3. [`infer`] filters the ranking and folds the survivors into the graph.
//!
//! All tunables live in [`InferenceConfig`].

use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::graph::{Cardinality, EdgeKind, RelationshipEdge, SchemaGraph};
use crate::schema::{Column, ColumnRef, Table};
use crate::types::TypeFamily;

/// Relative weight of each scoring component. Scores are clipped to [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ScoringWeights {
    pub name: f64,
    pub type_match: f64,
    pub sampling: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            name: 0.6,
            type_match: 0.25,
            sampling: 0.15,
        }
    }
}

/// Name-match strength per match kind; fuzzy matches scale their similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct NameStrengths {
    pub exact: f64,
    pub convention: f64,
    pub fuzzy_scale: f64,
}

impl Default for NameStrengths {
    fn default() -> Self {
        Self {
            exact: 1.0,
            convention: 0.9,
            fuzzy_scale: 0.6,
        }
    }
}

/// Type compatibility strength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TypeStrengths {
    pub same_type: f64,
    pub same_family: f64,
}

impl Default for TypeStrengths {
    fn default() -> Self {
        Self {
            same_type: 1.0,
            same_family: 0.6,
        }
    }
}

/// Tunable inference policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct InferenceConfig {
    pub enabled: bool,
    pub weights: ScoringWeights,
    pub name_strengths: NameStrengths,
    pub type_strengths: TypeStrengths,
    /// Candidates scoring below this are discarded.
    pub min_confidence: f64,
    pub fuzzy_matching: bool,
    /// Minimum Jaro-Winkler similarity for a fuzzy match.
    pub fuzzy_threshold: f64,
    /// Minimum token Jaccard overlap for a fuzzy match.
    pub min_token_overlap: f64,
    /// Suffixes stripped from column names before comparing, longest first.
    pub suffixes: Vec<String>,
    /// Only propose edges whose target column looks like a key of its table.
    pub require_key_target: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weights: ScoringWeights::default(),
            name_strengths: NameStrengths::default(),
            type_strengths: TypeStrengths::default(),
            min_confidence: 0.5,
            fuzzy_matching: true,
            fuzzy_threshold: 0.85,
            min_token_overlap: 0.5,
            suffixes: vec!["_id".to_string(), "id".to_string(), "_key".to_string()],
            require_key_target: true,
        }
    }
}

/// How two column names matched, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NameMatch {
    Exact,
    Convention,
    Fuzzy,
}

/// A column pair that passed name and type matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub source: ColumnRef,
    pub target: ColumnRef,
    pub name_match: NameMatch,
    /// Similarity in [0, 1]; 1.0 for exact and convention matches.
    pub similarity: f64,
    pub name_strength: f64,
    pub type_strength: f64,
    /// Target column is the sole primary key of its table.
    pub target_is_primary_key: bool,
    /// Target column looks like a key of its table (primary key or id-named).
    pub target_is_key_like: bool,
}

/// A candidate with its final confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f64,
    /// Fraction of sampled source values found on the target side, when sampled.
    pub overlap: Option<f64>,
    pub cardinality: Cardinality,
}

impl ScoredCandidate {
    fn lexical_key(&self) -> (String, &str, String, &str) {
        (
            self.candidate.source.table.key(),
            self.candidate.source.column.key.as_str(),
            self.candidate.target.table.key(),
            self.candidate.target.column.key.as_str(),
        )
    }

    fn to_edge(&self) -> RelationshipEdge {
        RelationshipEdge {
            name: None,
            source: self.candidate.source.table.clone(),
            source_columns: vec![self.candidate.source.column.clone()],
            target: self.candidate.target.table.clone(),
            target_columns: vec![self.candidate.target.column.clone()],
            kind: EdgeKind::Inferred,
            confidence: self.score,
            cardinality: self.cardinality,
        }
    }
}

/// Sampled column values keyed by column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    samples: BTreeMap<ColumnRef, Vec<String>>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: ColumnRef, values: Vec<String>) {
        self.samples.insert(column, values);
    }

    pub fn get(&self, column: &ColumnRef) -> Option<&[String]> {
        self.samples.get(column).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Counters describing one inference run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InferenceStats {
    pub candidates: usize,
    pub sampled: usize,
    pub below_threshold: usize,
    pub shadowed_by_declared: usize,
    pub mirrored: usize,
    pub superseded: usize,
    pub accepted: usize,
}

/// The enriched graph and what happened while enriching it.
#[derive(Debug, Clone)]
pub struct InferenceOutput {
    pub graph: SchemaGraph,
    pub stats: InferenceStats,
}

/// Generate name/type-matched candidates over every column pair of distinct tables.
///
/// The result is sorted by `(source, target)` so it does not depend on map iteration
/// order.
pub fn propose_candidates(graph: &SchemaGraph, config: &InferenceConfig) -> Vec<Candidate> {
    let mut suffixes = config.suffixes.clone();
    suffixes.sort_by(|left, right| right.len().cmp(&left.len()).then_with(|| left.cmp(right)));

    let tables: Vec<&Table> = graph.tables().collect();
    let mut candidates = Vec::new();

    for source_table in &tables {
        for target_table in &tables {
            if source_table.name == target_table.name {
                continue;
            }
            for source in &source_table.columns {
                for target in &target_table.columns {
                    if let Some(candidate) =
                        match_columns(source_table, source, target_table, target, config, &suffixes)
                    {
                        candidates.push(candidate);
                    }
                }
            }
        }
    }

    candidates.sort_by(|left, right| {
        left.source
            .cmp(&right.source)
            .then_with(|| left.target.cmp(&right.target))
    });
    candidates
}

fn match_columns(
    source_table: &Table,
    source: &Column,
    target_table: &Table,
    target: &Column,
    config: &InferenceConfig,
    suffixes: &[String],
) -> Option<Candidate> {
    let type_strength = type_strength(source, target, config)?;

    let target_is_primary_key = target_table.is_sole_primary_key(&target.name);
    let target_is_key_like = is_key_like(target_table, target, suffixes);
    if config.require_key_target && !target_is_key_like {
        return None;
    }

    let source_stem = stem(&source.name.key, suffixes);
    if source_stem.is_empty() {
        return None;
    }
    let target_stem = stem(&target.name.key, suffixes);
    let target_entity = singular(&target_table.name.name.key);

    let (name_match, similarity) = if !target_stem.is_empty() && source_stem == target_stem {
        (NameMatch::Exact, 1.0)
    } else if target_is_key_like
        && (source_stem == target_entity || source_stem == target_table.name.name.key)
    {
        (NameMatch::Convention, 1.0)
    } else if config.fuzzy_matching {
        let mut references = vec![target_entity.as_str()];
        if !target_stem.is_empty() {
            references.push(target_stem);
        }
        let similarity = references
            .iter()
            .filter_map(|reference| fuzzy_similarity(source_stem, reference, config))
            .fold(None, |best: Option<f64>, value| Some(best.map_or(value, |b| b.max(value))))?;
        (NameMatch::Fuzzy, similarity)
    } else {
        return None;
    };

    let name_strength = match name_match {
        NameMatch::Exact => config.name_strengths.exact,
        NameMatch::Convention => config.name_strengths.convention,
        NameMatch::Fuzzy => config.name_strengths.fuzzy_scale * similarity,
    };

    Some(Candidate {
        source: ColumnRef::new(source_table.name.clone(), source.name.clone()),
        target: ColumnRef::new(target_table.name.clone(), target.name.clone()),
        name_match,
        similarity,
        name_strength,
        type_strength,
        target_is_primary_key,
        target_is_key_like,
    })
}

fn type_strength(source: &Column, target: &Column, config: &InferenceConfig) -> Option<f64> {
    let family = source.data_type.family();
    if family == TypeFamily::Unknown || family != target.data_type.family() {
        return None;
    }
    if source.data_type == target.data_type {
        Some(config.type_strengths.same_type)
    } else {
        Some(config.type_strengths.same_family)
    }
}

// A key-like column is the table's sole primary key or, for tables without a declared
// key, a column named `id` or `<singular table>_id`.
fn is_key_like(table: &Table, column: &Column, suffixes: &[String]) -> bool {
    if !table.primary_key.is_empty() {
        return table.is_sole_primary_key(&column.name);
    }
    let key = column.name.key.as_str();
    if suffixes.iter().any(|suffix| suffix.trim_start_matches('_') == key) {
        return true;
    }
    let column_stem = stem(key, suffixes);
    column_stem != key && column_stem == singular(&table.name.name.key)
}

/// Strip the first (longest) matching suffix and any trailing underscores.
fn stem<'a>(name: &'a str, suffixes: &[String]) -> &'a str {
    for suffix in suffixes {
        if let Some(stripped) = name.strip_suffix(suffix.as_str()) {
            return stripped.trim_end_matches('_');
        }
    }
    name
}

/// Naive English singular form used to match `customers` with `customer_id`.
pub fn singular(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{stem}y");
        }
    }
    for suffix in ["sses", "shes", "ches", "xes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.len() > 1 && word.ends_with('s') && !word.ends_with("ss") {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

fn fuzzy_similarity(left: &str, right: &str, config: &InferenceConfig) -> Option<f64> {
    let jaro = strsim::jaro_winkler(left, right);
    let overlap = token_overlap(left, right);
    if jaro >= config.fuzzy_threshold || overlap >= config.min_token_overlap {
        Some(jaro.max(overlap))
    } else {
        None
    }
}

fn token_overlap(left: &str, right: &str) -> f64 {
    let left: BTreeSet<&str> = left.split('_').filter(|token| !token.is_empty()).collect();
    let right: BTreeSet<&str> = right.split('_').filter(|token| !token.is_empty()).collect();
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

/// Every column a candidate would like samples for, sorted and de-duplicated.
pub fn sampling_requests(candidates: &[Candidate]) -> Vec<ColumnRef> {
    let columns: BTreeSet<&ColumnRef> = candidates
        .iter()
        .flat_map(|candidate| [&candidate.source, &candidate.target])
        .collect();
    columns.into_iter().cloned().collect()
}

/// Score candidates and rank them: score descending, then source table, source
/// column, target table and target column in lexical order.
///
/// Without samples (or when either side of a candidate was not sampled) the sampling
/// component contributes nothing.
pub fn score_candidates(
    candidates: Vec<Candidate>,
    config: &InferenceConfig,
    samples: Option<&SampleSet>,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|candidate| {
            let evidence = samples.and_then(|samples| sample_evidence(&candidate, samples));
            let overlap = evidence.map(|(overlap, _)| overlap);

            let weights = &config.weights;
            let raw = weights.name * candidate.name_strength
                + weights.type_match * candidate.type_strength
                + overlap.map_or(0.0, |overlap| weights.sampling * overlap);

            let cardinality = match evidence {
                Some((_, true)) => Cardinality::ManyToMany,
                Some((_, false)) => Cardinality::OneToMany,
                None if candidate.target_is_primary_key => Cardinality::OneToMany,
                None => Cardinality::Unknown,
            };

            ScoredCandidate {
                candidate,
                score: round_score(raw),
                overlap,
                cardinality,
            }
        })
        .collect();

    scored.sort_by(|left, right| {
        right
            .score
            .total_cmp(&left.score)
            .then_with(|| left.lexical_key().cmp(&right.lexical_key()))
    });
    scored
}

// Returns (overlap ratio, target sample has duplicates); empty samples are no evidence.
fn sample_evidence(candidate: &Candidate, samples: &SampleSet) -> Option<(f64, bool)> {
    let source = samples.get(&candidate.source)?;
    let target = samples.get(&candidate.target)?;

    if source.is_empty() || target.is_empty() {
        return None;
    }

    let source_values: BTreeSet<&str> = source.iter().map(String::as_str).collect();
    let target_values: BTreeSet<&str> = target.iter().map(String::as_str).collect();
    let found = source_values
        .iter()
        .filter(|value| target_values.contains(*value))
        .count();

    Some((
        found as f64 / source_values.len() as f64,
        target_values.len() < target.len(),
    ))
}

fn round_score(raw: f64) -> f64 {
    (raw.clamp(0.0, 1.0) * 1_000_000.0).round() / 1_000_000.0
}

/// Enrich `graph` with inferred edges.
///
/// Candidates below `min_confidence`, candidates that duplicate a declared edge and the
/// weaker direction of mirrored pairs are discarded. For each source column only the
/// best-scoring candidates survive; ties are all kept. Declared edges are untouched.
pub fn infer(
    graph: SchemaGraph,
    config: &InferenceConfig,
    samples: Option<&SampleSet>,
) -> InferenceOutput {
    if !config.enabled {
        return InferenceOutput {
            graph,
            stats: InferenceStats::default(),
        };
    }

    let candidates = propose_candidates(&graph, config);
    let mut stats = InferenceStats {
        candidates: candidates.len(),
        sampled: samples.map_or(0, SampleSet::len),
        ..InferenceStats::default()
    };

    let ranked = score_candidates(candidates, config, samples);
    let accepted = filter_ranked(&graph, ranked, config, &mut stats);
    stats.accepted = accepted.len();

    tracing::debug!(
        event = "inference_finished",
        candidates = stats.candidates,
        sampled = stats.sampled,
        below_threshold = stats.below_threshold,
        shadowed = stats.shadowed_by_declared,
        mirrored = stats.mirrored,
        superseded = stats.superseded,
        accepted = stats.accepted
    );

    let edges = accepted.iter().map(ScoredCandidate::to_edge).collect();
    InferenceOutput {
        graph: graph.with_edges(edges),
        stats,
    }
}

fn filter_ranked(
    graph: &SchemaGraph,
    ranked: Vec<ScoredCandidate>,
    config: &InferenceConfig,
    stats: &mut InferenceStats,
) -> Vec<ScoredCandidate> {
    let declared: Vec<&RelationshipEdge> = graph.declared_edges().collect();

    let mut kept: Vec<ScoredCandidate> = Vec::new();
    for candidate in ranked {
        if candidate.score < config.min_confidence {
            stats.below_threshold += 1;
            continue;
        }
        let edge = candidate.to_edge();
        if declared.iter().any(|declared| declared.links_same_columns(&edge)) {
            stats.shadowed_by_declared += 1;
            continue;
        }
        kept.push(candidate);
    }

    // Mirrored pairs (A.x -> B.y and B.y -> A.x): `kept` is ranked, so the first one
    // seen wins unless the later one points at a key and the first does not.
    let mut by_pair: BTreeMap<(ColumnRef, ColumnRef), usize> = BTreeMap::new();
    let mut dropped = BTreeSet::new();
    for (index, candidate) in kept.iter().enumerate() {
        let pair = unordered_pair(&candidate.candidate);
        match by_pair.get(&pair) {
            Some(&first) => {
                let earlier = &kept[first];
                let prefer_later = candidate.score == earlier.score
                    && candidate.candidate.target_is_key_like
                    && !earlier.candidate.target_is_key_like;
                if prefer_later {
                    dropped.insert(first);
                    by_pair.insert(pair, index);
                } else {
                    dropped.insert(index);
                }
                stats.mirrored += 1;
            }
            None => {
                by_pair.insert(pair, index);
            }
        }
    }
    let kept: Vec<ScoredCandidate> = kept
        .into_iter()
        .enumerate()
        .filter(|(index, _)| !dropped.contains(index))
        .map(|(_, candidate)| candidate)
        .collect();

    let mut best: BTreeMap<&ColumnRef, f64> = BTreeMap::new();
    for candidate in &kept {
        let entry = best.entry(&candidate.candidate.source).or_insert(candidate.score);
        if candidate.score > *entry {
            *entry = candidate.score;
        }
    }
    let best: BTreeMap<ColumnRef, f64> = best
        .into_iter()
        .map(|(column, score)| (column.clone(), score))
        .collect();

    let mut accepted = Vec::new();
    for candidate in kept {
        if best.get(&candidate.candidate.source) == Some(&candidate.score) {
            accepted.push(candidate);
        } else {
            stats.superseded += 1;
        }
    }
    accepted
}

fn unordered_pair(candidate: &Candidate) -> (ColumnRef, ColumnRef) {
    if candidate.source <= candidate.target {
        (candidate.source.clone(), candidate.target.clone())
    } else {
        (candidate.target.clone(), candidate.source.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suffixes() -> Vec<String> {
        vec!["_key".to_string(), "_id".to_string(), "id".to_string()]
    }

    #[test]
    fn stems_strip_longest_suffix() {
        let suffixes = suffixes();
        assert_eq!(stem("customer_id", &suffixes), "customer");
        assert_eq!(stem("customerid", &suffixes), "customer");
        assert_eq!(stem("region_key", &suffixes), "region");
        assert_eq!(stem("id", &suffixes), "");
        assert_eq!(stem("status", &suffixes), "status");
    }

    #[test]
    fn singularizes_common_plurals() {
        assert_eq!(singular("customers"), "customer");
        assert_eq!(singular("categories"), "category");
        assert_eq!(singular("addresses"), "address");
        assert_eq!(singular("boxes"), "box");
        assert_eq!(singular("class"), "class");
        assert_eq!(singular("staff"), "staff");
    }

    #[test]
    fn token_overlap_is_jaccard() {
        assert_eq!(token_overlap("billing_customer", "customer"), 0.5);
        assert_eq!(token_overlap("customer", "customer"), 1.0);
        assert_eq!(token_overlap("order", "customer"), 0.0);
    }

    #[test]
    fn scores_are_clipped_and_rounded() {
        assert_eq!(round_score(1.7), 1.0);
        assert_eq!(round_score(-0.2), 0.0);
        assert_eq!(round_score(0.123_456_789), 0.123_457);
    }
}

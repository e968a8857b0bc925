use tracing::{debug, info};

use crate::models::{DocumentField, FieldId, FieldMapping, MappingTemplate, MatchMethod, UnmappedReason};
use crate::similarity::{SemanticSimilarity, best_alias_score, is_exact_alias, normalize_label};

/// Two scores closer than this are a tie
const TIE_TOLERANCE: f64 = 1e-9;

/// Configuration for Stage 3 field mapping
#[derive(Debug, Clone)]
pub struct MapperConfig {
    /// Minimum normalized Levenshtein similarity for a fuzzy match
    pub fuzzy_threshold: f64,
    /// Minimum cosine similarity for a semantic match
    pub semantic_threshold: f64,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.8,
            semantic_threshold: 0.75,
        }
    }
}

/// Mapping progress shared by the passes
struct MappingState<'a> {
    field_ids: &'a [FieldId],
    documents: &'a [DocumentField],
    /// Normalized document labels, parallel to `documents`
    labels: Vec<String>,
    resolved: Vec<Option<FieldMapping>>,
    claimed: Vec<bool>,
}

impl<'a> MappingState<'a> {
    fn new(field_ids: &'a [FieldId], documents: &'a [DocumentField]) -> Self {
        Self {
            field_ids,
            documents,
            labels: documents.iter().map(|d| normalize_label(&d.name)).collect(),
            resolved: vec![None; field_ids.len()],
            claimed: vec![false; documents.len()],
        }
    }

    fn claim(&mut self, fi: usize, di: usize, method: MatchMethod, confidence: f64) {
        debug!(
            "Mapped {} -> {:?} ({:?}, {:.3})",
            self.field_ids[fi], self.documents[di].name, method, confidence
        );
        self.resolved[fi] = Some(FieldMapping::mapped(
            self.field_ids[fi],
            self.documents[di].name.clone(),
            method,
            confidence,
        ));
        self.claimed[di] = true;
    }

    /// Run one matching pass
    ///
    /// `score` returns the candidate score when it passes the pass threshold.
    /// The globally best candidate is claimed first, so a record field only
    /// falls back to a weaker document field when a stronger one is taken.
    /// With `detect_ties`, a field whose best two unclaimed candidates score
    /// the same is left ambiguous.
    fn run_pass(&mut self, method: MatchMethod, detect_ties: bool, score: impl Fn(FieldId, &str) -> Option<f64>) {
        let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
        for (fi, field) in self.field_ids.iter().enumerate() {
            if self.resolved[fi].is_some() {
                continue;
            }
            for (di, label) in self.labels.iter().enumerate() {
                if self.claimed[di] {
                    continue;
                }
                if let Some(s) = score(*field, label) {
                    candidates.push((s, fi, di));
                }
            }
        }

        candidates.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.cmp(&b.2))
        });

        for (i, &(s, fi, di)) in candidates.iter().enumerate() {
            if self.resolved[fi].is_some() || self.claimed[di] {
                continue;
            }

            // Only candidates still unclaimed at this point can tie
            if detect_ties
                && let Some(&(_, _, other)) = candidates[i + 1..]
                    .iter()
                    .take_while(|c| s - c.0 < TIE_TOLERANCE)
                    .find(|c| c.1 == fi && !self.claimed[c.2])
            {
                debug!(
                    "{} is ambiguous between {:?} and {:?}",
                    self.field_ids[fi], self.documents[di].name, self.documents[other].name
                );
                self.resolved[fi] = Some(FieldMapping::unmapped(self.field_ids[fi], UnmappedReason::Ambiguous));
                continue;
            }

            self.claim(fi, di, method, s);
        }
    }

    fn finish(self) -> Vec<FieldMapping> {
        self.resolved
            .into_iter()
            .zip(self.field_ids)
            .map(|(m, field)| m.unwrap_or_else(|| FieldMapping::unmapped(*field, UnmappedReason::NoMatch)))
            .collect()
    }
}

/// Execute Stage 3: map record fields onto document fields
///
/// Passes run in order (exact alias, fuzzy, semantic) over what is still
/// unresolved. The semantic pass is skipped when no scorer is available.
/// Returns one mapping per input field id, in input order; no document field
/// is used twice.
pub fn map_fields(
    field_ids: &[FieldId],
    documents: &[DocumentField],
    semantic: Option<&dyn SemanticSimilarity>,
    config: &MapperConfig,
) -> Vec<FieldMapping> {
    let state = MappingState::new(field_ids, documents);
    run_all_passes(state, semantic, config)
}

/// Like [`map_fields`], applying a saved template first
///
/// Template entries whose document field no longer exists are ignored and
/// the field goes through the normal passes.
pub fn map_with_template(
    field_ids: &[FieldId],
    documents: &[DocumentField],
    template: &MappingTemplate,
    semantic: Option<&dyn SemanticSimilarity>,
    config: &MapperConfig,
) -> Vec<FieldMapping> {
    let mut state = MappingState::new(field_ids, documents);

    for (fi, field) in field_ids.iter().enumerate() {
        let Some(entry) = template.mappings.get(field) else {
            continue;
        };
        let doc = (0..documents.len()).find(|&di| !state.claimed[di] && documents[di].name == entry.document_field);
        if let Some(di) = doc {
            state.claim(fi, di, MatchMethod::Template, entry.confidence);
        }
    }

    run_all_passes(state, semantic, config)
}

fn run_all_passes(
    mut state: MappingState<'_>,
    semantic: Option<&dyn SemanticSimilarity>,
    config: &MapperConfig,
) -> Vec<FieldMapping> {
    state.run_pass(MatchMethod::Exact, false, |field, label| {
        is_exact_alias(field, label).then_some(1.0)
    });

    state.run_pass(MatchMethod::Fuzzy, true, |field, label| {
        Some(best_alias_score(field, label)).filter(|s| *s >= config.fuzzy_threshold)
    });

    match semantic {
        Some(scorer) => state.run_pass(MatchMethod::Semantic, true, |field, label| {
            field
                .aliases()
                .iter()
                .filter_map(|alias| scorer.similarity(alias, label))
                .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.max(s))))
                .filter(|s| *s >= config.semantic_threshold)
        }),
        None => debug!("Semantic matching unavailable, skipping semantic pass"),
    }

    let mappings = state.finish();
    let mapped = mappings.iter().filter(|m| m.is_mapped()).count();
    info!(
        "Stage 3: mapped {} of {} fields ({} unmapped)",
        mapped,
        mappings.len(),
        mappings.len() - mapped
    );
    mappings
}

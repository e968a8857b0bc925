use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::models::{FieldEntry, FieldId, FieldProposal, FieldValue, Strategy, StructuredRecord};

/// Configuration for Stage 2 aggregation
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Proposals below this confidence are dropped before grouping
    pub min_confidence: f64,
    /// A different value this close to the winner marks the field low-confidence
    pub ambiguity_epsilon: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            ambiguity_epsilon: 0.05,
        }
    }
}

/// Counts of what happened to the proposals during aggregation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationReport {
    /// Proposals that passed threshold and validation
    pub accepted: usize,
    /// Proposals whose value failed the field's validator
    pub rejected: usize,
    /// Proposals under the confidence threshold
    pub below_threshold: usize,
    /// Fields where a competing value came within epsilon of the winner
    pub ambiguous_fields: usize,
}

/// A validated proposal waiting for resolution
#[derive(Debug, Clone)]
struct Candidate {
    value: FieldValue,
    confidence: f64,
    source: Strategy,
    turn_index: usize,
}

impl From<&FieldEntry> for Candidate {
    fn from(entry: &FieldEntry) -> Self {
        Self {
            value: entry.value.clone(),
            confidence: entry.confidence,
            source: entry.source,
            turn_index: entry.turn_index,
        }
    }
}

/// Resolution order: higher confidence, then later turn, then strategy
/// declaration order, then value text. Total, so arrival order never matters.
fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| b.turn_index.cmp(&a.turn_index))
        .then_with(|| a.source.cmp(&b.source))
        .then_with(|| a.value.to_string().cmp(&b.value.to_string()))
}

/// Pick the winner among one field's candidates
fn resolve(mut candidates: Vec<Candidate>, config: &AggregatorConfig) -> Option<FieldEntry> {
    candidates.sort_by(rank);
    let mut iter = candidates.into_iter();
    let winner = iter.next()?;

    // The best differently-valued rival; same-valued runners-up agree with the winner.
    // A gap of exactly epsilon is not ambiguous, whatever the float noise.
    let rival = iter.find(|c| c.value != winner.value);
    let competing_value = rival
        .filter(|r| winner.confidence - r.confidence < config.ambiguity_epsilon - f64::EPSILON)
        .map(|r| r.value);

    Some(FieldEntry {
        value: winner.value,
        confidence: winner.confidence,
        low_confidence: competing_value.is_some(),
        competing_value,
        source: winner.source,
        turn_index: winner.turn_index,
    })
}

/// Execute Stage 2: merge proposals into a validated record
pub fn aggregate(proposals: &[FieldProposal], config: &AggregatorConfig) -> StructuredRecord {
    aggregate_with_report(proposals, config).0
}

/// Like [`aggregate`], also reporting how many proposals were dropped and why
pub fn aggregate_with_report(
    proposals: &[FieldProposal],
    config: &AggregatorConfig,
) -> (StructuredRecord, AggregationReport) {
    let mut report = AggregationReport::default();
    let mut groups: BTreeMap<FieldId, Vec<Candidate>> = BTreeMap::new();

    for proposal in proposals {
        if proposal.confidence < config.min_confidence {
            report.below_threshold += 1;
            continue;
        }

        let Some(value) = proposal.field.validate(&proposal.value) else {
            debug!(
                "Rejected {} value {:?} from {:?}",
                proposal.field,
                proposal.value,
                proposal.strategy()
            );
            report.rejected += 1;
            continue;
        };

        report.accepted += 1;
        groups.entry(proposal.field).or_default().push(Candidate {
            value,
            confidence: proposal.confidence,
            source: proposal.strategy(),
            turn_index: proposal.turn_index,
        });
    }

    let mut record = StructuredRecord::new();
    for (field, candidates) in groups {
        if let Some(entry) = resolve(candidates, config) {
            if entry.low_confidence {
                report.ambiguous_fields += 1;
            }
            record.insert(field, entry);
        }
    }

    info!(
        "Stage 2: {} fields from {} proposals ({} rejected, {} below threshold, {} ambiguous)",
        record.len(),
        proposals.len(),
        report.rejected,
        report.below_threshold,
        report.ambiguous_fields
    );

    (record, report)
}

impl StructuredRecord {
    /// Merge another record into this one
    ///
    /// Fields present in only one record are kept as is; overlapping fields
    /// are re-resolved with the aggregation policy.
    pub fn merge(&self, other: &StructuredRecord, config: &AggregatorConfig) -> StructuredRecord {
        let mut merged = StructuredRecord::new();

        for field in FieldId::ALL {
            let entry = match (self.get(field), other.get(field)) {
                (Some(a), Some(b)) => resolve(vec![Candidate::from(a), Candidate::from(b)], config),
                (Some(a), None) => Some(a.clone()),
                (None, Some(b)) => Some(b.clone()),
                (None, None) => None,
            };
            if let Some(entry) = entry {
                merged.insert(field, entry);
            }
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProposalSource;

    fn proposal(field: FieldId, value: &str, confidence: f64, source: ProposalSource, turn: usize) -> FieldProposal {
        FieldProposal::new(field, value, confidence, source, turn)
    }

    fn pattern() -> ProposalSource {
        ProposalSource::Pattern { grammar: "test" }
    }

    fn numeric() -> ProposalSource {
        ProposalSource::Numeric { context: "money" }
    }

    fn category() -> ProposalSource {
        ProposalSource::Category { keyword: "test" }
    }

    #[test]
    fn test_equal_values_after_normalization_are_not_ambiguous() {
        let proposals = vec![
            proposal(FieldId::AnnualIncome, "$95,000", 0.95, pattern(), 2),
            proposal(FieldId::AnnualIncome, "95000", 0.95, numeric(), 2),
        ];

        let record = aggregate(&proposals, &AggregatorConfig::default());
        let entry = record.get(FieldId::AnnualIncome).unwrap();

        assert_eq!(entry.value, FieldValue::Amount(95_000.0));
        assert!(!entry.low_confidence);
        assert_eq!(entry.competing_value, None);
        assert_eq!(entry.source, Strategy::Pattern);
    }

    #[test]
    fn test_close_rival_flags_low_confidence() {
        let proposals = vec![
            proposal(FieldId::RiskTolerance, "moderate", 0.75, category(), 1),
            proposal(FieldId::RiskTolerance, "conservative", 0.72, category(), 0),
        ];

        let (record, report) = aggregate_with_report(&proposals, &AggregatorConfig::default());
        let entry = record.get(FieldId::RiskTolerance).unwrap();

        assert_eq!(entry.value, FieldValue::Choice("moderate".to_string()));
        assert!(entry.low_confidence);
        assert_eq!(entry.competing_value, Some(FieldValue::Choice("conservative".to_string())));
        assert_eq!(report.ambiguous_fields, 1);
    }

    #[test]
    fn test_distant_rival_is_not_flagged() {
        let proposals = vec![
            proposal(FieldId::RiskTolerance, "moderate", 0.9, category(), 1),
            proposal(FieldId::RiskTolerance, "conservative", 0.5, category(), 0),
        ];

        let record = aggregate(&proposals, &AggregatorConfig::default());
        assert!(!record.get(FieldId::RiskTolerance).unwrap().low_confidence);
    }

    #[test]
    fn test_gap_of_exactly_epsilon_is_not_flagged() {
        for (winner, rival) in [(0.6, 0.55), (0.8, 0.75), (1.0, 0.95)] {
            let proposals = vec![
                proposal(FieldId::RiskTolerance, "moderate", winner, category(), 1),
                proposal(FieldId::RiskTolerance, "conservative", rival, category(), 0),
            ];
            let record = aggregate(&proposals, &AggregatorConfig::default());
            assert!(!record.get(FieldId::RiskTolerance).unwrap().low_confidence, "{} vs {}", winner, rival);
        }

        let proposals = vec![
            proposal(FieldId::RiskTolerance, "moderate", 0.6, category(), 1),
            proposal(FieldId::RiskTolerance, "conservative", 0.56, category(), 0),
        ];
        let record = aggregate(&proposals, &AggregatorConfig::default());
        assert!(record.get(FieldId::RiskTolerance).unwrap().low_confidence);
    }

    #[test]
    fn test_threshold_and_validation_drop_proposals() {
        let proposals = vec![
            proposal(FieldId::Email, "a@b.co", 0.2, pattern(), 0),
            proposal(FieldId::Email, "not-an-email", 1.0, pattern(), 1),
            proposal(FieldId::Phone, "555-123-4567", 1.0, pattern(), 2),
        ];

        let (record, report) = aggregate_with_report(&proposals, &AggregatorConfig::default());

        assert!(!record.contains(FieldId::Email));
        assert!(record.contains(FieldId::Phone));
        assert_eq!(
            report,
            AggregationReport {
                accepted: 1,
                rejected: 1,
                below_threshold: 1,
                ambiguous_fields: 0,
            }
        );
    }

    /// Later statements are assumed to be corrections. This is a heuristic:
    /// sarcasm or hypotheticals in a later turn would win the same way.
    #[test]
    fn test_heuristic_later_turn_wins_exact_tie() {
        let proposals = vec![
            proposal(FieldId::MaritalStatus, "single", 0.8, category(), 1),
            proposal(FieldId::MaritalStatus, "married", 0.8, category(), 5),
        ];

        let record = aggregate(&proposals, &AggregatorConfig::default());
        let entry = record.get(FieldId::MaritalStatus).unwrap();

        assert_eq!(entry.value, FieldValue::Choice("married".to_string()));
        assert_eq!(entry.turn_index, 5);
        // The tie is still surfaced to the reviewer
        assert!(entry.low_confidence);
    }

    #[test]
    fn test_arrival_order_does_not_matter() {
        let proposals = vec![
            proposal(FieldId::AnnualIncome, "$120,000", 0.85, pattern(), 3),
            proposal(FieldId::AnnualIncome, "95000", 0.85, numeric(), 3),
            proposal(FieldId::NetWorth, "500000", 0.85, numeric(), 4),
            proposal(FieldId::RiskTolerance, "aggressive", 0.7, category(), 6),
            proposal(FieldId::RiskTolerance, "moderate", 0.7, category(), 6),
        ];
        let config = AggregatorConfig::default();
        let expected = aggregate(&proposals, &config);

        let mut reversed = proposals.clone();
        reversed.reverse();
        assert_eq!(aggregate(&reversed, &config), expected);

        let mut rotated = proposals.clone();
        rotated.rotate_left(2);
        assert_eq!(aggregate(&rotated, &config), expected);

        // Same confidence and turn: Pattern outranks Numeric
        assert_eq!(
            expected.value(FieldId::AnnualIncome),
            Some(&FieldValue::Amount(120_000.0))
        );
        // Same strategy too: value text decides
        assert_eq!(
            expected.value(FieldId::RiskTolerance),
            Some(&FieldValue::Choice("aggressive".to_string()))
        );
    }

    #[test]
    fn test_merge_records() {
        let config = AggregatorConfig::default();
        let first = aggregate(
            &[
                proposal(FieldId::Email, "a@b.co", 1.0, pattern(), 0),
                proposal(FieldId::AnnualIncome, "90000", 0.85, numeric(), 1),
            ],
            &config,
        );
        let second = aggregate(
            &[
                proposal(FieldId::AnnualIncome, "$95,000", 1.0, pattern(), 0),
                proposal(FieldId::Phone, "555-123-4567", 1.0, pattern(), 1),
            ],
            &config,
        );

        let merged = first.merge(&second, &config);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged.value(FieldId::AnnualIncome), Some(&FieldValue::Amount(95_000.0)));
        assert!(!merged.get(FieldId::AnnualIncome).unwrap().low_confidence);
        assert_eq!(merged, second.merge(&first, &config));
    }
}

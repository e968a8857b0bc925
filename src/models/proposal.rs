use serde::{Deserialize, Serialize};

use super::FieldId;

/// Extraction strategy that produced a proposal
///
/// Declaration order is the final tie-break when two proposals have the
/// same confidence and turn index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Pattern,
    Numeric,
    Category,
    Entity,
}

/// Provenance of a proposal, tagged by strategy
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ProposalSource {
    /// Exact grammar match (email, phone, currency, ...)
    Pattern { grammar: &'static str },
    /// Keyword phrase from a field's category set
    Category { keyword: &'static str },
    /// Capitalized phrase next to a field-indicating cue
    Entity { cue: &'static str },
    /// Number parsed in a money, date or count context
    Numeric { context: &'static str },
}

impl ProposalSource {
    pub fn strategy(&self) -> Strategy {
        match self {
            ProposalSource::Pattern { .. } => Strategy::Pattern,
            ProposalSource::Category { .. } => Strategy::Category,
            ProposalSource::Entity { .. } => Strategy::Entity,
            ProposalSource::Numeric { .. } => Strategy::Numeric,
        }
    }
}

/// A candidate value for one record field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldProposal {
    pub field: FieldId,
    /// Unvalidated candidate text; the aggregator runs the field's validator
    pub value: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub source: ProposalSource,
    /// Index of the dialogue turn the value was found in
    pub turn_index: usize,
}

impl FieldProposal {
    pub fn new(
        field: FieldId,
        value: impl Into<String>,
        confidence: f64,
        source: ProposalSource,
        turn_index: usize,
    ) -> Self {
        Self {
            field,
            value: value.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source,
            turn_index,
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.source.strategy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        let p = FieldProposal::new(
            FieldId::Email,
            "a@b.co",
            1.4,
            ProposalSource::Pattern { grammar: "email" },
            0,
        );
        assert_eq!(p.confidence, 1.0);
        assert_eq!(p.strategy(), Strategy::Pattern);
    }

    #[test]
    fn test_source_serializes_with_strategy_tag() {
        let source = ProposalSource::Category { keyword: "moderate" };
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["strategy"], "category");
        assert_eq!(json["keyword"], "moderate");
    }
}

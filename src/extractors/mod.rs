pub mod category;
pub mod context;
pub mod entity;
pub mod numeric;
pub mod pattern;

pub use category::CategoryExtractor;
pub use entity::EntityExtractor;
pub use numeric::NumericExtractor;
pub use pattern::PatternExtractor;

use crate::models::{DialogueTurn, FieldProposal, Speaker, Strategy};

/// A strategy that proposes field values from a single dialogue turn
///
/// Extractors never look at other turns; conflicts between turns are the
/// aggregator's problem.
pub trait FieldExtractor: Send + Sync {
    fn strategy(&self) -> Strategy;

    fn propose(&self, turn: &DialogueTurn) -> Vec<FieldProposal>;
}

/// Configuration for all extractors
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Strategies to run, in this order
    pub strategies: Vec<Strategy>,
    /// Ignore answers spoken by the initiator
    pub skip_initiator_responses: bool,
    /// Base category confidence when the question names the field
    pub question_context_base: f64,
    /// Base category confidence when only the answer names the field
    pub response_context_base: f64,
    /// Upper bound for category confidence
    pub category_confidence_cap: f64,
    /// Confidence of entity proposals
    pub entity_confidence: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            strategies: vec![Strategy::Pattern, Strategy::Numeric, Strategy::Category, Strategy::Entity],
            skip_initiator_responses: true,
            question_context_base: 0.6,
            response_context_base: 0.4,
            category_confidence_cap: 0.9,
            entity_confidence: 0.7,
        }
    }
}

/// Build the extractors named in the config
pub fn build_extractors(config: &ExtractorConfig) -> Vec<Box<dyn FieldExtractor>> {
    config
        .strategies
        .iter()
        .map(|strategy| -> Box<dyn FieldExtractor> {
            match strategy {
                Strategy::Pattern => Box::new(PatternExtractor::new(config)),
                Strategy::Numeric => Box::new(NumericExtractor::new(config)),
                Strategy::Category => Box::new(CategoryExtractor::new(config)),
                Strategy::Entity => Box::new(EntityExtractor::new(config)),
            }
        })
        .collect()
}

/// Whether a turn's answer should be scanned at all
pub(crate) fn is_scannable(turn: &DialogueTurn, skip_initiator: bool) -> bool {
    !(skip_initiator && turn.speaker() == Speaker::Initiator) && !turn.response_text().trim().is_empty()
}

/// Drop repeated (field, value) pairs from one extractor, keeping the first
pub(crate) fn dedupe(proposals: Vec<FieldProposal>) -> Vec<FieldProposal> {
    let mut out: Vec<FieldProposal> = Vec::with_capacity(proposals.len());
    for p in proposals {
        match out.iter_mut().find(|q| q.field == p.field && q.value == p.value) {
            Some(existing) if existing.confidence < p.confidence => *existing = p,
            Some(_) => {}
            None => out.push(p),
        }
    }
    out
}

/// Offset-carrying word tokens of a text
///
/// Numbers keep their grouping commas and decimal point; everything else is
/// split into runs of letters.
pub(crate) fn tokenize(text: &str) -> Vec<Token<'_>> {
    use std::sync::LazyLock;

    use regex::Regex;

    static RE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"[A-Za-z]+(?:'[A-Za-z]+)?|\d+(?:,\d{3})*(?:\.\d+)?").expect("valid token regex")
    });

    RE_TOKEN
        .find_iter(text)
        .map(|m| Token {
            text: m.as_str(),
            start: m.start(),
            end: m.end(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

impl Token<'_> {
    pub fn is_numeric(&self) -> bool {
        self.text.starts_with(|c: char| c.is_ascii_digit())
    }

    pub fn lower(&self) -> String {
        self.text.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldId, ProposalSource, Utterance};

    #[test]
    fn test_build_extractors_follows_config_order() {
        let extractors = build_extractors(&ExtractorConfig::default());
        let strategies: Vec<Strategy> = extractors.iter().map(|e| e.strategy()).collect();
        assert_eq!(
            strategies,
            vec![Strategy::Pattern, Strategy::Numeric, Strategy::Category, Strategy::Entity]
        );

        let config = ExtractorConfig {
            strategies: vec![Strategy::Category],
            ..Default::default()
        };
        assert_eq!(build_extractors(&config).len(), 1);
    }

    #[test]
    fn test_initiator_answers_are_not_scanned() {
        let q = Utterance::new(Speaker::Respondent, "Is that right?", 0, true);
        let a = Utterance::new(Speaker::Initiator, "My email is a@b.co", 1, false);
        let turn = DialogueTurn::qa(0, q, a);

        assert!(!is_scannable(&turn, true));
        assert!(is_scannable(&turn, false));
    }

    #[test]
    fn test_dedupe_keeps_highest_confidence() {
        let source = || ProposalSource::Pattern { grammar: "email" };
        let proposals = vec![
            FieldProposal::new(FieldId::Email, "a@b.co", 0.5, source(), 0),
            FieldProposal::new(FieldId::Email, "a@b.co", 0.9, source(), 0),
            FieldProposal::new(FieldId::Email, "c@d.co", 0.7, source(), 0),
        ];

        let deduped = dedupe(proposals);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].confidence, 0.9);
    }

    #[test]
    fn test_tokenize_keeps_offsets() {
        let text = "About $1,250.50 and ninety-five";
        let tokens = tokenize(text);
        let words: Vec<&str> = tokens.iter().map(|t| t.text).collect();

        assert_eq!(words, vec!["About", "1,250.50", "and", "ninety", "five"]);
        assert_eq!(&text[tokens[1].start..tokens[1].end], "1,250.50");
        assert!(tokens[1].is_numeric());
    }
}

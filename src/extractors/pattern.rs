use std::sync::LazyLock;

use regex::Regex;

use super::context::{clause_around, has_cue, money_field};
use super::{ExtractorConfig, FieldExtractor, dedupe, is_scannable};
use crate::models::{DialogueTurn, FieldId, FieldProposal, ProposalSource, Strategy};

static RE_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email regex")
});

static RE_PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?1[\s.-]?)?(?:\(\d{3}\)|\b\d{3})[\s.-]?\d{3}[\s.-]?\d{4}\b").expect("valid phone regex")
});

static RE_SSN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("valid ssn regex"));

/// Nine digits in SSN grouping with spaces or nothing between groups
static RE_SSN_LOOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}[ ]?\d{2}[ ]?\d{4}\b").expect("valid loose ssn regex"));

static RE_STATE_ZIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z]{2}),?\s+(\d{5}(?:-\d{4})?)\b").expect("valid state zip regex")
});

static RE_ZIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{5}(?:-\d{4})?\b").expect("valid zip regex"));

static RE_CURRENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\s?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{1,2})?").expect("valid currency regex")
});

/// Words after an amount that scale it; those amounts belong to the numeric extractor
const SCALE_WORDS: &[&str] = &["k", "m", "mm", "bn", "b", "thousand", "million", "billion", "grand"];

/// Exact-grammar extractor: email, phone, SSN, ZIP/state and plain currency
pub struct PatternExtractor {
    skip_initiator: bool,
}

impl PatternExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            skip_initiator: config.skip_initiator_responses,
        }
    }
}

impl FieldExtractor for PatternExtractor {
    fn strategy(&self) -> Strategy {
        Strategy::Pattern
    }

    fn propose(&self, turn: &DialogueTurn) -> Vec<FieldProposal> {
        if !is_scannable(turn, self.skip_initiator) {
            return vec![];
        }

        let question = turn.prompt_text();
        let response = turn.response_text();
        let mut proposals = Vec::new();
        let mut emit = |field: FieldId, value: &str, grammar: &'static str| {
            proposals.push(FieldProposal::new(
                field,
                value,
                1.0,
                ProposalSource::Pattern { grammar },
                turn.index,
            ));
        };

        for m in RE_EMAIL.find_iter(response) {
            emit(FieldId::Email, m.as_str(), "email");
        }

        for m in RE_PHONE.find_iter(response) {
            emit(FieldId::Phone, m.as_str(), "phone");
        }

        let ssn_context = has_cue(FieldId::Ssn, question) || has_cue(FieldId::Ssn, response);
        for m in RE_SSN.find_iter(response) {
            emit(FieldId::Ssn, m.as_str(), "ssn");
        }
        if ssn_context {
            for m in RE_SSN_LOOSE.find_iter(response) {
                emit(FieldId::Ssn, m.as_str(), "ssn");
            }
        }

        let mut zip_spans = Vec::new();
        for caps in RE_STATE_ZIP.captures_iter(response) {
            if let (Some(state), Some(zip)) = (caps.get(1), caps.get(2)) {
                emit(FieldId::State, state.as_str(), "state_zip");
                emit(FieldId::ZipCode, zip.as_str(), "state_zip");
                zip_spans.push(zip.start());
            }
        }
        if has_cue(FieldId::ZipCode, question) || has_cue(FieldId::ZipCode, response) {
            for m in RE_ZIP.find_iter(response) {
                if !zip_spans.contains(&m.start()) && !preceded_by_dollar(response, m.start()) {
                    emit(FieldId::ZipCode, m.as_str(), "zip");
                }
            }
        }

        for m in RE_CURRENCY.find_iter(response) {
            if is_scaled(&response[m.end()..]) {
                continue;
            }
            let clause = clause_around(response, m.start());
            if let Some(field) = money_field(question, clause) {
                emit(field, m.as_str(), "currency");
            }
        }

        dedupe(proposals)
    }
}

fn preceded_by_dollar(text: &str, start: usize) -> bool {
    text[..start].trim_end().ends_with('$')
}

/// Whether the text right after an amount carries a scale suffix
fn is_scaled(rest: &str) -> bool {
    if rest.starts_with(|c: char| c.is_alphabetic()) {
        return true;
    }
    let next: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect::<String>()
        .to_lowercase();
    SCALE_WORDS.contains(&next.as_str())
}

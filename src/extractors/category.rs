use super::context::{ContextSource, field_context};
use super::{ExtractorConfig, FieldExtractor, dedupe, is_scannable};
use crate::models::{DialogueTurn, FieldId, FieldProposal, ProposalSource, Strategy};

/// Phrases that select one option of a choice field
struct OptionPhrases {
    option: &'static str,
    phrases: &'static [&'static str],
}

struct CategorySet {
    field: FieldId,
    options: &'static [OptionPhrases],
}

const CATEGORY_SETS: &[CategorySet] = &[
    CategorySet {
        field: FieldId::RiskTolerance,
        options: &[
            OptionPhrases {
                option: "very_aggressive",
                phrases: &["very aggressive", "extremely aggressive", "maximum risk", "speculative"],
            },
            OptionPhrases {
                option: "aggressive",
                phrases: &["aggressive", "high risk", "risk taker", "comfortable with risk"],
            },
            OptionPhrases {
                option: "moderate",
                phrases: &["moderate", "medium risk", "middle of the road", "somewhere in the middle", "balanced"],
            },
            OptionPhrases {
                option: "conservative",
                phrases: &["conservative", "low risk", "cautious", "risk averse", "risk-averse", "play it safe"],
            },
        ],
    },
    CategorySet {
        field: FieldId::InvestmentObjective,
        options: &[
            OptionPhrases {
                option: "growth",
                phrases: &["growth", "grow my", "grow our", "grow the", "appreciation"],
            },
            OptionPhrases {
                option: "income",
                phrases: &["income", "dividends", "yield", "steady payments"],
            },
            OptionPhrases {
                option: "preservation",
                phrases: &["preservation", "preserve", "protect", "safety of principal", "keep what"],
            },
            OptionPhrases {
                option: "speculation",
                phrases: &["speculation", "speculate", "speculative"],
            },
            OptionPhrases {
                option: "balanced",
                phrases: &["balanced", "mix of", "combination of", "bit of both"],
            },
        ],
    },
    CategorySet {
        field: FieldId::EmploymentStatus,
        options: &[
            OptionPhrases {
                option: "self_employed",
                phrases: &[
                    "self-employed",
                    "self employed",
                    "own business",
                    "own my own",
                    "freelance",
                    "freelancer",
                    "contractor",
                    "consultant",
                ],
            },
            OptionPhrases {
                option: "unemployed",
                phrases: &["unemployed", "not working", "between jobs", "laid off", "out of work"],
            },
            OptionPhrases {
                option: "retired",
                phrases: &["retired", "i'm retired", "am retired"],
            },
            OptionPhrases {
                option: "student",
                phrases: &["student", "in school", "at university", "in college"],
            },
            OptionPhrases {
                option: "employed",
                phrases: &[
                    "employed",
                    "work at",
                    "work for",
                    "working at",
                    "working for",
                    "work as",
                    "working as",
                    "full-time",
                    "full time",
                    "part-time",
                    "part time",
                    "job at",
                ],
            },
        ],
    },
    CategorySet {
        field: FieldId::MaritalStatus,
        options: &[
            OptionPhrases {
                option: "married",
                phrases: &["married", "my wife", "my husband", "my spouse"],
            },
            OptionPhrases {
                option: "single",
                phrases: &["single", "never married", "not married", "unmarried"],
            },
            OptionPhrases {
                option: "divorced",
                phrases: &["divorced"],
            },
            OptionPhrases {
                option: "widowed",
                phrases: &["widowed", "widow", "widower"],
            },
            OptionPhrases {
                option: "separated",
                phrases: &["separated"],
            },
        ],
    },
    CategorySet {
        field: FieldId::TimeHorizon,
        options: &[
            OptionPhrases {
                option: "short_term",
                phrases: &["short term", "short-term", "next year", "couple of years", "few years", "soon"],
            },
            OptionPhrases {
                option: "medium_term",
                phrases: &["medium term", "medium-term", "five to ten years", "5 to 10 years", "mid-term"],
            },
            OptionPhrases {
                option: "long_term",
                phrases: &[
                    "long term",
                    "long-term",
                    "decades",
                    "until retirement",
                    "twenty years",
                    "20 years",
                    "thirty years",
                    "30 years",
                ],
            },
        ],
    },
];

/// Words that flip the meaning of a phrase that follows within two words
const NEGATIONS: &[&str] = &["not", "never", "no", "isn't", "wasn't", "don't", "wouldn't", "aren't", "hardly"];

/// Keyword extractor for the fixed-option fields
pub struct CategoryExtractor {
    skip_initiator: bool,
    question_base: f64,
    response_base: f64,
    cap: f64,
}

impl CategoryExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            skip_initiator: config.skip_initiator_responses,
            question_base: config.question_context_base,
            response_base: config.response_context_base,
            cap: config.category_confidence_cap,
        }
    }

    /// Scale confidence by how much of the answer the phrase covers
    fn confidence(&self, context: ContextSource, phrase_len: usize, response_len: usize) -> f64 {
        let base = match context {
            ContextSource::Question => self.question_base,
            ContextSource::Response => self.response_base,
        };
        let coverage = if response_len == 0 {
            0.0
        } else {
            (phrase_len as f64 / response_len as f64).min(1.0)
        };
        (base + (1.0 - base) * coverage).min(self.cap)
    }
}

impl FieldExtractor for CategoryExtractor {
    fn strategy(&self) -> Strategy {
        Strategy::Category
    }

    fn propose(&self, turn: &DialogueTurn) -> Vec<FieldProposal> {
        if !is_scannable(turn, self.skip_initiator) {
            return vec![];
        }

        let question = turn.prompt_text();
        let response = turn.response_text().trim();
        let lower = response.to_lowercase();
        let response_len = response.chars().count();
        let mut proposals = Vec::new();

        for set in CATEGORY_SETS {
            let Some(context) = field_context(set.field, question, response) else {
                continue;
            };

            // Longest unnegated phrase wins; ties keep table order
            let mut best: Option<(&'static str, &'static str)> = None;
            for option in set.options {
                for phrase in option.phrases {
                    if !contains_unnegated(&lower, phrase) {
                        continue;
                    }
                    if best.is_none_or(|(_, p)| phrase.len() > p.len()) {
                        best = Some((option.option, phrase));
                    }
                }
            }

            if let Some((option, phrase)) = best {
                let confidence = self.confidence(context, phrase.chars().count(), response_len);
                proposals.push(FieldProposal::new(
                    set.field,
                    option,
                    confidence,
                    ProposalSource::Category { keyword: phrase },
                    turn.index,
                ));
            }
        }

        dedupe(proposals)
    }
}

/// Find a whole-word occurrence of `phrase` not preceded by a negation
fn contains_unnegated(text: &str, phrase: &str) -> bool {
    // "not married" carries its own negation
    let self_negating = phrase
        .split(' ')
        .next()
        .is_some_and(|w| NEGATIONS.contains(&w));
    let mut from = 0;
    while let Some(rel) = text[from..].find(phrase) {
        let start = from + rel;
        let end = start + phrase.len();
        from = start + 1;

        let before_ok = text[..start].chars().next_back().is_none_or(|c| !c.is_alphanumeric());
        let after_ok = text[end..].chars().next().is_none_or(|c| !c.is_alphanumeric());
        if !(before_ok && after_ok) {
            continue;
        }
        if self_negating {
            return true;
        }

        let negated = text[..start]
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|w| !w.is_empty())
            .rev()
            .take(2)
            .any(|w| NEGATIONS.contains(&w));
        if !negated {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Speaker, Utterance};

    fn propose(question: &str, answer: &str) -> Vec<FieldProposal> {
        let turn = DialogueTurn::qa(
            0,
            Utterance::new(Speaker::Initiator, question, 0, true),
            Utterance::new(Speaker::Respondent, answer, 1, false),
        );
        CategoryExtractor::new(&ExtractorConfig::default()).propose(&turn)
    }

    fn find(proposals: &[FieldProposal], field: FieldId) -> Option<&FieldProposal> {
        proposals.iter().find(|p| p.field == field)
    }

    #[test]
    fn test_risk_from_short_answer() {
        let proposals = propose("How would you describe your risk tolerance?", "I'd say I'm moderate.");
        let risk = find(&proposals, FieldId::RiskTolerance).unwrap();

        assert_eq!(risk.value, "moderate");
        // 0.6 + 0.4 * 8/21
        assert!((risk.confidence - (0.6 + 0.4 * 8.0 / 21.0)).abs() < 1e-9);
        assert!(risk.confidence >= 0.7);
    }

    #[test]
    fn test_longest_phrase_wins() {
        let proposals = propose("What's your risk tolerance?", "Very aggressive, honestly.");
        assert_eq!(find(&proposals, FieldId::RiskTolerance).unwrap().value, "very_aggressive");

        let proposals = propose("What's your employment status?", "I'm self-employed.");
        assert_eq!(find(&proposals, FieldId::EmploymentStatus).unwrap().value, "self_employed");
    }

    #[test]
    fn test_negated_phrase_is_skipped() {
        let proposals = propose("What's your risk tolerance?", "I'm not aggressive at all.");
        assert!(find(&proposals, FieldId::RiskTolerance).is_none());

        let proposals = propose("Are you married?", "No, not married.");
        assert_eq!(find(&proposals, FieldId::MaritalStatus).unwrap().value, "single");
    }

    #[test]
    fn test_requires_context() {
        let proposals = propose("How was the drive in?", "Moderate traffic.");
        assert!(find(&proposals, FieldId::RiskTolerance).is_none());
    }

    #[test]
    fn test_response_context_is_weaker_and_capped() {
        let proposals = propose("", "In terms of risk I'm conservative.");
        let risk = find(&proposals, FieldId::RiskTolerance).unwrap();
        assert_eq!(risk.value, "conservative");
        assert!(risk.confidence < 0.7);

        let proposals = propose("Your risk tolerance?", "Conservative");
        assert_eq!(find(&proposals, FieldId::RiskTolerance).unwrap().confidence, 0.9);
    }

    #[test]
    fn test_whole_word_match() {
        assert!(contains_unnegated("i'm retired now", "retired"));
        assert!(!contains_unnegated("we're unmarried", "married"));
        assert!(!contains_unnegated("never married", "married"));
    }
}

use std::sync::LazyLock;

use regex::Regex;

use super::context::has_cue;
use super::{ExtractorConfig, FieldExtractor, dedupe, is_scannable};
use crate::models::{DialogueTurn, FieldId, FieldProposal, ProposalSource, Strategy, US_STATES};

/// Cues that introduce a name regardless of the question
static RE_NAME_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:my name is|my name's|the name is|name's|call me)\s+").expect("valid name cue regex")
});

/// Cues that only introduce a name when the question asked for one
static RE_NAME_WEAK_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:i'm|i am|this is|it's|it is)\s+").expect("valid weak name cue regex")
});

static RE_EMPLOYER_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:work(?:ing)? (?:at|for)|employed (?:by|at|with)|job at|employer is|company is|i'm with|i am with)\s+(?:the\s+)?",
    )
    .expect("valid employer cue regex")
});

/// Cue, title, and the word ending the title
static RE_TITLE_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(work(?:ing)? as|position is|title is|role is|i'm|i am|job is)\s+(?:an?\s+|the\s+)?([a-z][a-z\- ]{2,40}?)(?:\s+(?:at|for|with|in|on)\s+|[.,;!]|$)",
    )
    .expect("valid title cue regex")
});

static RE_STREET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b\d{1,6}\s+(?:[A-Z0-9][A-Za-z0-9]*\.?\s+){1,4}?(?i:street|st|avenue|ave|road|rd|boulevard|blvd|drive|dr|lane|ln|court|ct|way|place|pl|terrace|circle|parkway|pkwy)\b\.?(?:,?\s+(?i:apt|apartment|suite|unit)\.?\s*#?\w+)?",
    )
    .expect("valid street regex")
});

/// ", City, ST" or ", City, State Name" following a street address
static RE_CITY_STATE_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^,?\s+(?:in\s+)?([A-Z][a-z]+(?:\s[A-Z][a-z]+)?),\s*([A-Z]{2}\b|[A-Z][a-z]+(?:\s[A-Z][a-z]+)?)")
        .expect("valid city state regex")
});

static RE_LIVE_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i:\b(?:live in|living in|based in|moved to|reside in|located in))\s+([A-Z][a-z]+(?:\s[A-Z][a-z]+)?)(?:,\s*([A-Z]{2}\b|[A-Z][a-z]+(?:\s[A-Z][a-z]+)?))?",
    )
    .expect("valid live in regex")
});

/// Titles with weak cues must look like an occupation, not a mood
const TITLE_WORDS: &[&str] = &[
    "engineer", "manager", "director", "developer", "analyst", "instructor", "professor", "nurse",
    "doctor", "physician", "lawyer", "attorney", "accountant", "consultant", "designer",
    "architect", "officer", "executive", "administrator", "assistant", "specialist", "scientist",
    "technician", "salesman", "representative", "owner", "partner", "president", "supervisor",
    "coordinator", "pharmacist", "dentist", "electrician", "plumber", "contractor", "writer",
    "editor", "pilot", "chef", "clerk", "associate", "vp", "ceo", "cfo", "cto",
];

/// Capitalized words that start sentences rather than names
const STOPWORDS: &[&str] = &[
    "i", "i'm", "i've", "it", "it's", "yes", "yeah", "yep", "sure", "well", "okay", "ok", "oh", "so",
    "my", "the", "at", "in", "we", "our", "hi", "hello", "thanks", "thank", "um", "uh", "just",
    "that", "that's", "actually", "absolutely", "of", "course", "and", "but", "currently", "right",
];

const HONORIFICS: &[&str] = &["mr", "mrs", "ms", "miss", "dr"];

const CONNECTIVES: &[&str] = &["of", "and", "&"];

/// How a run of capitalized words is searched for
#[derive(Debug, Clone, Copy)]
struct RunRules {
    /// The run must start at the first word
    anchored: bool,
    /// Allow "of", "and" and "&" between capitalized words
    connectives: bool,
    /// Allow digits inside words ("3M", "7-Eleven")
    digits: bool,
    max_words: usize,
}

const PERSON: RunRules = RunRules {
    anchored: true,
    connectives: false,
    digits: false,
    max_words: 4,
};

const ORGANIZATION: RunRules = RunRules {
    anchored: true,
    connectives: true,
    digits: true,
    max_words: 6,
};

/// Proper-noun extractor for names, employer, job title and address parts
pub struct EntityExtractor {
    skip_initiator: bool,
    confidence: f64,
}

impl EntityExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            skip_initiator: config.skip_initiator_responses,
            confidence: config.entity_confidence,
        }
    }

    /// Confidence of the derived first/last name parts
    fn part_confidence(&self) -> f64 {
        (self.confidence - 0.05).max(0.0)
    }

    fn names(&self, question: &str, response: &str, out: &mut Vec<Proposed>) {
        let asked = has_cue(FieldId::Name, question);

        let mut run = RE_NAME_CUE
            .find(response)
            .map(|m| (capitalized_run(&response[m.end()..], PERSON), "name_intro"))
            .filter(|(words, _)| !words.is_empty());

        if run.is_none() && asked {
            run = RE_NAME_WEAK_CUE
                .find(response)
                .map(|m| (capitalized_run(&response[m.end()..], PERSON), "name_question"))
                .filter(|(words, _)| !words.is_empty());
        }

        if run.is_none() && asked {
            let unanchored = RunRules { anchored: false, ..PERSON };
            run = Some((capitalized_run(response, unanchored), "name_question"))
                .filter(|(words, _)| words.len() >= 2);
        }

        if let Some((words, cue)) = run {
            if words.len() >= 2 {
                out.push((FieldId::Name, words.join(" "), self.confidence, cue));
                out.push((FieldId::FirstName, words[0].clone(), self.part_confidence(), cue));
                out.push((FieldId::LastName, words[words.len() - 1].clone(), self.part_confidence(), cue));
            } else {
                out.push((FieldId::FirstName, words[0].clone(), self.part_confidence(), cue));
            }
            return;
        }

        // Direct questions for one part of the name
        let loose = RunRules {
            anchored: false,
            max_words: 1,
            ..PERSON
        };
        for (field, asked) in [
            (FieldId::FirstName, has_cue(FieldId::FirstName, question)),
            (FieldId::LastName, has_cue(FieldId::LastName, question)),
        ] {
            if asked && let Some(word) = capitalized_run(response, loose).into_iter().next() {
                out.push((field, word, self.confidence, "name_part_question"));
            }
        }
    }

    fn employment(&self, question: &str, response: &str, out: &mut Vec<Proposed>) {
        let mut employer_found = false;

        if let Some(m) = RE_EMPLOYER_CUE.find(response) {
            let words = capitalized_run(&response[m.end()..], ORGANIZATION);
            if !words.is_empty() {
                out.push((FieldId::Employer, words.join(" "), self.confidence, "employer_intro"));
                employer_found = true;
            }
        }

        let title_asked = has_cue(FieldId::JobTitle, question)
            || has_cue(FieldId::Employer, question)
            || has_cue(FieldId::EmploymentStatus, question);

        for caps in RE_TITLE_CUE.captures_iter(response) {
            let (Some(cue), Some(title)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let cue_text = cue.as_str().to_lowercase();
            let strong = cue_text.starts_with("work") || (cue_text.ends_with(" is") && cue_text != "job is");
            let title_text = title.as_str().trim();
            if !(strong || (title_asked && looks_like_title(title_text))) {
                continue;
            }

            out.push((FieldId::JobTitle, title_text.to_string(), self.confidence, "title_intro"));

            // "a software engineer at Acme Corp"
            let rest = &response[title.end()..];
            let rest = rest.trim_start();
            let lower = rest.to_lowercase();
            if !employer_found
                && let Some(prep) = ["at ", "for ", "with "].iter().find(|p| lower.starts_with(**p))
            {
                let words = capitalized_run(&rest[prep.len()..], ORGANIZATION);
                if !words.is_empty() {
                    out.push((FieldId::Employer, words.join(" "), self.confidence, "title_intro"));
                    employer_found = true;
                }
            }
            break;
        }

        if !employer_found && has_cue(FieldId::Employer, question) {
            let unanchored = RunRules {
                anchored: false,
                ..ORGANIZATION
            };
            let words = capitalized_run(response, unanchored);
            if !words.is_empty() {
                out.push((FieldId::Employer, words.join(" "), self.confidence, "employer_question"));
            }
        }
    }

    fn address(&self, question: &str, response: &str, out: &mut Vec<Proposed>) {
        let mut city_found = false;

        if let Some(m) = RE_STREET.find(response) {
            out.push((FieldId::StreetAddress, m.as_str().to_string(), self.confidence, "street"));

            if let Some(caps) = RE_CITY_STATE_TAIL.captures(&response[m.end()..]) {
                if let Some(city) = caps.get(1) {
                    out.push((FieldId::City, city.as_str().to_string(), self.confidence, "street"));
                    city_found = true;
                }
                if let Some(state) = caps.get(2) {
                    out.push((FieldId::State, state.as_str().to_string(), self.confidence, "street"));
                }
            }
        }

        if !city_found && let Some(caps) = RE_LIVE_IN.captures(response) {
            if let Some(place) = caps.get(1) {
                let place = place.as_str();
                if is_state_name(place) {
                    out.push((FieldId::State, place.to_string(), self.confidence, "live_in"));
                } else {
                    out.push((FieldId::City, place.to_string(), self.confidence, "live_in"));
                    city_found = true;
                }
            }
            if let Some(state) = caps.get(2) {
                out.push((FieldId::State, state.as_str().to_string(), self.confidence, "live_in"));
            }
        }

        if !city_found && has_cue(FieldId::City, question) && !has_cue(FieldId::StreetAddress, question) {
            let rules = RunRules {
                anchored: false,
                max_words: 2,
                ..PERSON
            };
            let words = capitalized_run(response, rules);
            if !words.is_empty() {
                let place = words.join(" ");
                if !is_state_name(&place) {
                    out.push((FieldId::City, place, self.confidence, "city_question"));
                }
            }
        }

        if has_cue(FieldId::State, question) {
            let rules = RunRules {
                anchored: false,
                max_words: 2,
                ..PERSON
            };
            let words = capitalized_run(response, rules);
            let place = words.join(" ");
            if is_state_name(&place) {
                out.push((FieldId::State, place, self.confidence, "state_question"));
            }
        }
    }
}

type Proposed = (FieldId, String, f64, &'static str);

impl FieldExtractor for EntityExtractor {
    fn strategy(&self) -> Strategy {
        Strategy::Entity
    }

    fn propose(&self, turn: &DialogueTurn) -> Vec<FieldProposal> {
        if !is_scannable(turn, self.skip_initiator) {
            return vec![];
        }

        let question = turn.prompt_text();
        let response = turn.response_text();
        let mut found = Vec::new();

        self.names(question, response, &mut found);
        self.employment(question, response, &mut found);
        self.address(question, response, &mut found);

        let proposals = found
            .into_iter()
            .map(|(field, value, confidence, cue)| {
                FieldProposal::new(field, value, confidence, ProposalSource::Entity { cue }, turn.index)
            })
            .collect();

        dedupe(proposals)
    }
}

fn looks_like_title(title: &str) -> bool {
    title
        .split(|c: char| c.is_whitespace() || c == '-')
        .any(|w| TITLE_WORDS.contains(&w.to_lowercase().as_str()))
}

fn is_state_name(place: &str) -> bool {
    let lower = place.to_lowercase();
    US_STATES.iter().any(|(code, name)| *name == lower || *code == place)
}

/// Collect the first run of capitalized words in `text`
fn capitalized_run(text: &str, rules: RunRules) -> Vec<String> {
    let mut run: Vec<String> = Vec::new();
    let mut pending: Vec<String> = Vec::new();

    for raw in text.split_whitespace() {
        let word = raw.trim_start_matches(['"', '(', '\'']);
        let core = word.trim_end_matches(['.', ',', ';', ':', '!', '?', '"', ')']);
        let ends_clause = core.len() != word.len();
        let lower = core.to_lowercase();

        if run.is_empty() && HONORIFICS.contains(&lower.as_str()) {
            continue;
        }
        if run.is_empty() && rules.anchored && lower == "the" {
            continue;
        }

        if is_capitalized(core, rules.digits) && !STOPWORDS.contains(&lower.as_str()) {
            run.append(&mut pending);
            run.push(core.to_string());
            if ends_clause || run.len() >= rules.max_words {
                break;
            }
            continue;
        }

        if !run.is_empty() {
            if rules.connectives && !ends_clause && CONNECTIVES.contains(&lower.as_str()) {
                pending.push(core.to_string());
                continue;
            }
            break;
        }
        if rules.anchored {
            break;
        }
    }

    run.truncate(rules.max_words);
    run
}

fn is_capitalized(word: &str, digits: bool) -> bool {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let first_ok = first.is_uppercase() || (digits && first.is_ascii_digit());
    first_ok
        && word.chars().any(|c| c.is_alphabetic())
        && chars.all(|c| c.is_alphabetic() || matches!(c, '\'' | '-' | '&' | '.') || (digits && c.is_ascii_digit()))
}

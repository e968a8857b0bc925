use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::context::{clause_around, has_cue, money_field};
use super::{ExtractorConfig, FieldExtractor, Token, dedupe, is_scannable, tokenize};
use crate::models::{DialogueTurn, FieldId, FieldProposal, ProposalSource, Strategy, parse_amount};

static RE_NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[/.-](\d{1,2})[/.-](\d{4})\b").expect("valid numeric date regex")
});

static RE_ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid iso date regex"));

static RE_MONTH_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b",
    )
    .expect("valid month first regex")
});

static RE_DAY_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+(?:of\s+)?(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?,?\s+(\d{4})\b",
    )
    .expect("valid day first regex")
});

const MONTHS: [&str; 12] = ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];

const UNITS: &[(&str, u64)] = &[
    ("zero", 0),
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("thirteen", 13),
    ("fourteen", 14),
    ("fifteen", 15),
    ("sixteen", 16),
    ("seventeen", 17),
    ("eighteen", 18),
    ("nineteen", 19),
    ("twenty", 20),
    ("thirty", 30),
    ("forty", 40),
    ("fifty", 50),
    ("sixty", 60),
    ("seventy", 70),
    ("eighty", 80),
    ("ninety", 90),
];

/// Multipliers accepted after a number, spelled or abbreviated
const SCALES: &[(&str, f64)] = &[
    ("thousand", 1e3),
    ("grand", 1e3),
    ("k", 1e3),
    ("million", 1e6),
    ("m", 1e6),
    ("mm", 1e6),
    ("mil", 1e6),
    ("billion", 1e9),
    ("bn", 1e9),
];

/// Words after a number that make it something other than money
const NON_MONEY_UNITS: &[&str] = &[
    "year", "years", "yrs", "old", "percent", "kids", "children", "days", "months", "weeks", "times",
];

const KID_WORDS: &[&str] = &[
    "kids", "kid", "children", "child", "dependents", "dependent", "sons", "son", "daughters",
    "daughter", "boys", "girls",
];

/// A number found in the token stream
#[derive(Debug, Clone, PartialEq)]
struct ParsedNumber {
    value: f64,
    /// Byte offsets in the response text
    start: usize,
    end: usize,
    /// Index of the first token after the number
    next: usize,
    spelled: bool,
    scaled: bool,
    grouped: bool,
}

/// Number-aware extractor for money, birth dates, experience years and dependents
pub struct NumericExtractor {
    skip_initiator: bool,
}

impl NumericExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            skip_initiator: config.skip_initiator_responses,
        }
    }
}

type Proposed = (FieldId, String, f64, &'static str);

impl FieldExtractor for NumericExtractor {
    fn strategy(&self) -> Strategy {
        Strategy::Numeric
    }

    fn propose(&self, turn: &DialogueTurn) -> Vec<FieldProposal> {
        if !is_scannable(turn, self.skip_initiator) {
            return vec![];
        }

        let question = turn.prompt_text();
        let response = turn.response_text();
        let tokens = tokenize(response);
        let numbers = scan_numbers(&tokens);

        let mut found: Vec<Proposed> = Vec::new();
        money(question, response, &tokens, &numbers, &mut found);
        birth_dates(question, response, &mut found);
        experience(question, response, &tokens, &numbers, &mut found);
        dependents(question, response, &tokens, &numbers, &mut found);

        let proposals = found
            .into_iter()
            .map(|(field, value, confidence, context)| {
                FieldProposal::new(field, value, confidence, ProposalSource::Numeric { context }, turn.index)
            })
            .collect();

        dedupe(proposals)
    }
}

fn money(question: &str, response: &str, tokens: &[Token<'_>], numbers: &[ParsedNumber], out: &mut Vec<Proposed>) {
    for n in numbers {
        let dollar = response[..n.start].trim_end().ends_with('$');

        // Plain "$95,000" is an exact grammar match for the pattern extractor
        if dollar && !n.scaled && !n.spelled {
            continue;
        }
        if touches_separator(response, n) || followed_by(tokens, n, NON_MONEY_UNITS) {
            continue;
        }
        if response[n.end..].starts_with('%') {
            continue;
        }
        let year_like = !n.spelled && !n.scaled && !n.grouped && (1900.0..=2100.0).contains(&n.value);
        if year_like && !dollar {
            continue;
        }
        if n.value < 1000.0 {
            continue;
        }

        let clause = clause_around(response, n.start);
        let Some(field) = money_field(question, clause) else {
            continue;
        };

        let confidence = if n.spelled { 0.75 } else { 0.85 };
        out.push((field, format_number(n.value), confidence, "money"));
    }
}

fn birth_dates(question: &str, response: &str, out: &mut Vec<Proposed>) {
    if !has_cue(FieldId::DateOfBirth, question) && !has_cue(FieldId::DateOfBirth, response) {
        return;
    }

    let parts = |caps: &Captures<'_>, y: usize, m: usize, d: usize| -> Option<(u32, u32, i32)> {
        Some((
            caps.get(m)?.as_str().parse().ok()?,
            caps.get(d)?.as_str().parse().ok()?,
            caps.get(y)?.as_str().parse().ok()?,
        ))
    };

    let mut dates = Vec::new();
    for caps in RE_NUMERIC_DATE.captures_iter(response) {
        dates.extend(parts(&caps, 3, 1, 2));
    }
    for caps in RE_ISO_DATE.captures_iter(response) {
        dates.extend(parts(&caps, 1, 2, 3));
    }
    for caps in RE_MONTH_FIRST.captures_iter(response) {
        if let (Some(month), Some(day), Some(year)) = (
            caps.get(1).and_then(|m| month_number(m.as_str())),
            caps.get(2).and_then(|d| d.as_str().parse().ok()),
            caps.get(3).and_then(|y| y.as_str().parse().ok()),
        ) {
            dates.push((month, day, year));
        }
    }
    for caps in RE_DAY_FIRST.captures_iter(response) {
        if let (Some(day), Some(month), Some(year)) = (
            caps.get(1).and_then(|d| d.as_str().parse().ok()),
            caps.get(2).and_then(|m| month_number(m.as_str())),
            caps.get(3).and_then(|y| y.as_str().parse().ok()),
        ) {
            dates.push((month, day, year));
        }
    }

    for (month, day, year) in dates {
        // Out-of-range parts are left for the validator to reject
        out.push((
            FieldId::DateOfBirth,
            format!("{:04}-{:02}-{:02}", year, month, day),
            0.9,
            "date_of_birth",
        ));
    }
}

fn experience(question: &str, response: &str, tokens: &[Token<'_>], numbers: &[ParsedNumber], out: &mut Vec<Proposed>) {
    let asked = has_cue(FieldId::InvestmentExperienceYears, question);

    for n in numbers {
        if !followed_by(tokens, n, &["year", "years", "yrs"]) {
            continue;
        }
        if !asked && !has_cue(FieldId::InvestmentExperienceYears, clause_around(response, n.start)) {
            continue;
        }
        out.push((
            FieldId::InvestmentExperienceYears,
            format_number(n.value),
            0.8,
            "experience_years",
        ));
    }

    if asked {
        let lower: Vec<String> = tokens.iter().map(|t| t.lower()).collect();
        if lower.windows(2).any(|w| w[0] == "a" && w[1] == "decade") {
            out.push((FieldId::InvestmentExperienceYears, "10".to_string(), 0.8, "experience_years"));
        }
    }
}

fn dependents(question: &str, response: &str, tokens: &[Token<'_>], numbers: &[ParsedNumber], out: &mut Vec<Proposed>) {
    let asked = has_cue(FieldId::Dependents, question);
    let lower: Vec<String> = tokens.iter().map(|t| t.lower()).collect();
    let is_kid_word = |i: usize| lower.get(i).is_some_and(|w| KID_WORDS.contains(&w.as_str()));
    let mut found = false;

    for n in numbers {
        // "two kids", "3 young children"
        let counted = is_kid_word(n.next) || (is_kid_word(n.next + 1) && !tokens[n.next].is_numeric());
        let in_context = asked || has_cue(FieldId::Dependents, clause_around(response, n.start));
        if counted && in_context {
            out.push((FieldId::Dependents, format_number(n.value), 0.8, "dependents"));
            found = true;
        }
    }

    let none_answer = lower.iter().enumerate().any(|(i, w)| {
        ((w == "no" || w == "zero") && (is_kid_word(i + 1) || is_kid_word(i + 2))) || w == "none"
    });
    if !found && none_answer && (asked || lower.iter().any(|w| KID_WORDS.contains(&w.as_str()))) {
        out.push((FieldId::Dependents, "0".to_string(), 0.8, "dependents"));
        found = true;
    }

    // A bare count answering the question: "Two." or "We have 3."
    if !found && asked && numbers.len() == 1 && !followed_by(tokens, &numbers[0], NON_MONEY_UNITS) {
        out.push((FieldId::Dependents, format_number(numbers[0].value), 0.8, "dependents"));
    }
}

/// Read every number in the token stream, digits or spelled out
fn scan_numbers(tokens: &[Token<'_>]) -> Vec<ParsedNumber> {
    let mut numbers = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match read_number(tokens, i) {
            Some(n) => {
                i = n.next;
                numbers.push(n);
            }
            None => i += 1,
        }
    }
    numbers
}

fn read_number(tokens: &[Token<'_>], i: usize) -> Option<ParsedNumber> {
    let token = tokens.get(i)?;

    if token.is_numeric() {
        let mut value = parse_amount(token.text)?;
        let mut next = i + 1;
        let mut scaled = false;
        if let Some(scale) = tokens.get(next).and_then(|t| scale_of(&t.lower())) {
            value *= scale;
            next += 1;
            scaled = true;
        }
        return Some(ParsedNumber {
            value,
            start: token.start,
            end: tokens[next - 1].end,
            next,
            spelled: false,
            scaled,
            grouped: token.text.contains(','),
        });
    }

    read_spelled(tokens, i)
}

/// Parse a run of number words such as "a hundred and fifty thousand"
fn read_spelled(tokens: &[Token<'_>], i: usize) -> Option<ParsedNumber> {
    let mut total = 0.0;
    let mut current = 0.0;
    let mut seen_digit_word = false;
    let mut scaled = false;
    let mut j = i;

    while let Some(token) = tokens.get(j) {
        let word = token.lower();
        let next_is_number = tokens
            .get(j + 1)
            .is_some_and(|t| is_number_word(&t.lower()) || scale_of(&t.lower()).is_some());

        if let Some(v) = unit_of(&word) {
            current += v as f64;
            seen_digit_word = true;
        } else if word == "hundred" && (seen_digit_word || j > i) {
            current = if current == 0.0 { 100.0 } else { current * 100.0 };
            seen_digit_word = true;
        } else if let Some(scale) = scale_of(&word).filter(|_| j > i && word.len() > 2) {
            total += if current == 0.0 { scale } else { current * scale };
            current = 0.0;
            scaled = true;
            seen_digit_word = true;
        } else if word == "a" && j == i && next_is_number {
            // "a hundred", "a million"
            current = 1.0;
        } else if !(word == "and" && j > i && seen_digit_word && next_is_number) {
            break;
        }
        j += 1;
    }

    if !seen_digit_word {
        return None;
    }

    Some(ParsedNumber {
        value: total + current,
        start: tokens[i].start,
        end: tokens[j - 1].end,
        next: j,
        spelled: true,
        scaled,
        grouped: false,
    })
}

fn unit_of(word: &str) -> Option<u64> {
    UNITS.iter().find(|(w, _)| *w == word).map(|(_, v)| *v)
}

fn scale_of(word: &str) -> Option<f64> {
    SCALES.iter().find(|(w, _)| *w == word).map(|(_, v)| *v)
}

fn is_number_word(word: &str) -> bool {
    unit_of(word).is_some() || word == "hundred"
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.to_lowercase().chars().take(3).collect();
    MONTHS.iter().position(|m| *m == prefix).map(|i| i as u32 + 1)
}

fn followed_by(tokens: &[Token<'_>], n: &ParsedNumber, words: &[&str]) -> bool {
    tokens
        .get(n.next)
        .is_some_and(|t| words.contains(&t.lower().as_str()))
}

/// Numbers glued to '-' or '/' belong to phone numbers and dates
fn touches_separator(text: &str, n: &ParsedNumber) -> bool {
    let before = text[..n.start].chars().next_back();
    let after = text[n.end..].chars().next();
    matches!(before, Some('-' | '/')) || matches!(after, Some('-' | '/'))
}

/// Whole amounts print without a fraction so they read like "95000"
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Speaker, Utterance};

    fn propose(question: &str, answer: &str) -> Vec<FieldProposal> {
        let turn = DialogueTurn::qa(
            3,
            Utterance::new(Speaker::Initiator, question, 0, true),
            Utterance::new(Speaker::Respondent, answer, 1, false),
        );
        NumericExtractor::new(&ExtractorConfig::default()).propose(&turn)
    }

    fn find(proposals: &[FieldProposal], field: FieldId) -> Option<&FieldProposal> {
        proposals.iter().find(|p| p.field == field)
    }

    #[test]
    fn test_scaled_money() {
        let proposals = propose("What's your net worth?", "Around $2.5 million.");
        let p = find(&proposals, FieldId::NetWorth).unwrap();
        assert_eq!(p.value, "2500000");
        assert_eq!(p.confidence, 0.85);
        assert_eq!(p.turn_index, 3);

        let proposals = propose("And your salary?", "About 95k a year.");
        assert_eq!(find(&proposals, FieldId::AnnualIncome).unwrap().value, "95000");
    }

    #[test]
    fn test_spelled_money() {
        let proposals = propose("What's your annual income?", "A hundred and fifty thousand.");
        let p = find(&proposals, FieldId::AnnualIncome).unwrap();
        assert_eq!(p.value, "150000");
        assert_eq!(p.confidence, 0.75);
    }

    #[test]
    fn test_plain_dollar_amount_left_to_pattern() {
        let proposals = propose("What's your annual income?", "$95,000.");
        assert!(find(&proposals, FieldId::AnnualIncome).is_none());

        let proposals = propose("What's your annual income?", "95,000 or so.");
        assert_eq!(find(&proposals, FieldId::AnnualIncome).unwrap().value, "95000");
    }

    #[test]
    fn test_years_and_phone_numbers_are_not_money() {
        assert!(propose("What's your income?", "Since 2015 it's been steady.").is_empty());
        assert!(propose("What's your income?", "Call 555-123-4567.").is_empty());
    }

    #[test]
    fn test_birth_dates() {
        for answer in ["03/15/1985", "March 15th, 1985", "15 March 1985", "1985-03-15"] {
            let proposals = propose("What's your date of birth?", answer);
            assert_eq!(find(&proposals, FieldId::DateOfBirth).unwrap().value, "1985-03-15", "{}", answer);
        }

        assert!(propose("What's your favourite day?", "03/15/1985").is_empty());
    }

    #[test]
    fn test_experience_years() {
        let proposals = propose("How long have you been investing?", "About twelve years now.");
        assert_eq!(find(&proposals, FieldId::InvestmentExperienceYears).unwrap().value, "12");

        let proposals = propose("How long have you been investing?", "A decade, give or take.");
        assert_eq!(find(&proposals, FieldId::InvestmentExperienceYears).unwrap().value, "10");
    }

    #[test]
    fn test_dependents() {
        let proposals = propose("Any dependents?", "Yes, two kids.");
        assert_eq!(find(&proposals, FieldId::Dependents).unwrap().value, "2");

        let proposals = propose("Do you have children?", "No, none.");
        assert_eq!(find(&proposals, FieldId::Dependents).unwrap().value, "0");

        let proposals = propose("How many dependents do you have?", "Three.");
        assert_eq!(find(&proposals, FieldId::Dependents).unwrap().value, "3");
    }

    #[test]
    fn test_read_spelled_numbers() {
        let tokens = tokenize("twenty five thousand");
        assert_eq!(read_spelled(&tokens, 0).unwrap().value, 25_000.0);

        let tokens = tokenize("a few");
        assert!(read_spelled(&tokens, 0).is_none());
    }
}

use std::sync::LazyLock;

use regex::Regex;

use crate::models::FieldId;

/// Phrases that indicate a question or clause is about a field
const FIELD_CUES: &[(FieldId, &str)] = &[
    (FieldId::Name, r"your name|full name|legal name|who am i speaking|what should i call you|my name|name is"),
    (FieldId::FirstName, r"first name|given name"),
    (FieldId::LastName, r"last name|surname|family name"),
    (FieldId::DateOfBirth, r"date of birth|birth ?date|birthday|when were you born|born"),
    (FieldId::Ssn, r"social security|ssn|tax id"),
    (FieldId::Phone, r"phone|telephone|contact number|reach you|number to call|cell|mobile"),
    (FieldId::Email, r"e-?mail"),
    (FieldId::MaritalStatus, r"marital|married|single|spouse|partner|wife|husband|divorced|widowed"),
    (FieldId::Dependents, r"dependents?|children|kids"),
    (FieldId::StreetAddress, r"address|where do you live|live at|street|reside"),
    (FieldId::City, r"city|town|where do you live|live in"),
    (FieldId::State, r"state"),
    (FieldId::ZipCode, r"zip|postal"),
    (FieldId::EmploymentStatus, r"employment|employed|work|working|job|occupation|retired|career"),
    (FieldId::Employer, r"employer|where do you work|company|work for|work at"),
    (FieldId::JobTitle, r"job title|position|role|what do you do|occupation|title"),
    (FieldId::AnnualIncome, r"income|salary|earn|earnings|make a year|how much do you make|per year|a year|annually|annual"),
    (FieldId::NetWorth, r"net worth|total assets|worth|wealth"),
    (FieldId::LiquidNetWorth, r"liquid|cash|savings"),
    (FieldId::RiskTolerance, r"risk|volatility|ups and downs|market swings"),
    (FieldId::InvestmentObjective, r"objective|goal|looking to achieve|hoping to achieve|purpose|priority"),
    (FieldId::InvestmentExperienceYears, r"experience|been investing|investing for|how long have you"),
    (FieldId::TimeHorizon, r"time horizon|horizon|timeframe|time frame|when will you need|how long do you plan"),
];

static CUE_REGEXES: LazyLock<Vec<(FieldId, Regex)>> = LazyLock::new(|| {
    FIELD_CUES
        .iter()
        .map(|(field, pattern)| {
            let regex = Regex::new(&format!(r"(?i)\b(?:{})\b", pattern)).expect("valid cue regex");
            (*field, regex)
        })
        .collect()
});

static RE_CLAUSE_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[.;!?](?:\s|$)|,\s|\s(?:and|but|while|plus|whereas)\s").expect("valid clause regex")
});

fn cue_regex(field: FieldId) -> Option<&'static Regex> {
    CUE_REGEXES.iter().find(|(f, _)| *f == field).map(|(_, r)| r)
}

/// Whether the text mentions one of the field's cue phrases
pub fn has_cue(field: FieldId, text: &str) -> bool {
    cue_regex(field).is_some_and(|r| r.is_match(text))
}

/// All fields cued in the text, in enumeration order
pub fn cued_fields(text: &str) -> Vec<FieldId> {
    CUE_REGEXES
        .iter()
        .filter(|(_, r)| r.is_match(text))
        .map(|(f, _)| *f)
        .collect()
}

/// Byte range of the clause containing `offset`
pub fn clause_bounds(text: &str, offset: usize) -> (usize, usize) {
    let mut start = 0;
    for m in RE_CLAUSE_BREAK.find_iter(text) {
        if m.start() >= offset {
            return (start, m.start());
        }
        if m.end() > offset {
            // The offset sits inside the break itself
            return (start, m.end());
        }
        start = m.end();
    }
    (start, text.len())
}

/// The clause of `text` containing `offset`
pub fn clause_around(text: &str, offset: usize) -> &str {
    let (start, end) = clause_bounds(text, offset);
    &text[start..end]
}

/// Money fields in order of specificity: "liquid net worth" must not be read as net worth
const MONEY_FIELDS: [FieldId; 3] = [FieldId::LiquidNetWorth, FieldId::NetWorth, FieldId::AnnualIncome];

/// Decide which money field an amount belongs to
///
/// The clause around the amount wins over the question; neither cued means
/// the amount is not routed anywhere.
pub fn money_field(question: &str, clause: &str) -> Option<FieldId> {
    MONEY_FIELDS
        .iter()
        .copied()
        .find(|f| has_cue(*f, clause))
        .or_else(|| MONEY_FIELDS.iter().copied().find(|f| has_cue(*f, question)))
}

/// Where a field's context came from; question context is the stronger signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    Question,
    Response,
}

pub fn field_context(field: FieldId, question: &str, response: &str) -> Option<ContextSource> {
    if has_cue(field, question) {
        Some(ContextSource::Question)
    } else if has_cue(field, response) {
        Some(ContextSource::Response)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cued_fields() {
        let fields = cued_fields("How would you describe your risk tolerance?");
        assert_eq!(fields, vec![FieldId::RiskTolerance]);

        assert!(has_cue(FieldId::Email, "What's your e-mail?"));
        assert!(!has_cue(FieldId::Email, "What's your phone?"));
    }

    #[test]
    fn test_clause_around() {
        let text = "I make $95,000 a year and my net worth is about $500,000.";
        let first = text.find("$95").unwrap();
        let second = text.find("$500").unwrap();

        assert_eq!(clause_around(text, first), "I make $95,000 a year");
        assert_eq!(clause_around(text, second), "my net worth is about $500,000");
    }

    #[test]
    fn test_money_field_prefers_specific_cue() {
        assert_eq!(
            money_field("", "my liquid net worth is about $200,000"),
            Some(FieldId::LiquidNetWorth)
        );
        assert_eq!(money_field("", "my net worth is $1,000,000"), Some(FieldId::NetWorth));
        assert_eq!(
            money_field("What is your annual income?", "about $95,000"),
            Some(FieldId::AnnualIncome)
        );
        assert_eq!(money_field("How are you?", "about $95,000"), None);
    }
}

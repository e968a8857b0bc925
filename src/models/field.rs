use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

static RE_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$").expect("valid email regex")
});

static RE_ZIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(?:-\d{4})?$").expect("valid zip regex"));

static RE_PERSON_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z'.\-]*(?: [A-Za-z][A-Za-z'.\-]*){0,4}$")
        .expect("valid person name regex")
});

/// Date layouts accepted for calendar dates
/// Largest amount accepted; keeps cent arithmetic exact and JSON numbers plain
const MAX_AMOUNT: f64 = 1e15;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%d %B %Y",
];

/// US state and territory codes with their full names
pub const US_STATES: &[(&str, &str)] = &[
    ("AL", "alabama"),
    ("AK", "alaska"),
    ("AZ", "arizona"),
    ("AR", "arkansas"),
    ("CA", "california"),
    ("CO", "colorado"),
    ("CT", "connecticut"),
    ("DE", "delaware"),
    ("DC", "district of columbia"),
    ("FL", "florida"),
    ("GA", "georgia"),
    ("HI", "hawaii"),
    ("ID", "idaho"),
    ("IL", "illinois"),
    ("IN", "indiana"),
    ("IA", "iowa"),
    ("KS", "kansas"),
    ("KY", "kentucky"),
    ("LA", "louisiana"),
    ("ME", "maine"),
    ("MD", "maryland"),
    ("MA", "massachusetts"),
    ("MI", "michigan"),
    ("MN", "minnesota"),
    ("MS", "mississippi"),
    ("MO", "missouri"),
    ("MT", "montana"),
    ("NE", "nebraska"),
    ("NV", "nevada"),
    ("NH", "new hampshire"),
    ("NJ", "new jersey"),
    ("NM", "new mexico"),
    ("NY", "new york"),
    ("NC", "north carolina"),
    ("ND", "north dakota"),
    ("OH", "ohio"),
    ("OK", "oklahoma"),
    ("OR", "oregon"),
    ("PA", "pennsylvania"),
    ("RI", "rhode island"),
    ("SC", "south carolina"),
    ("SD", "south dakota"),
    ("TN", "tennessee"),
    ("TX", "texas"),
    ("UT", "utah"),
    ("VT", "vermont"),
    ("VA", "virginia"),
    ("WA", "washington"),
    ("WV", "west virginia"),
    ("WI", "wisconsin"),
    ("WY", "wyoming"),
];

/// Known fields of the KYC record
///
/// The enumeration is closed: extractors can only propose values for these
/// ids, and each id carries its own value kind and validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldId {
    Name,
    FirstName,
    LastName,
    DateOfBirth,
    Ssn,
    Phone,
    Email,
    MaritalStatus,
    Dependents,
    StreetAddress,
    City,
    State,
    ZipCode,
    EmploymentStatus,
    Employer,
    JobTitle,
    AnnualIncome,
    NetWorth,
    LiquidNetWorth,
    RiskTolerance,
    InvestmentObjective,
    InvestmentExperienceYears,
    TimeHorizon,
}

/// Grammar a field value must satisfy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    PersonName,
    Email,
    Phone,
    Ssn,
    ZipCode,
    StateCode,
    Choice(&'static [&'static str]),
    Amount,
    Date,
    Count { max: u32 },
}

const MARITAL_OPTIONS: &[&str] = &["single", "married", "divorced", "widowed", "separated"];
const EMPLOYMENT_OPTIONS: &[&str] = &["employed", "self_employed", "unemployed", "retired", "student"];
const RISK_OPTIONS: &[&str] = &["conservative", "moderate", "aggressive", "very_aggressive"];
const OBJECTIVE_OPTIONS: &[&str] = &["growth", "income", "preservation", "speculation", "balanced"];
const HORIZON_OPTIONS: &[&str] = &["short_term", "medium_term", "long_term"];

impl FieldId {
    pub const ALL: [FieldId; 23] = [
        FieldId::Name,
        FieldId::FirstName,
        FieldId::LastName,
        FieldId::DateOfBirth,
        FieldId::Ssn,
        FieldId::Phone,
        FieldId::Email,
        FieldId::MaritalStatus,
        FieldId::Dependents,
        FieldId::StreetAddress,
        FieldId::City,
        FieldId::State,
        FieldId::ZipCode,
        FieldId::EmploymentStatus,
        FieldId::Employer,
        FieldId::JobTitle,
        FieldId::AnnualIncome,
        FieldId::NetWorth,
        FieldId::LiquidNetWorth,
        FieldId::RiskTolerance,
        FieldId::InvestmentObjective,
        FieldId::InvestmentExperienceYears,
        FieldId::TimeHorizon,
    ];

    /// Stable identifier used in JSON artifacts
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldId::Name => "name",
            FieldId::FirstName => "first_name",
            FieldId::LastName => "last_name",
            FieldId::DateOfBirth => "date_of_birth",
            FieldId::Ssn => "ssn",
            FieldId::Phone => "phone",
            FieldId::Email => "email",
            FieldId::MaritalStatus => "marital_status",
            FieldId::Dependents => "dependents",
            FieldId::StreetAddress => "street_address",
            FieldId::City => "city",
            FieldId::State => "state",
            FieldId::ZipCode => "zip_code",
            FieldId::EmploymentStatus => "employment_status",
            FieldId::Employer => "employer",
            FieldId::JobTitle => "job_title",
            FieldId::AnnualIncome => "annual_income",
            FieldId::NetWorth => "net_worth",
            FieldId::LiquidNetWorth => "liquid_net_worth",
            FieldId::RiskTolerance => "risk_tolerance",
            FieldId::InvestmentObjective => "investment_objective",
            FieldId::InvestmentExperienceYears => "investment_experience_years",
            FieldId::TimeHorizon => "time_horizon",
        }
    }

    /// Whether the field counts toward the completion percentage
    pub fn is_required(&self) -> bool {
        matches!(
            self,
            FieldId::Name
                | FieldId::DateOfBirth
                | FieldId::Phone
                | FieldId::Email
                | FieldId::StreetAddress
                | FieldId::EmploymentStatus
                | FieldId::AnnualIncome
                | FieldId::NetWorth
                | FieldId::RiskTolerance
                | FieldId::InvestmentObjective
        )
    }

    /// All fields that count toward completion
    pub fn required() -> impl Iterator<Item = FieldId> {
        Self::ALL.into_iter().filter(|f| f.is_required())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            FieldId::Name | FieldId::FirstName | FieldId::LastName => ValueKind::PersonName,
            FieldId::DateOfBirth => ValueKind::Date,
            FieldId::Ssn => ValueKind::Ssn,
            FieldId::Phone => ValueKind::Phone,
            FieldId::Email => ValueKind::Email,
            FieldId::MaritalStatus => ValueKind::Choice(MARITAL_OPTIONS),
            FieldId::Dependents => ValueKind::Count { max: 20 },
            FieldId::StreetAddress | FieldId::City | FieldId::Employer | FieldId::JobTitle => {
                ValueKind::Text
            }
            FieldId::State => ValueKind::StateCode,
            FieldId::ZipCode => ValueKind::ZipCode,
            FieldId::EmploymentStatus => ValueKind::Choice(EMPLOYMENT_OPTIONS),
            FieldId::AnnualIncome | FieldId::NetWorth | FieldId::LiquidNetWorth => ValueKind::Amount,
            FieldId::RiskTolerance => ValueKind::Choice(RISK_OPTIONS),
            FieldId::InvestmentObjective => ValueKind::Choice(OBJECTIVE_OPTIONS),
            FieldId::InvestmentExperienceYears => ValueKind::Count { max: 80 },
            FieldId::TimeHorizon => ValueKind::Choice(HORIZON_OPTIONS),
        }
    }

    /// Acceptable document field spellings, already in normalized label form
    /// (lowercase words separated by single spaces)
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            FieldId::Name => &[
                "name",
                "full name",
                "full legal name",
                "legal name",
                "client name",
                "customer name",
                "applicant name",
                "account holder name",
            ],
            FieldId::FirstName => &["first name", "given name", "fname", "first"],
            FieldId::LastName => &["last name", "surname", "family name", "lname", "last"],
            FieldId::DateOfBirth => &["date of birth", "dob", "birth date", "birthdate", "birthday"],
            FieldId::Ssn => &["ssn", "social security number", "social security", "tax id", "tin"],
            FieldId::Phone => &[
                "phone",
                "phone number",
                "telephone",
                "telephone number",
                "mobile",
                "mobile number",
                "cell phone",
                "contact number",
            ],
            FieldId::Email => &["email", "email address", "e mail", "e mail address"],
            FieldId::MaritalStatus => &["marital status", "marital"],
            FieldId::Dependents => &["dependents", "number of dependents"],
            FieldId::StreetAddress => &[
                "address",
                "street address",
                "street",
                "home address",
                "residential address",
                "address line 1",
            ],
            FieldId::City => &["city", "town"],
            FieldId::State => &["state", "state province"],
            FieldId::ZipCode => &["zip", "zip code", "zipcode", "postal code"],
            FieldId::EmploymentStatus => &["employment status", "employment"],
            FieldId::Employer => &["employer", "employer name", "company", "company name"],
            FieldId::JobTitle => &["job title", "occupation", "position", "title"],
            FieldId::AnnualIncome => &["annual income", "income", "salary", "yearly income"],
            FieldId::NetWorth => &["net worth", "networth", "total net worth"],
            FieldId::LiquidNetWorth => &["liquid net worth", "liquid assets"],
            FieldId::RiskTolerance => &["risk tolerance", "risk", "risk profile"],
            FieldId::InvestmentObjective => &[
                "investment objective",
                "objective",
                "investment goal",
                "goal",
            ],
            FieldId::InvestmentExperienceYears => &[
                "investment experience",
                "years of experience",
                "years investing",
                "experience",
            ],
            FieldId::TimeHorizon => &["time horizon", "investment horizon", "horizon"],
        }
    }

    /// Validate and normalize a raw candidate value
    ///
    /// Returns `None` when the value does not satisfy the field's grammar.
    pub fn validate(&self, raw: &str) -> Option<FieldValue> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        match self.kind() {
            ValueKind::Text => validate_text(raw).map(FieldValue::Text),
            ValueKind::PersonName => {
                let text = validate_text(raw)?;
                RE_PERSON_NAME.is_match(&text).then_some(FieldValue::Text(text))
            }
            ValueKind::Email => {
                let email = raw.trim_end_matches('.').to_lowercase();
                RE_EMAIL.is_match(&email).then_some(FieldValue::Text(email))
            }
            ValueKind::Phone => validate_phone(raw).map(FieldValue::Text),
            ValueKind::Ssn => validate_ssn(raw).map(FieldValue::Text),
            ValueKind::ZipCode => RE_ZIP.is_match(raw).then(|| FieldValue::Text(raw.to_string())),
            ValueKind::StateCode => validate_state(raw).map(FieldValue::Text),
            ValueKind::Choice(options) => {
                let key = option_key(raw);
                options
                    .iter()
                    .find(|o| **o == key)
                    .map(|o| FieldValue::Choice(o.to_string()))
            }
            ValueKind::Amount => parse_amount(raw).map(FieldValue::Amount),
            ValueKind::Date => parse_date(raw)
                .filter(is_plausible_birth_date)
                .map(FieldValue::Date),
            ValueKind::Count { max } => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n <= max)
                .map(FieldValue::Count),
        }
    }

    /// Rebuild a validated value from its JSON representation
    pub fn value_from_json(&self, value: &serde_json::Value) -> Option<FieldValue> {
        match value {
            serde_json::Value::String(s) => self.validate(s),
            serde_json::Value::Number(n) => match self.kind() {
                ValueKind::Amount => n.as_f64().filter(|v| is_valid_amount(*v)).map(FieldValue::Amount),
                _ => self.validate(&n.to_string()),
            },
            _ => None,
        }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldId::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown field id: {}", s))
    }
}

/// A validated, typed field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Choice(String),
    Amount(f64),
    Date(NaiveDate),
    Count(u32),
}

impl FieldValue {
    /// Render for a document text field
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Choice(s) => s.replace('_', " "),
            FieldValue::Amount(a) => format_currency(*a),
            FieldValue::Date(d) => d.format("%m/%d/%Y").to_string(),
            FieldValue::Count(n) => n.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) | FieldValue::Choice(s) => f.write_str(s),
            FieldValue::Amount(a) => write!(f, "{}", a),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::Count(n) => write!(f, "{}", n),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(s) | FieldValue::Choice(s) => serializer.serialize_str(s),
            FieldValue::Amount(a) => serializer.serialize_f64(*a),
            FieldValue::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            FieldValue::Count(n) => serializer.serialize_u32(*n),
        }
    }
}

/// Trim, collapse whitespace and drop trailing punctuation
fn validate_text(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let text = collapsed
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'))
        .trim()
        .to_string();

    if text.is_empty() || text.len() > 120 || !text.chars().any(|c| c.is_alphabetic()) {
        return None;
    }
    Some(text)
}

fn validate_phone(raw: &str) -> Option<String> {
    if raw.chars().any(|c| c.is_alphabetic()) {
        return None;
    }
    let mut digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 11 && digits.starts_with('1') {
        digits.remove(0);
    }
    if digits.len() != 10 {
        return None;
    }
    Some(format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]))
}

fn validate_ssn(raw: &str) -> Option<String> {
    if raw.chars().any(|c| !(c.is_ascii_digit() || c == '-' || c == ' ')) {
        return None;
    }
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 9 {
        return None;
    }
    let (area, group, serial) = (&digits[..3], &digits[3..5], &digits[5..]);
    if area == "000" || area == "666" || group == "00" || serial == "0000" {
        return None;
    }
    Some(format!("{}-{}-{}", area, group, serial))
}

fn validate_state(raw: &str) -> Option<String> {
    let lower = raw.trim_end_matches('.').to_lowercase();
    US_STATES
        .iter()
        .find(|(code, name)| code.to_lowercase() == lower || *name == lower)
        .map(|(code, _)| code.to_string())
}

/// Lowercase and join words with underscores, so "Very Aggressive" and
/// "very-aggressive" both become "very_aggressive"
fn option_key(raw: &str) -> String {
    raw.to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Parse a non-negative currency amount such as `$95,000`, `95000` or `1,250.50`
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|v| is_valid_amount(*v))
}

fn is_valid_amount(amount: f64) -> bool {
    amount.is_finite() && (0.0..=MAX_AMOUNT).contains(&amount)
}

/// Parse a calendar date in any of the accepted layouts
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim().trim_end_matches('.');
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn is_plausible_birth_date(date: &NaiveDate) -> bool {
    date.year() >= 1900 && *date <= Local::now().date_naive()
}

/// Format an amount as `$95,000.00`
pub fn format_currency(amount: f64) -> String {
    let cents = (amount * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("${}.{:02}", grouped, cents % 100)
}

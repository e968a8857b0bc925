use std::collections::VecDeque;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{DialogueTurn, Speaker, Utterance};

static RE_BRACKET_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\[(]\s*\d{1,2}:\d{2}(?::\d{2})?(?:\.\d+)?\s*[\])]").expect("valid timestamp regex")
});

static RE_LEADING_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d{1,2}:\d{2}(?::\d{2})?(?:\.\d+)?\s*(?:-\s*)?").expect("valid timestamp regex")
});

static RE_ARTIFACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[(?:inaudible|unclear|crosstalk|laughter|laughs|pause|silence|noise|indiscernible)\]")
        .expect("valid artifact regex")
});

static RE_REPEATED_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*,(?:\s*,)+").expect("valid comma regex"));

/// A recognizable speaker label prefix
#[derive(Debug, Clone)]
pub struct SpeakerPattern {
    /// Matches the label and its trailing colon at the start of a line
    regex: Regex,
    pub speaker: Speaker,
}

impl SpeakerPattern {
    /// Build a pattern from the label alternatives (without the colon)
    ///
    /// Use an inline `(?i:...)` group for case-insensitive labels.
    pub fn new(label_pattern: &str, speaker: Speaker) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!(r"^\s*({})\s*:\s*", label_pattern))?;
        Ok(Self { regex, speaker })
    }

    /// Returns the matched label and the remaining text
    fn split<'a>(&self, line: &'a str) -> Option<(&'a str, &'a str)> {
        let caps = self.regex.captures(line)?;
        let whole = caps.get(0)?;
        let label = caps.get(1)?.as_str();
        Some((label, &line[whole.end()..]))
    }
}

static DEFAULT_SPEAKER_PATTERNS: LazyLock<Vec<SpeakerPattern>> = LazyLock::new(|| {
    vec![
        SpeakerPattern::new(
            r"(?i:financial\s+advis[oe]r|advis[oe]r|fa|interviewer|planner|agent)",
            Speaker::Initiator,
        )
        .expect("valid initiator label pattern"),
        SpeakerPattern::new(
            r"(?i:client|customer|(?:mr|mrs|ms|miss|dr)\.?\s+[a-z][a-z'\-]*)",
            Speaker::Respondent,
        )
        .expect("valid respondent label pattern"),
        // Any other capitalized name used as a label
        SpeakerPattern::new(r"[A-Z][a-z]+(?:\s[A-Z][a-z]+)?", Speaker::Unknown)
            .expect("valid generic label pattern"),
    ]
});

/// Configuration for transcript segmentation
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Label patterns, tried in order; first match wins
    pub speaker_patterns: Vec<SpeakerPattern>,
    /// Filler words and phrases removed from utterance text
    pub filler_words: Vec<String>,
    /// Lead words that mark an utterance as a question
    pub question_leads: Vec<String>,
    /// Capitalized words that look like labels but never name a speaker
    pub non_speaker_labels: Vec<String>,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            speaker_patterns: DEFAULT_SPEAKER_PATTERNS.clone(),
            filler_words: ["um", "uh", "uhm", "umm", "ah", "er", "hmm", "mm", "you know"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            question_leads: [
                "is", "are", "do", "does", "can", "what", "when", "where", "how", "why",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            non_speaker_labels: ["address", "note", "notes", "email", "phone", "date", "subject", "re"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SegmenterConfig {
    fn match_label<'a>(&self, line: &'a str) -> Option<(Speaker, &'a str, &'a str)> {
        self.speaker_patterns.iter().find_map(|p| {
            let (label, rest) = p.split(line)?;
            if p.speaker == Speaker::Unknown && !self.is_generic_speaker(label, rest) {
                return None;
            }
            Some((p.speaker, label, rest))
        })
    }

    /// `Address: 42 Oak Street` is content, `Sarah: Hi` is a speaker
    fn is_generic_speaker(&self, label: &str, rest: &str) -> bool {
        !rest.starts_with(|c: char| c.is_ascii_digit())
            && !self.non_speaker_labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }

    fn filler_regex(&self) -> Option<Regex> {
        if self.filler_words.is_empty() {
            return None;
        }
        let alternatives = self
            .filler_words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"(?i)(?:,\s*)?\b(?:{})\b[,.]?\s*", alternatives)).ok()
    }

    /// Trailing `?` or an interrogative lead word
    pub fn is_question(&self, text: &str) -> bool {
        let trimmed = text.trim_end_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'');
        if trimmed.ends_with('?') {
            return true;
        }

        let first = trimmed
            .split_whitespace()
            .next()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .unwrap_or_default();
        self.question_leads.iter().any(|lead| *lead == first)
    }
}

/// Utterance under construction, before continuation lines are complete
struct PendingUtterance {
    speaker: Speaker,
    /// Identity used to decide whether two utterances come from different people
    voice: String,
    text: String,
}

/// Perform Stage 0: split a raw transcript into dialogue turns
///
/// 1. Strips timestamps, bracketed artifacts and filler words
/// 2. Attributes each line to a speaker (unlabeled lines continue the previous utterance)
/// 3. Pairs each question with the next non-question utterance of another speaker
/// 4. Emits everything left over as statement turns
pub fn segment(raw_text: &str, config: &SegmenterConfig) -> PipelineResult<Vec<DialogueTurn>> {
    check_structure(raw_text)?;

    let utterances = split_utterances(raw_text, config);
    let turns = pair_turns(utterances);

    debug!("Segmented transcript into {} turns", turns.len());
    Ok(turns)
}

/// Reject input that cannot be a text transcript at all
fn check_structure(raw_text: &str) -> PipelineResult<()> {
    if raw_text.trim().is_empty() {
        return Err(PipelineError::ParseFailure("transcript is empty".to_string()));
    }
    if raw_text.contains('\0') {
        return Err(PipelineError::ParseFailure(
            "transcript contains NUL bytes (binary data?)".to_string(),
        ));
    }

    let total = raw_text.chars().count();
    let control = raw_text
        .chars()
        .filter(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
        .count();
    if control * 10 > total {
        return Err(PipelineError::ParseFailure(format!(
            "transcript has {} control characters out of {} (binary data?)",
            control, total
        )));
    }

    Ok(())
}

/// Remove timestamps and transcription artifacts from a line
fn strip_noise(line: &str) -> String {
    let line = RE_BRACKET_TIMESTAMP.replace_all(line, " ");
    let line = RE_ARTIFACT.replace_all(&line, " ");
    let line = RE_LEADING_TIMESTAMP.replace(&line, "");
    line.trim().to_string()
}

/// Collapse whitespace and fix punctuation left behind by filler removal
fn tidy(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let collapsed = RE_REPEATED_COMMA.replace_all(&collapsed, ",");
    collapsed
        .replace(" ,", ",")
        .replace(" .", ".")
        .trim_start_matches(|c: char| c == ',' || c == '.' || c.is_whitespace())
        .trim()
        .to_string()
}

fn split_utterances(raw_text: &str, config: &SegmenterConfig) -> Vec<(Utterance, String)> {
    let filler = config.filler_regex();
    let mut utterances = Vec::new();
    let mut current: Option<PendingUtterance> = None;

    let finish = |pending: PendingUtterance, out: &mut Vec<(Utterance, String)>| {
        let text = match &filler {
            Some(re) => re.replace_all(&pending.text, " ").to_string(),
            None => pending.text,
        };
        let text = tidy(&text);
        if text.is_empty() {
            return;
        }
        let is_question = config.is_question(&text);
        let utterance = Utterance::new(pending.speaker, text, out.len(), is_question);
        out.push((utterance, pending.voice));
    };

    for line in raw_text.lines() {
        let line = strip_noise(line);
        if line.is_empty() {
            continue;
        }

        match config.match_label(&line) {
            Some((speaker, label, rest)) => {
                if let Some(pending) = current.take() {
                    finish(pending, &mut utterances);
                }
                let voice = match speaker {
                    Speaker::Initiator => "initiator".to_string(),
                    Speaker::Respondent => "respondent".to_string(),
                    Speaker::Unknown => label.to_lowercase(),
                };
                current = Some(PendingUtterance {
                    speaker,
                    voice,
                    text: rest.to_string(),
                });
            }
            None => match current.as_mut() {
                Some(pending) => {
                    pending.text.push(' ');
                    pending.text.push_str(&line);
                }
                None => {
                    current = Some(PendingUtterance {
                        speaker: Speaker::Unknown,
                        voice: String::new(),
                        text: line,
                    });
                }
            },
        }
    }

    if let Some(pending) = current.take() {
        finish(pending, &mut utterances);
    }

    utterances
}

enum StagedTurn {
    Qa(Utterance, Utterance),
    Statement(Utterance),
}

/// Pair questions with answers; turns are ordered by their last utterance
fn pair_turns(utterances: Vec<(Utterance, String)>) -> Vec<DialogueTurn> {
    let mut pending: VecDeque<(Utterance, String)> = VecDeque::new();
    let mut staged: Vec<(usize, StagedTurn)> = Vec::with_capacity(utterances.len());

    for (utterance, voice) in utterances {
        if utterance.is_question() {
            pending.push_back((utterance, voice));
            continue;
        }

        let answered = pending.iter().position(|(_, v)| *v != voice);
        match answered.and_then(|pos| pending.remove(pos)) {
            Some((question, _)) => {
                staged.push((utterance.position(), StagedTurn::Qa(question, utterance)));
            }
            None => {
                staged.push((utterance.position(), StagedTurn::Statement(utterance)));
            }
        }
    }

    for (question, _) in pending {
        staged.push((question.position(), StagedTurn::Statement(question)));
    }

    staged.sort_by_key(|(position, _)| *position);

    staged
        .into_iter()
        .enumerate()
        .map(|(index, (_, turn))| match turn {
            StagedTurn::Qa(q, a) => DialogueTurn::qa(index, q, a),
            StagedTurn::Statement(u) => DialogueTurn::statement(index, u),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TurnKind;

    #[test]
    fn test_strips_timestamps_fillers_and_artifacts() {
        let raw = "[00:12:34] Advisor: Um, what is your name?\n[inaudible]\nClient: My name is, uh, John Smith.";
        let turns = segment(raw, &SegmenterConfig::default()).unwrap();

        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].kind, TurnKind::Qa);
        assert_eq!(turns[0].prompt_text(), "what is your name?");
        assert_eq!(turns[0].response_text(), "My name is John Smith.");
    }

    #[test]
    fn test_filler_next_to_cue_phrase_keeps_name() {
        use crate::extractors::ExtractorConfig;
        use crate::models::FieldId;
        use crate::stages::execute_stage1;

        let turns = segment("Client: My name is, uh, John Smith.", &SegmenterConfig::default()).unwrap();
        assert_eq!(turns[0].response_text(), "My name is John Smith.");

        let proposals = execute_stage1(&turns, &ExtractorConfig::default()).proposals;
        let name = proposals.iter().find(|p| p.field == FieldId::Name).unwrap();
        assert_eq!(name.value, "John Smith");
    }

    #[test]
    fn test_declarative_answer_is_not_a_question() {
        let raw = "Advisor: How long have you been investing?\nClient: Have been at it about twelve years.";
        let turns = segment(raw, &SegmenterConfig::default()).unwrap();

        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].kind, TurnKind::Qa);
        assert_eq!(turns[0].response_text(), "Have been at it about twelve years.");
    }

    #[test]
    fn test_field_labels_continue_utterance() {
        let raw = "Client: I live here now.\nAddress: 42 Oak Street\nNote: moved last year\nSarah: Thanks.";
        let turns = segment(raw, &SegmenterConfig::default()).unwrap();

        assert_eq!(turns.len(), 2);
        assert_eq!(
            turns[0].response_text(),
            "I live here now. Address: 42 Oak Street Note: moved last year"
        );
        assert_eq!(turns[1].speaker(), Speaker::Unknown);
    }

    #[test]
    fn test_speaker_labels() {
        let config = SegmenterConfig::default();
        let cases = [
            ("Advisor: Hello", Speaker::Initiator, "Hello"),
            ("FA: How old are you?", Speaker::Initiator, "How old are you?"),
            ("financial advisor: Welcome", Speaker::Initiator, "Welcome"),
            ("Client: I am 35", Speaker::Respondent, "I am 35"),
            ("Mr. Smith: I am 35", Speaker::Respondent, "I am 35"),
            ("Sarah: Hi there", Speaker::Unknown, "Hi there"),
        ];

        for (line, speaker, rest) in cases {
            let (matched, _, text) = config.match_label(line).unwrap();
            assert_eq!(matched, speaker, "{}", line);
            assert_eq!(text, rest, "{}", line);
        }
        assert!(config.match_label("Random text").is_none());
    }

    #[test]
    fn test_is_question() {
        let config = SegmenterConfig::default();
        for q in [
            "What is your name?",
            "How old are you",
            "Can you tell me about your income",
            "Are you married?",
        ] {
            assert!(config.is_question(q), "{}", q);
        }
        for s in [
            "My name is John.",
            "I am 35 years old.",
            "I work at a bank.",
            "Have been at it about twelve years.",
        ] {
            assert!(!config.is_question(s), "{}", s);
        }
    }

    #[test]
    fn test_continuation_lines_join_previous_utterance() {
        let raw = "Client: I live at 42 Oak Street\nin Springfield, Illinois.";
        let turns = segment(raw, &SegmenterConfig::default()).unwrap();

        assert_eq!(turns.len(), 1);
        assert_eq!(
            turns[0].response_text(),
            "I live at 42 Oak Street in Springfield, Illinois."
        );
    }

    #[test]
    fn test_consecutive_questions_pair_in_order() {
        let raw = "Advisor: What is your email?\n\
                   Advisor: And your phone number?\n\
                   Client: It's jane@example.com.\n\
                   Client: 555-123-4567.";
        let turns = segment(raw, &SegmenterConfig::default()).unwrap();

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].prompt_text(), "What is your email?");
        assert_eq!(turns[0].response_text(), "It's jane@example.com.");
        assert_eq!(turns[1].prompt_text(), "And your phone number?");
        assert_eq!(turns[1].response_text(), "555-123-4567.");
    }

    #[test]
    fn test_unanswered_question_becomes_statement() {
        let raw = "Advisor: Any questions for me?";
        let turns = segment(raw, &SegmenterConfig::default()).unwrap();

        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].kind, TurnKind::Statement);
    }

    #[test]
    fn test_unlabeled_text_is_unknown_speaker() {
        let raw = "my email is someone@example.org";
        let turns = segment(raw, &SegmenterConfig::default()).unwrap();

        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].speaker(), Speaker::Unknown);
    }

    #[test]
    fn test_distinct_unknown_labels_pair() {
        let raw = "Sarah: Where do you work?\nTom: At Acme Corp.";
        let turns = segment(raw, &SegmenterConfig::default()).unwrap();

        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].kind, TurnKind::Qa);
    }

    #[test]
    fn test_turns_ordered_and_indexed() {
        let raw = "Client: Hello.\nAdvisor: What do you do?\nClient: I'm retired.";
        let turns = segment(raw, &SegmenterConfig::default()).unwrap();

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].index, 0);
        assert_eq!(turns[0].kind, TurnKind::Statement);
        assert_eq!(turns[1].index, 1);
        assert_eq!(turns[1].response_text(), "I'm retired.");
    }

    #[test]
    fn test_structural_failures() {
        let config = SegmenterConfig::default();
        assert!(matches!(segment("   \n ", &config), Err(PipelineError::ParseFailure(_))));
        assert!(matches!(
            segment("Client: hi\0\0\0", &config),
            Err(PipelineError::ParseFailure(_))
        ));
    }
}

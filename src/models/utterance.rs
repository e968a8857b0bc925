use serde::{Deserialize, Serialize};

/// Role of the person speaking a line of the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The party driving the conversation (the advisor)
    Initiator,
    /// The party answering (the client)
    Respondent,
    /// A label was present but could not be attributed, or no label at all
    Unknown,
}

/// A single speaker-attributed line (plus continuation lines) of the transcript
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Utterance {
    speaker: Speaker,
    text: String,
    position: usize,
    is_question: bool,
}

impl Utterance {
    pub fn new(speaker: Speaker, text: impl Into<String>, position: usize, is_question: bool) -> Self {
        Self {
            speaker,
            text: text.into(),
            position,
            is_question,
        }
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    /// Cleaned text with the speaker label removed
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Position in the transcript's utterance sequence
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_question(&self) -> bool {
        self.is_question
    }
}

/// Classification of a dialogue turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    /// A question paired with the answer from the other speaker
    Qa,
    /// An utterance that could not be paired
    Statement,
}

/// A question/answer pair or a standalone statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DialogueTurn {
    /// Index of this turn in transcript order
    pub index: usize,
    pub kind: TurnKind,
    /// The question, for `Qa` turns
    pub prompt: Option<Utterance>,
    /// The answer for `Qa` turns, the only utterance for statements
    pub response: Utterance,
}

impl DialogueTurn {
    pub fn qa(index: usize, prompt: Utterance, response: Utterance) -> Self {
        Self {
            index,
            kind: TurnKind::Qa,
            prompt: Some(prompt),
            response,
        }
    }

    pub fn statement(index: usize, utterance: Utterance) -> Self {
        Self {
            index,
            kind: TurnKind::Statement,
            prompt: None,
            response: utterance,
        }
    }

    /// Question text, or an empty string for statements
    pub fn prompt_text(&self) -> &str {
        self.prompt.as_ref().map(|u| u.text()).unwrap_or("")
    }

    pub fn response_text(&self) -> &str {
        self.response.text()
    }

    /// Speaker of the response utterance
    pub fn speaker(&self) -> Speaker {
        self.response.speaker()
    }
}

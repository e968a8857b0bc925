pub mod fuzzy;
pub mod semantic;

pub use fuzzy::*;
pub use semantic::*;

use crate::models::MatchMethod;

/// Scores how close two labels are in meaning
///
/// Returns `None` when either label is unknown to the backend; the mapper
/// treats that as "no semantic evidence" rather than an error.
pub trait SemanticSimilarity {
    fn similarity(&self, a: &str, b: &str) -> Option<f64>;
}

/// Matching strategies available for a run, fixed at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    methods: Vec<MatchMethod>,
}

impl Capabilities {
    /// Exact and fuzzy matching only
    pub fn offline() -> Self {
        Self {
            methods: vec![MatchMethod::Exact, MatchMethod::Fuzzy],
        }
    }

    pub fn with_semantic() -> Self {
        Self {
            methods: vec![MatchMethod::Exact, MatchMethod::Fuzzy, MatchMethod::Semantic],
        }
    }

    pub fn methods(&self) -> &[MatchMethod] {
        &self.methods
    }

    pub fn semantic(&self) -> bool {
        self.methods.contains(&MatchMethod::Semantic)
    }
}

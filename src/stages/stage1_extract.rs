use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::extractors::{ExtractorConfig, FieldExtractor, build_extractors};
use crate::models::{DialogueTurn, FieldProposal, Strategy};

/// Result of Stage 1 extraction
#[derive(Debug)]
pub struct Stage1Result {
    /// All proposals, turn by turn, extractor by extractor
    pub proposals: Vec<FieldProposal>,
    /// Number of proposals per strategy
    pub per_strategy: BTreeMap<Strategy, usize>,
    /// Turns whose answers were scanned
    pub turns_scanned: usize,
}

/// Execute Stage 1: run every configured extractor over every turn
pub fn execute_stage1(turns: &[DialogueTurn], config: &ExtractorConfig) -> Stage1Result {
    let extractors = build_extractors(config);
    run_extractors(turns, &extractors)
}

/// Run a given set of extractors over the turns
///
/// Extractors see one turn at a time and share no state, so the output is a
/// pure function of the turns and the extractor list.
pub fn run_extractors(turns: &[DialogueTurn], extractors: &[Box<dyn FieldExtractor>]) -> Stage1Result {
    let mut proposals = Vec::new();
    let mut per_strategy: BTreeMap<Strategy, usize> = BTreeMap::new();
    let mut turns_scanned = 0;

    for turn in turns {
        let before = proposals.len();
        for extractor in extractors {
            let found = extractor.propose(turn);
            *per_strategy.entry(extractor.strategy()).or_insert(0) += found.len();
            proposals.extend(found);
        }
        if proposals.len() > before {
            turns_scanned += 1;
            debug!("Turn {}: {} proposals", turn.index, proposals.len() - before);
        }
    }

    info!(
        "Stage 1: {} proposals from {} turns ({} with values)",
        proposals.len(),
        turns.len(),
        turns_scanned
    );

    Stage1Result {
        proposals,
        per_strategy,
        turns_scanned,
    }
}

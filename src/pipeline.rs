use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::error::PipelineResult;
use crate::extractors::ExtractorConfig;
use crate::models::{DialogueTurn, DocumentField, FieldId, Strategy, StructuredRecord};
use crate::similarity::{EmbeddingClient, SemanticIndex, build_semantic_index, mapping_labels, probe_capabilities};
use crate::stages::{
    AggregationReport, AggregatorConfig, MapperConfig, SegmenterConfig, aggregate_with_report, execute_stage1,
    segment,
};

/// Settings for a full transcript run
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub segmenter: SegmenterConfig,
    pub extractors: ExtractorConfig,
    pub aggregator: AggregatorConfig,
    pub mapper: MapperConfig,
}

/// Everything the extraction half of the pipeline produced
#[derive(Debug)]
pub struct Extraction {
    pub turns: Vec<DialogueTurn>,
    pub record: StructuredRecord,
    pub report: AggregationReport,
    pub per_strategy: BTreeMap<Strategy, usize>,
}

/// Segment, extract and aggregate a raw transcript
pub fn extract_record(raw_text: &str, config: &PipelineConfig) -> PipelineResult<Extraction> {
    info!("Stage 0: Segmenting transcript...");
    let turns = segment(raw_text, &config.segmenter)?;

    info!("Stage 1: Extracting field proposals...");
    let stage1 = execute_stage1(&turns, &config.extractors);

    info!("Stage 2: Aggregating proposals...");
    let (record, report) = aggregate_with_report(&stage1.proposals, &config.aggregator);

    Ok(Extraction {
        turns,
        record,
        report,
        per_strategy: stage1.per_strategy,
    })
}

/// Probe the embedding backend and precompute label vectors
///
/// Any failure leaves the run on exact and fuzzy matching only.
pub async fn prepare_semantic(
    client: Option<&EmbeddingClient>,
    field_ids: &[FieldId],
    documents: &[DocumentField],
) -> Option<SemanticIndex> {
    let client = client?;
    if !probe_capabilities(Some(client)).await.semantic() {
        return None;
    }

    match build_semantic_index(client, &mapping_labels(field_ids, documents)).await {
        Ok(index) => Some(index),
        Err(e) => {
            warn!("Semantic matching disabled for this run: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    #[test]
    fn test_extract_record() {
        let transcript = "Advisor: What's your email address?\nClient: It's michael.thompson@email.com.\n";
        let extraction = extract_record(transcript, &PipelineConfig::default()).unwrap();

        assert_eq!(extraction.turns.len(), 1);
        assert_eq!(extraction.record.get(FieldId::Email).unwrap().confidence, 1.0);
        assert!(extraction.per_strategy[&Strategy::Pattern] >= 1);
    }

    #[test]
    fn test_empty_transcript_fails() {
        let err = extract_record("   \n", &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::ParseFailure(_)));
    }

    #[tokio::test]
    async fn test_prepare_semantic_without_client() {
        assert!(prepare_semantic(None, &[FieldId::Phone], &[]).await.is_none());
    }
}

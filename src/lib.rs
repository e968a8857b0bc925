pub mod error;
pub mod extractors;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod similarity;
pub mod stages;

pub use error::{PipelineError, PipelineResult};
pub use extractors::{ExtractorConfig, FieldExtractor, build_extractors};
pub use io::{
    FieldDiscovery, FieldPopulator, FillOutcome, JsonFormDocument, MappingReport, TemplateStore, load_transcript_file,
    read_mapping_report, read_record, read_transcript, write_mapping_report, write_record,
};
pub use models::{
    DialogueTurn, DocumentField, FieldId, FieldMapping, FieldProposal, FieldValue, MappingTemplate, MatchMethod,
    StructuredRecord,
};
pub use pipeline::{Extraction, PipelineConfig, extract_record, prepare_semantic};
pub use similarity::{Capabilities, EmbeddingClient, EmbeddingConfig, SemanticIndex, SemanticSimilarity};
pub use stages::{
    AggregatorConfig, MapperConfig, SegmenterConfig, Stage4Config, aggregate, execute_stage1, execute_stage4,
    map_fields, map_with_template, segment,
};

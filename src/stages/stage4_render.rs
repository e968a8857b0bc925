use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::models::{DocumentField, DocumentFieldType, FieldId, FieldMapping, FieldValue, StructuredRecord};
use crate::similarity::normalize_label;

/// Configuration for Stage 4 rendering
#[derive(Debug, Clone, Default)]
pub struct Stage4Config {
    /// Leave low-confidence record entries out of the document
    pub skip_low_confidence: bool,
    /// Ignore mappings below this confidence
    pub min_mapping_confidence: f64,
}

/// Why a mapped record field was not written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The record has no value for the field
    NoValue,
    LowConfidence,
    /// The document's choice list has nothing matching the value
    NoMatchingOption,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedField {
    pub field: FieldId,
    pub document_field: String,
    pub reason: SkipReason,
}

/// Result of Stage 4 rendering
#[derive(Debug, Default)]
pub struct Stage4Result {
    /// Document field name to rendered value
    pub assignments: BTreeMap<String, String>,
    pub skipped: Vec<SkippedField>,
}

/// Execute Stage 4: render record values for the mapped document fields
pub fn execute_stage4(
    record: &StructuredRecord,
    mappings: &[FieldMapping],
    documents: &[DocumentField],
    config: &Stage4Config,
) -> Stage4Result {
    let mut result = Stage4Result::default();

    for mapping in mappings {
        let Some(name) = mapping.document_field() else {
            continue;
        };
        if mapping.confidence() < config.min_mapping_confidence {
            continue;
        }
        let Some(document) = documents.iter().find(|d| d.name == name) else {
            continue;
        };

        let mut skip = |reason: SkipReason| {
            debug!("Skipping {} -> {:?}: {:?}", mapping.field, name, reason);
            result.skipped.push(SkippedField {
                field: mapping.field,
                document_field: name.to_string(),
                reason,
            });
        };

        let Some(entry) = record.get(mapping.field) else {
            skip(SkipReason::NoValue);
            continue;
        };
        if config.skip_low_confidence && entry.low_confidence {
            skip(SkipReason::LowConfidence);
            continue;
        }

        match render_value(&entry.value, document) {
            Some(value) => {
                result.assignments.insert(name.to_string(), value);
            }
            None => skip(SkipReason::NoMatchingOption),
        }
    }

    info!(
        "Stage 4: {} values rendered, {} skipped",
        result.assignments.len(),
        result.skipped.len()
    );

    result
}

/// Render a value the way the target document field expects it
///
/// Text fields get the display form (`$95,000.00`, `03/15/1985`); choice
/// fields get the document's own spelling of the matching option; checkboxes
/// get `Yes`.
pub fn render_value(value: &FieldValue, document: &DocumentField) -> Option<String> {
    match document.field_type {
        DocumentFieldType::Text => Some(value.render()),
        DocumentFieldType::Checkbox => match value {
            FieldValue::Count(0) => None,
            _ => Some("Yes".to_string()),
        },
        DocumentFieldType::Choice => {
            if document.options.is_empty() {
                return Some(value.render());
            }
            let wanted = normalize_label(&value.render());
            document
                .options
                .iter()
                .find(|o| normalize_label(o) == wanted)
                .cloned()
        }
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::FieldId;

/// Type of a fillable document field, as reported by field discovery
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFieldType {
    #[default]
    Text,
    Choice,
    Checkbox,
}

/// A field discovered in the target document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentField {
    /// Field name exactly as the document spells it
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: DocumentFieldType,
    /// Allowed values for choice fields, when known
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl DocumentField {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: DocumentFieldType::Text,
            options: vec![],
        }
    }

    pub fn choice(name: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            name: name.into(),
            field_type: DocumentFieldType::Choice,
            options,
        }
    }

    pub fn checkbox(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: DocumentFieldType::Checkbox,
            options: vec![],
        }
    }
}

/// How a record field was matched to a document field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    Fuzzy,
    Semantic,
    /// Reused from a saved mapping template
    Template,
}

/// Why a record field was left unmapped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedReason {
    /// No document field passed any matching pass
    NoMatch,
    /// Two document fields matched equally well
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MappingOutcome {
    Mapped {
        document_field: String,
        method: MatchMethod,
        confidence: f64,
    },
    Unmapped {
        reason: UnmappedReason,
    },
}

/// Pairing of a record field with a document field, or an explicit miss
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub field: FieldId,
    #[serde(flatten)]
    pub outcome: MappingOutcome,
}

impl FieldMapping {
    pub fn mapped(field: FieldId, document_field: impl Into<String>, method: MatchMethod, confidence: f64) -> Self {
        Self {
            field,
            outcome: MappingOutcome::Mapped {
                document_field: document_field.into(),
                method,
                confidence,
            },
        }
    }

    pub fn unmapped(field: FieldId, reason: UnmappedReason) -> Self {
        Self {
            field,
            outcome: MappingOutcome::Unmapped { reason },
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.outcome, MappingOutcome::Mapped { .. })
    }

    pub fn document_field(&self) -> Option<&str> {
        match &self.outcome {
            MappingOutcome::Mapped { document_field, .. } => Some(document_field),
            MappingOutcome::Unmapped { .. } => None,
        }
    }

    pub fn method(&self) -> Option<MatchMethod> {
        match &self.outcome {
            MappingOutcome::Mapped { method, .. } => Some(*method),
            MappingOutcome::Unmapped { .. } => None,
        }
    }

    /// Match confidence, 0 when unmapped
    pub fn confidence(&self) -> f64 {
        match &self.outcome {
            MappingOutcome::Mapped { confidence, .. } => *confidence,
            MappingOutcome::Unmapped { .. } => 0.0,
        }
    }
}

/// One saved pairing in a mapping template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateEntry {
    pub document_field: String,
    pub method: MatchMethod,
    pub confidence: f64,
}

/// Reusable mapping configuration for structurally similar documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingTemplate {
    pub name: String,
    pub mappings: BTreeMap<FieldId, TemplateEntry>,
}

impl MappingTemplate {
    /// Build a template from the mapped entries of a mapping run
    pub fn from_mappings(name: impl Into<String>, mappings: &[FieldMapping]) -> Self {
        let mappings = mappings
            .iter()
            .filter_map(|m| match &m.outcome {
                MappingOutcome::Mapped {
                    document_field,
                    method,
                    confidence,
                } => Some((
                    m.field,
                    TemplateEntry {
                        document_field: document_field.clone(),
                        method: *method,
                        confidence: *confidence,
                    },
                )),
                MappingOutcome::Unmapped { .. } => None,
            })
            .collect();

        Self {
            name: name.into(),
            mappings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document_fields() {
        let json = r#"[
            {"name": "Full Legal Name", "type": "text"},
            {"name": "Risk", "type": "choice", "options": ["Conservative", "Moderate"]},
            {"name": "Retired"}
        ]"#;

        let fields: Vec<DocumentField> = serde_json::from_str(json).unwrap();

        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1].field_type, DocumentFieldType::Choice);
        assert_eq!(fields[1].options.len(), 2);
        assert_eq!(fields[2].field_type, DocumentFieldType::Text);
    }

    #[test]
    fn test_mapping_serializes_flat() {
        let mapping = FieldMapping::mapped(FieldId::Email, "Email Address", MatchMethod::Exact, 1.0);
        let json = serde_json::to_value(&mapping).unwrap();

        assert_eq!(json["field"], "email");
        assert_eq!(json["status"], "mapped");
        assert_eq!(json["document_field"], "Email Address");
        assert_eq!(json["method"], "exact");

        let unmapped = FieldMapping::unmapped(FieldId::Phone, UnmappedReason::NoMatch);
        let json = serde_json::to_value(&unmapped).unwrap();
        assert_eq!(json["status"], "unmapped");
        assert_eq!(json["reason"], "no_match");
    }

    #[test]
    fn test_template_keeps_only_mapped_entries() {
        let mappings = vec![
            FieldMapping::mapped(FieldId::Name, "Full Legal Name", MatchMethod::Exact, 1.0),
            FieldMapping::unmapped(FieldId::Phone, UnmappedReason::NoMatch),
        ];

        let template = MappingTemplate::from_mappings("bank_a", &mappings);

        assert_eq!(template.mappings.len(), 1);
        assert_eq!(template.mappings[&FieldId::Name].document_field, "Full Legal Name");
    }
}

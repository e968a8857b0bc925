use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::models::{FieldMapping, StructuredRecord};

/// Mapping run as written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingReport {
    pub mappings: Vec<FieldMapping>,
    pub mapped: usize,
    pub unmapped: usize,
    /// Document fields no record field was paired with
    pub unused_document_fields: Vec<String>,
}

impl MappingReport {
    pub fn new(mappings: Vec<FieldMapping>, document_names: &[String]) -> Self {
        let mapped = mappings.iter().filter(|m| m.is_mapped()).count();
        let unused_document_fields = document_names
            .iter()
            .filter(|name| !mappings.iter().any(|m| m.document_field() == Some(name.as_str())))
            .cloned()
            .collect();

        Self {
            unmapped: mappings.len() - mapped,
            mapped,
            mappings,
            unused_document_fields,
        }
    }
}

/// Write any serializable value as pretty JSON
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("Failed to create file: {:?}", path))?;
    serde_json::to_writer_pretty(file, value).context("Failed to write JSON")?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON: {:?}", path))
}

pub fn write_record(record: &StructuredRecord, path: &Path) -> Result<()> {
    write_json(record, path)
}

/// Read a record back, re-validating every value
pub fn read_record(path: &Path) -> Result<StructuredRecord> {
    read_json(path)
}

pub fn write_mapping_report(report: &MappingReport, path: &Path) -> Result<()> {
    write_json(report, path)
}

pub fn read_mapping_report(path: &Path) -> Result<MappingReport> {
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldId, FieldProposal, MatchMethod, ProposalSource, UnmappedReason};
    use crate::stages::{AggregatorConfig, aggregate};

    #[test]
    fn test_record_file_round_trip() {
        let record = aggregate(
            &[
                FieldProposal::new(
                    FieldId::Email,
                    "michael.thompson@email.com",
                    1.0,
                    ProposalSource::Pattern { grammar: "email" },
                    0,
                ),
                FieldProposal::new(
                    FieldId::AnnualIncome,
                    "$95,000",
                    0.95,
                    ProposalSource::Pattern { grammar: "currency" },
                    2,
                ),
            ],
            &AggregatorConfig::default(),
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.json");
        write_record(&record, &path).unwrap();

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["email"]["value"], "michael.thompson@email.com");
        assert_eq!(json["completion_percentage"], 0.2);

        assert_eq!(read_record(&path).unwrap(), record);
    }

    #[test]
    fn test_mapping_report() {
        let mappings = vec![
            FieldMapping::mapped(FieldId::Name, "Full Legal Name", MatchMethod::Exact, 1.0),
            FieldMapping::unmapped(FieldId::Phone, UnmappedReason::NoMatch),
        ];
        let names = vec!["Full Legal Name".to_string(), "Primary Contact".to_string()];
        let report = MappingReport::new(mappings, &names);

        assert_eq!(report.mapped, 1);
        assert_eq!(report.unmapped, 1);
        assert_eq!(report.unused_document_fields, vec!["Primary Contact".to_string()]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        write_mapping_report(&report, &path).unwrap();
        assert_eq!(read_mapping_report(&path).unwrap(), report);
    }

    #[test]
    fn test_read_record_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"email": {"value": "nope", "confidence": 1.0, "source": "pattern", "turn_index": 0}}"#,
        )
        .unwrap();

        assert!(read_record(&path).is_err());
    }
}

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, warn};

use super::output::write_json;
use crate::models::{DocumentField, DocumentFieldType};

/// Lists the fillable fields of a target document
pub trait FieldDiscovery {
    fn discover(&self) -> Vec<DocumentField>;
}

/// Writes rendered values into a target document
pub trait FieldPopulator {
    /// Fill each named field, reporting success or failure per field
    fn populate(&mut self, values: &BTreeMap<String, String>) -> Vec<FillOutcome>;
}

/// Result of writing one value into the document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillOutcome {
    pub document_field: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FillOutcome {
    fn filled(document_field: &str) -> Self {
        Self {
            document_field: document_field.to_string(),
            success: true,
            error: None,
        }
    }

    fn failed(document_field: &str, error: impl Into<String>) -> Self {
        Self {
            document_field: document_field.to_string(),
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Serialize)]
struct FilledField<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    field_type: DocumentFieldType,
    value: Option<&'a str>,
}

/// A form described by a JSON list of fields
///
/// Input is `[{"name": ..., "type": "text"|"choice"|"checkbox", "options": [...]}]`.
/// Filled output is the same list with a `value` on each field.
#[derive(Debug, Clone)]
pub struct JsonFormDocument {
    fields: Vec<DocumentField>,
    values: BTreeMap<String, String>,
}

impl JsonFormDocument {
    pub fn new(fields: Vec<DocumentField>) -> Self {
        Self {
            fields,
            values: BTreeMap::new(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
        let fields: Vec<DocumentField> =
            serde_json::from_str(&content).with_context(|| format!("Failed to parse form fields: {:?}", path))?;
        Ok(Self::new(fields))
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Write every field with its filled value (null when empty)
    pub fn write_filled(&self, path: &Path) -> Result<()> {
        let filled: Vec<FilledField<'_>> = self
            .fields
            .iter()
            .map(|f| FilledField {
                name: &f.name,
                field_type: f.field_type,
                value: self.value(&f.name),
            })
            .collect();
        write_json(&filled, path)
    }

    fn check(&self, name: &str, value: &str) -> Result<(), String> {
        let field = self
            .fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| format!("no field named {:?}", name))?;

        match field.field_type {
            DocumentFieldType::Choice if !field.options.is_empty() && !field.options.iter().any(|o| o == value) => {
                Err(format!("{:?} is not one of the field's options", value))
            }
            DocumentFieldType::Checkbox if !matches!(value, "Yes" | "Off") => {
                Err(format!("{:?} is not a checkbox state", value))
            }
            _ => Ok(()),
        }
    }
}

impl FieldDiscovery for JsonFormDocument {
    fn discover(&self) -> Vec<DocumentField> {
        self.fields.clone()
    }
}

impl FieldPopulator for JsonFormDocument {
    fn populate(&mut self, values: &BTreeMap<String, String>) -> Vec<FillOutcome> {
        let mut outcomes = Vec::with_capacity(values.len());

        for (name, value) in values {
            match self.check(name, value) {
                Ok(()) => {
                    debug!("Filled {:?} = {:?}", name, value);
                    self.values.insert(name.clone(), value.clone());
                    outcomes.push(FillOutcome::filled(name));
                }
                Err(e) => {
                    warn!("Could not fill {:?}: {}", name, e);
                    outcomes.push(FillOutcome::failed(name, e));
                }
            }
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> JsonFormDocument {
        JsonFormDocument::new(vec![
            DocumentField::text("Full Legal Name"),
            DocumentField::choice("Risk", vec!["Conservative".to_string(), "Moderate".to_string()]),
            DocumentField::checkbox("Has Dependents"),
        ])
    }

    #[test]
    fn test_populate_reports_per_field() {
        let mut doc = form();
        let values = BTreeMap::from([
            ("Full Legal Name".to_string(), "Michael Thompson".to_string()),
            ("Risk".to_string(), "Reckless".to_string()),
            ("Has Dependents".to_string(), "Yes".to_string()),
            ("Signature".to_string(), "MT".to_string()),
        ]);

        let outcomes = doc.populate(&values);
        let failed: Vec<&str> = outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| o.document_field.as_str())
            .collect();

        assert_eq!(outcomes.len(), 4);
        assert_eq!(failed, vec!["Risk", "Signature"]);
        assert_eq!(doc.value("Full Legal Name"), Some("Michael Thompson"));
        assert_eq!(doc.value("Risk"), None);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let fields_path = dir.path().join("fields.json");
        std::fs::write(
            &fields_path,
            r#"[{"name": "Full Legal Name", "type": "text"}, {"name": "Email Address"}]"#,
        )
        .unwrap();

        let mut doc = JsonFormDocument::from_file(&fields_path).unwrap();
        assert_eq!(doc.discover().len(), 2);

        doc.populate(&BTreeMap::from([("Full Legal Name".to_string(), "Jane Doe".to_string())]));
        let out = dir.path().join("filled.json");
        doc.write_filled(&out).unwrap();

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json[0]["value"], "Jane Doe");
        assert!(json[1]["value"].is_null());
        assert_eq!(json[1]["type"], "text");
    }
}

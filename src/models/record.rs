use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{FieldId, FieldValue, Strategy};

/// Key of the derived completion ratio in the record's JSON form
pub const COMPLETION_KEY: &str = "completion_percentage";

/// The resolved value of one record field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldEntry {
    pub value: FieldValue,
    pub confidence: f64,
    /// Set when another value came within the ambiguity epsilon of the winner
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub low_confidence: bool,
    /// The runner-up value when `low_confidence` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub competing_value: Option<FieldValue>,
    pub source: Strategy,
    pub turn_index: usize,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    value: serde_json::Value,
    confidence: f64,
    #[serde(default)]
    low_confidence: bool,
    #[serde(default)]
    competing_value: Option<serde_json::Value>,
    source: Strategy,
    turn_index: usize,
}

/// Validated KYC data extracted from a transcript
///
/// Every entry present has passed its field's validator. Serializes to a flat
/// JSON object keyed by field id, plus a `completion_percentage` number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredRecord {
    fields: BTreeMap<FieldId, FieldEntry>,
}

impl StructuredRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, field: FieldId, entry: FieldEntry) {
        self.fields.insert(field, entry);
    }

    pub fn get(&self, field: FieldId) -> Option<&FieldEntry> {
        self.fields.get(&field)
    }

    pub fn value(&self, field: FieldId) -> Option<&FieldValue> {
        self.fields.get(&field).map(|e| &e.value)
    }

    pub fn contains(&self, field: FieldId) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldId, &FieldEntry)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }

    /// Ids of all fields present, in enumeration order
    pub fn field_ids(&self) -> Vec<FieldId> {
        self.fields.keys().copied().collect()
    }

    /// Required fields present divided by required fields defined, in [0, 1]
    pub fn completion_percentage(&self) -> f64 {
        let total = FieldId::required().count();
        if total == 0 {
            return 0.0;
        }
        let present = FieldId::required().filter(|f| self.contains(*f)).count();
        present as f64 / total as f64
    }

    pub fn missing_required(&self) -> Vec<FieldId> {
        FieldId::required().filter(|f| !self.contains(*f)).collect()
    }

    pub fn low_confidence_fields(&self) -> Vec<FieldId> {
        self.iter()
            .filter(|(_, e)| e.low_confidence)
            .map(|(f, _)| f)
            .collect()
    }
}

impl Serialize for StructuredRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        for (field, entry) in &self.fields {
            map.serialize_entry(field.as_str(), entry)?;
        }
        map.serialize_entry(COMPLETION_KEY, &self.completion_percentage())?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for StructuredRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut record = StructuredRecord::new();

        for (key, value) in raw {
            // Derived, recomputed on demand
            if key == COMPLETION_KEY {
                continue;
            }

            let field: FieldId = key.parse().map_err(D::Error::custom)?;
            let entry: RawEntry = serde_json::from_value(value).map_err(D::Error::custom)?;

            let typed = field.value_from_json(&entry.value).ok_or_else(|| {
                D::Error::custom(format!("invalid value for {}: {}", field, entry.value))
            })?;
            let competing = match &entry.competing_value {
                Some(v) => Some(field.value_from_json(v).ok_or_else(|| {
                    D::Error::custom(format!("invalid competing value for {}: {}", field, v))
                })?),
                None => None,
            };

            record.insert(
                field,
                FieldEntry {
                    value: typed,
                    confidence: entry.confidence,
                    low_confidence: entry.low_confidence,
                    competing_value: competing,
                    source: entry.source,
                    turn_index: entry.turn_index,
                },
            );
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: FieldValue, confidence: f64) -> FieldEntry {
        FieldEntry {
            value,
            confidence,
            low_confidence: false,
            competing_value: None,
            source: Strategy::Pattern,
            turn_index: 0,
        }
    }

    #[test]
    fn test_completion_percentage_is_literal_ratio() {
        let mut record = StructuredRecord::new();
        assert_eq!(record.completion_percentage(), 0.0);

        record.insert(
            FieldId::Email,
            entry(FieldValue::Text("a@b.co".to_string()), 1.0),
        );
        record.insert(FieldId::City, entry(FieldValue::Text("Springfield".to_string()), 0.7));

        // City is optional
        assert!((record.completion_percentage() - 0.1).abs() < 1e-12);
        assert_eq!(record.missing_required().len(), 9);
    }

    #[test]
    fn test_json_round_trip() {
        let mut record = StructuredRecord::new();
        record.insert(FieldId::AnnualIncome, entry(FieldValue::Amount(95_000.0), 0.95));
        record.insert(
            FieldId::RiskTolerance,
            FieldEntry {
                value: FieldValue::Choice("moderate".to_string()),
                confidence: 0.75,
                low_confidence: true,
                competing_value: Some(FieldValue::Choice("conservative".to_string())),
                source: Strategy::Category,
                turn_index: 7,
            },
        );

        let json = serde_json::to_string(&record).unwrap();
        let parsed: StructuredRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["annual_income"]["value"], 95_000.0);
        assert_eq!(value[COMPLETION_KEY], 0.2);
    }

    #[test]
    fn test_deserialize_rejects_invalid_values() {
        let json = r#"{"email": {"value": "nope", "confidence": 1.0, "source": "pattern", "turn_index": 0}}"#;
        assert!(serde_json::from_str::<StructuredRecord>(json).is_err());

        let json = r#"{"favourite_colour": {"value": "red", "confidence": 1.0, "source": "pattern", "turn_index": 0}}"#;
        assert!(serde_json::from_str::<StructuredRecord>(json).is_err());
    }
}

//! Per-molecule, per-endpoint results.

use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactRow, ParsedArtifact};
use crate::catalog::EndpointInfo;

/// Auxiliary payload attached to an [`EndpointOutcome`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawData {
    /// The artifact never appeared: `{"missing": true}`.
    Missing { missing: bool },

    /// Whole-artifact payload shared by every molecule (text blob, or a
    /// table without data rows).
    Artifact(ParsedArtifact),

    /// The table row the outcome was classified from, in column order.
    Row(ArtifactRow),
}

impl RawData {
    pub fn missing() -> Self {
        RawData::Missing { missing: true }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, RawData::Missing { missing: true })
    }

    pub fn as_row(&self) -> Option<&ArtifactRow> {
        match self {
            RawData::Row(row) => Some(row),
            _ => None,
        }
    }
}

/// Reconciled result of one endpoint for one molecule.
///
/// Consumers look at `value` first, then `error`, then `raw_data`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointOutcome {
    pub name: String,
    pub unit: String,
    pub description: String,
    pub application: String,

    /// Predicted numeric value; serialized as `"NA"` when absent.
    #[serde(default, with = "na_number")]
    pub value: Option<f64>,

    /// Error text; serialized as `"NA"` when absent.
    #[serde(default, with = "na_text")]
    pub error: Option<String>,

    #[serde(default)]
    pub raw_data: Option<RawData>,
}

impl EndpointOutcome {
    fn with_info(info: &EndpointInfo) -> Self {
        Self {
            name: info.name.clone(),
            unit: info.unit.clone(),
            description: info.description.clone(),
            application: info.application.clone(),
            value: None,
            error: None,
            raw_data: None,
        }
    }

    /// The artifact never appeared.
    pub fn missing(info: &EndpointInfo) -> Self {
        Self {
            raw_data: Some(RawData::missing()),
            ..Self::with_info(info)
        }
    }

    /// The artifact could be read but not split per molecule.
    pub fn unclassified(info: &EndpointInfo, artifact: ParsedArtifact) -> Self {
        Self {
            raw_data: Some(RawData::Artifact(artifact)),
            ..Self::with_info(info)
        }
    }

    /// Reading or parsing the artifact failed.
    pub fn parse_failure(info: &EndpointInfo, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::with_info(info)
        }
    }

    /// Classify one table row.
    ///
    /// The value comes from the first field, in column order, whose name
    /// contains `pred` (any case) and whose text is non-empty and parses as
    /// a finite number once a decimal comma is turned into a point. A
    /// non-numeric `pred` field becomes the error unless an earlier one
    /// already did. A non-empty `Error` column always wins as the error.
    pub fn from_row(info: &EndpointInfo, row: ArtifactRow) -> Self {
        let mut value = None;
        let mut error = row
            .get("Error")
            .filter(|text| !text.is_empty())
            .cloned();

        for (column, text) in &row {
            if text.is_empty() || !column.to_lowercase().contains("pred") {
                continue;
            }
            let trimmed = text.trim();
            match parse_number(trimmed) {
                Some(number) => {
                    value = Some(number);
                    break;
                }
                None => {
                    if error.is_none() {
                        error = Some(trimmed.to_string());
                    }
                }
            }
        }

        Self {
            value,
            error,
            raw_data: Some(RawData::Row(row)),
            ..Self::with_info(info)
        }
    }

    pub fn is_missing(&self) -> bool {
        self.raw_data.as_ref().is_some_and(RawData::is_missing)
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// `Option<f64>` as a JSON number or the string `"NA"`.
mod na_number {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(number) => s.serialize_f64(*number),
            None => s.serialize_str("NA"),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }

        Ok(match Option::<Repr>::deserialize(d)? {
            Some(Repr::Number(number)) => Some(number),
            Some(Repr::Text(_)) | None => None,
        })
    }
}

/// `Option<String>` where both `None` and empty text appear as `"NA"`.
mod na_text {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(text) if !text.is_empty() => s.serialize_str(text),
            _ => s.serialize_str("NA"),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(Option::<String>::deserialize(d)?.filter(|text| !text.is_empty() && text != "NA"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info() -> EndpointInfo {
        EndpointInfo::new("96h Fathead Minnow LC50", "mg/L", "fish", "aquatic")
    }

    fn row(pairs: &[(&str, &str)]) -> ArtifactRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_pred_value_parsed() {
        let outcome = EndpointOutcome::from_row(&info(), row(&[("Index", "1"), ("Pred_Value", "3.14")]));
        assert_eq!(outcome.value, Some(3.14));
        assert!(outcome.error.is_none());
        assert_eq!(outcome.name, "96h Fathead Minnow LC50");
    }

    #[test]
    fn test_decimal_comma_normalized() {
        let outcome = EndpointOutcome::from_row(&info(), row(&[("Pred_Value", " 2,5 ")]));
        assert_eq!(outcome.value, Some(2.5));
    }

    #[test]
    fn test_error_column_wins_over_value() {
        let outcome = EndpointOutcome::from_row(
            &info(),
            row(&[("Pred_Value", "1.0"), ("Error", "Outside applicability domain")]),
        );
        assert_eq!(outcome.value, Some(1.0));
        assert_eq!(outcome.error.as_deref(), Some("Outside applicability domain"));
    }

    #[test]
    fn test_error_column_verbatim() {
        let outcome = EndpointOutcome::from_row(
            &info(),
            row(&[("Index", "1"), ("Pred_Value", ""), ("Error", "  Calculation failed ")]),
        );
        assert!(outcome.value.is_none());
        assert_eq!(outcome.error.as_deref(), Some("  Calculation failed "));
    }

    #[test]
    fn test_first_numeric_pred_column_wins() {
        let outcome = EndpointOutcome::from_row(
            &info(),
            row(&[("Pred_Value_Log", "N/A"), ("Pred_Value", "7"), ("Predicted", "9")]),
        );
        assert_eq!(outcome.value, Some(7.0));
        // The earlier non-numeric field is kept as error text.
        assert_eq!(outcome.error.as_deref(), Some("N/A"));
    }

    #[test]
    fn test_first_non_numeric_pred_text_wins() {
        let outcome = EndpointOutcome::from_row(
            &info(),
            row(&[("PRED_A", "first"), ("pred_b", "second")]),
        );
        assert!(outcome.value.is_none());
        assert_eq!(outcome.error.as_deref(), Some("first"));
    }

    #[test]
    fn test_non_pred_columns_ignored() {
        let outcome = EndpointOutcome::from_row(&info(), row(&[("Exp_Value", "4.2"), ("MW", "46.07")]));
        assert!(outcome.value.is_none());
        assert!(outcome.error.is_none());
        assert!(outcome.raw_data.as_ref().unwrap().as_row().is_some());
    }

    #[test]
    fn test_non_finite_is_not_a_value() {
        let outcome = EndpointOutcome::from_row(&info(), row(&[("Pred_Value", "NaN")]));
        assert!(outcome.value.is_none());
        assert_eq!(outcome.error.as_deref(), Some("NaN"));
    }

    #[test]
    fn test_missing_marker() {
        let outcome = EndpointOutcome::missing(&info());
        assert!(outcome.is_missing());
        assert!(outcome.value.is_none());
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_na_serialization() {
        let outcome = EndpointOutcome::missing(&info());
        let v = serde_json::to_value(&outcome).unwrap();
        assert_eq!(v["value"], json!("NA"));
        assert_eq!(v["error"], json!("NA"));
        assert_eq!(v["raw_data"], json!({"missing": true}));
    }

    #[test]
    fn test_text_artifact_serialization() {
        let outcome = EndpointOutcome::unclassified(&info(), ParsedArtifact::Text("no table".to_string()));
        let v = serde_json::to_value(&outcome).unwrap();
        assert_eq!(v["raw_data"], json!({"type": "text", "data": "no table"}));
    }

    #[test]
    fn test_row_serialization_keeps_column_order() {
        let outcome = EndpointOutcome::from_row(&info(), row(&[("Index", "1"), ("Pred_Value", "3.14")]));
        let text = serde_json::to_string(&outcome).unwrap();
        let index_pos = text.find("\"Index\"").unwrap();
        let pred_pos = text.find("\"Pred_Value\"").unwrap();
        assert!(index_pos < pred_pos);
    }

    #[test]
    fn test_deserialize_na_fields() {
        let v = json!({
            "name": "n", "unit": "u", "description": "d", "application": "a",
            "value": "NA", "error": "NA", "raw_data": {"missing": true}
        });
        let outcome: EndpointOutcome = serde_json::from_value(v).unwrap();
        assert!(outcome.value.is_none());
        assert!(outcome.error.is_none());
        assert!(outcome.is_missing());
    }
}

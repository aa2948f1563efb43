// Wire-level data shapes: model identifiers, tables and the status
// document returned by the polling endpoints.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::{Error, Result};

/// Identifier the backend assigns to a model on upload.
///
/// The backend may hand out numbers or strings. The id is echoed back
/// on the wire in the same JSON type it arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelId {
    Numeric(Number),
    Text(String),
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelId::Numeric(n) => write!(f, "{}", n),
            ModelId::Text(s) => f.write_str(s),
        }
    }
}

impl FromStr for ModelId {
    type Err = std::convert::Infallible;

    /// Canonical integers parse as a numeric id. Anything else, including
    /// `0042` or `+5`, is kept verbatim as text.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<i64>() {
            Ok(n) if n.to_string() == s => ModelId::Numeric(n.into()),
            _ => ModelId::Text(s.to_string()),
        })
    }
}

/// Tabular data: row 0 is the header, the remaining rows are data.
///
/// Cells are opaque JSON values and are passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<Value>>", into = "Vec<Vec<Value>>")]
pub struct Table {
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table, rejecting one without a header row.
    pub fn new(rows: Vec<Vec<Value>>) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::EmptyTable);
        }
        Ok(Table { rows })
    }

    pub fn header(&self) -> &[Value] {
        &self.rows[0]
    }

    pub fn data_rows(&self) -> &[Vec<Value>] {
        &self.rows[1..]
    }

    /// Number of rows including the header. Always at least one.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl TryFrom<Vec<Vec<Value>>> for Table {
    type Error = Error;

    fn try_from(rows: Vec<Vec<Value>>) -> Result<Self> {
        Table::new(rows)
    }
}

impl From<Table> for Vec<Vec<Value>> {
    fn from(table: Table) -> Self {
        table.rows
    }
}

/// Status document returned by the status endpoints. Either field may be
/// absent or hold any JSON value; only the strings `imported`, `trained`
/// and `error` are terminal.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelStatus {
    #[serde(default)]
    pub dataset_status: Option<Value>,
    #[serde(default)]
    pub status: Option<Value>,
}

/// Which status field a poll is watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAxis {
    /// `dataset_status`, settles at `imported`.
    Dataset,
    /// `status`, settles at `trained`.
    Training,
}

/// What a single status read means for the axis being watched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Settled,
    Failed,
    Pending,
}

impl StatusAxis {
    pub fn field_name(self) -> &'static str {
        match self {
            StatusAxis::Dataset => "dataset_status",
            StatusAxis::Training => "status",
        }
    }

    fn success_value(self) -> &'static str {
        match self {
            StatusAxis::Dataset => "imported",
            StatusAxis::Training => "trained",
        }
    }

    pub fn observe(self, status: &ModelStatus) -> Progress {
        let value = match self {
            StatusAxis::Dataset => status.dataset_status.as_ref(),
            StatusAxis::Training => status.status.as_ref(),
        };
        let value = value.and_then(Value::as_str);
        match value {
            Some(v) if v == self.success_value() => Progress::Settled,
            Some("error") => Progress::Failed,
            _ => Progress::Pending,
        }
    }

    /// The domain error raised when this axis reports `error`.
    pub fn failure(self, model_id: &ModelId) -> Error {
        let model_id = model_id.clone();
        match self {
            StatusAxis::Dataset => Error::ImportFailed { model_id },
            StatusAxis::Training => Error::TrainingFailed { model_id },
        }
    }
}

impl fmt::Display for StatusAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Response of the import endpoints: `{ "model": { "id": ... } }`.
#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    pub model: UploadedModel,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadedModel {
    pub id: ModelId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn model_id_keeps_wire_type() {
        let numeric: ModelId = serde_json::from_value(json!(42)).unwrap();
        let text: ModelId = serde_json::from_value(json!("abc-1")).unwrap();

        assert_eq!(numeric, ModelId::Numeric(42.into()));
        assert_eq!(text, ModelId::Text("abc-1".to_string()));
        assert_eq!(serde_json::to_value(&numeric).unwrap(), json!(42));
        assert_eq!(serde_json::to_value(&text).unwrap(), json!("abc-1"));
    }

    #[test]
    fn model_id_from_cli_input() {
        assert_eq!("17".parse::<ModelId>().unwrap(), ModelId::Numeric(17.into()));
        assert_eq!("-3".parse::<ModelId>().unwrap(), ModelId::Numeric((-3).into()));
        assert_eq!(
            " 64f0c1 ".parse::<ModelId>().unwrap(),
            ModelId::Text("64f0c1".to_string())
        );
    }

    #[test]
    fn leading_zero_input_stays_text() {
        let id: ModelId = "0042".parse().unwrap();
        assert_eq!(id, ModelId::Text("0042".to_string()));
        assert_eq!(id.to_string(), "0042");
        assert_eq!(
            "+5".parse::<ModelId>().unwrap(),
            ModelId::Text("+5".to_string())
        );
    }

    #[test]
    fn non_integer_and_large_ids_are_kept_exactly() {
        let float: ModelId = serde_json::from_value(json!(7.0)).unwrap();
        let big: ModelId = serde_json::from_value(json!(u64::MAX)).unwrap();

        assert!(matches!(float, ModelId::Numeric(_)));
        assert_eq!(serde_json::to_value(&float).unwrap(), json!(7.0));
        assert_eq!(serde_json::to_value(&big).unwrap(), json!(u64::MAX));
        assert_eq!(big.to_string(), u64::MAX.to_string());
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(matches!(Table::new(vec![]), Err(Error::EmptyTable)));
        assert!(serde_json::from_value::<Table>(json!([])).is_err());
    }

    #[test]
    fn table_splits_header_from_rows() {
        let table: Table =
            serde_json::from_value(json!([["a", "b"], [1, 2], [3, 4]])).unwrap();

        assert_eq!(table.header(), &[json!("a"), json!("b")]);
        assert_eq!(table.data_rows().len(), 2);
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn header_only_table_has_no_data_rows() {
        let table = Table::new(vec![vec![json!("only")]]).unwrap();
        assert!(table.data_rows().is_empty());
    }

    #[test]
    fn axes_read_their_own_field() {
        let status: ModelStatus =
            serde_json::from_value(json!({"dataset_status": "imported", "status": "training"}))
                .unwrap();

        assert_eq!(StatusAxis::Dataset.observe(&status), Progress::Settled);
        assert_eq!(StatusAxis::Training.observe(&status), Progress::Pending);
    }

    #[test]
    fn non_string_status_values_are_pending() {
        let status: ModelStatus =
            serde_json::from_value(json!({"dataset_status": "importing", "status": 0})).unwrap();
        let odd: ModelStatus =
            serde_json::from_value(json!({"dataset_status": {"step": 2}, "status": null}))
                .unwrap();

        assert_eq!(StatusAxis::Training.observe(&status), Progress::Pending);
        assert_eq!(StatusAxis::Dataset.observe(&status), Progress::Pending);
        assert_eq!(StatusAxis::Dataset.observe(&odd), Progress::Pending);
        assert_eq!(StatusAxis::Training.observe(&odd), Progress::Pending);
    }

    #[test]
    fn error_and_missing_values() {
        let failed: ModelStatus = serde_json::from_value(json!({"status": "error"})).unwrap();
        let empty: ModelStatus = serde_json::from_value(json!({})).unwrap();

        assert_eq!(StatusAxis::Training.observe(&failed), Progress::Failed);
        assert_eq!(StatusAxis::Dataset.observe(&failed), Progress::Pending);
        assert_eq!(StatusAxis::Dataset.observe(&empty), Progress::Pending);
        assert!(matches!(
            StatusAxis::Dataset.failure(&ModelId::Numeric(1.into())),
            Error::ImportFailed { .. }
        ));
    }

    #[test]
    fn upload_response_shape() {
        let resp: UploadResponse =
            serde_json::from_value(json!({"model": {"id": 9, "name": "x"}})).unwrap();
        assert_eq!(resp.model.id, ModelId::Numeric(9.into()));
    }
}

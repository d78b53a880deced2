//! Flattens one file's predictions into a named-column record and collects
//! records into a table that is written once per batch.

use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::error::Result;
use crate::heads::Scores;

/// Column holding opaque head output
pub const PREDICTIONS_COLUMN: &str = "predictions";
pub const FILENAME_COLUMN: &str = "filename";

/// A single table cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(f32),
    Text(String),
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Number(v)
    }
}

impl From<Option<f32>> for Value {
    fn from(v: Option<f32>) -> Self {
        v.map_or(Value::Null, Value::Number)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Number(n) if n.is_finite() => write!(f, "{n}"),
            Value::Number(_) => Ok(()),
            Value::Text(t) => f.write_str(t),
        }
    }
}

pub type Fields = Vec<(String, Value)>;

/// Evaluate one field, recording `Null` instead of failing the record.
pub fn attempt<T, F>(field: &str, compute: F) -> Value
where
    T: Into<Value>,
    F: FnOnce() -> Result<T>,
{
    match compute() {
        Ok(v) => v.into(),
        Err(e) => {
            tracing::debug!("Field `{}` unavailable: {}", field, e);
            Value::Null
        }
    }
}

/// Flatten labeled scores into fields. Opaque output keeps every label column
/// (as null) and carries the raw payload under `predictions`.
pub fn scores_to_fields(scores: &Scores, labels: &crate::labels::LabelSet) -> Fields {
    match scores {
        Scores::Labeled(items) => items
            .iter()
            .map(|s| (s.label.clone(), Value::from(s.probability)))
            .collect(),
        Scores::Opaque(raw) => labels
            .iter()
            .map(|l| (l.to_string(), Value::Null))
            .chain(std::iter::once((
                PREDICTIONS_COLUMN.to_string(),
                Value::Text(raw.clone()),
            )))
            .collect(),
    }
}

/// One row: a filename and its task fields.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub filename: String,
    pub fields: Fields,
}

impl PredictionRecord {
    pub fn new(filename: impl Into<String>, fields: Fields) -> Self {
        Self {
            filename: filename.into(),
            fields,
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }
}

/// All successful records of one task.
#[derive(Debug, Default, Clone)]
pub struct ResultTable {
    records: Vec<PredictionRecord>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: PredictionRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PredictionRecord] {
        &self.records
    }

    /// `filename`, then every field name in order of first appearance.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec![FILENAME_COLUMN.to_string()];
        for record in &self.records {
            for (name, _) in &record.fields {
                if !columns.iter().any(|c| c == name) {
                    columns.push(name.clone());
                }
            }
        }
        columns
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut writer = csv::Writer::from_path(path)?;
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn write_to<W: std::io::Write>(&self, writer: &mut csv::Writer<W>) -> Result<()> {
        let columns = self.columns();
        writer.write_record(&columns)?;
        for record in &self.records {
            let row = columns.iter().map(|column| {
                if column == FILENAME_COLUMN {
                    record.filename.clone()
                } else {
                    record.get(column).map(Value::to_string).unwrap_or_default()
                }
            });
            writer.write_record(row)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnnotateError;
    use crate::heads::LabelScore;
    use crate::labels::LabelSet;

    fn render(table: &ResultTable) -> String {
        let mut writer = csv::Writer::from_writer(Vec::new());
        table.write_to(&mut writer).unwrap();
        String::from_utf8(writer.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn attempt_records_null_on_failure() {
        let ok = attempt("tempo", || Ok(120.0f32));
        let failed = attempt::<f32, _>("key", || {
            Err(AnnotateError::Descriptor("key".into(), "boom".into()))
        });
        assert_eq!(ok, Value::Number(120.0));
        assert_eq!(failed, Value::Null);
    }

    #[test]
    fn numbers_render_as_plain_decimals() {
        assert_eq!(Value::Number(0.0000001).to_string(), "0.0000001");
        assert_eq!(Value::Number(0.25).to_string(), "0.25");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Number(f32::NAN).to_string(), "");
    }

    #[test]
    fn columns_follow_label_order_and_opaque_column_trails() {
        let labels = LabelSet::from_static(&["b", "a"]);
        let labeled = Scores::Labeled(vec![
            LabelScore { label: "b".into(), probability: Some(0.5) },
            LabelScore { label: "a".into(), probability: None },
        ]);
        let mut table = ResultTable::new();
        table.push(PredictionRecord::new("1.mp3", scores_to_fields(&labeled, &labels)));
        table.push(PredictionRecord::new(
            "2.mp3",
            scores_to_fields(&Scores::Opaque("raw".into()), &labels),
        ));

        assert_eq!(table.columns(), vec!["filename", "b", "a", "predictions"]);
        assert_eq!(render(&table), "filename,b,a,predictions\n1.mp3,0.5,,\n2.mp3,,,raw\n");
    }

    #[test]
    fn write_csv_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.csv");
        let mut table = ResultTable::new();
        table.push(PredictionRecord::new("x.mp3", vec![("v".into(), Value::Number(1.0))]));
        table.write_csv(&path).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "filename,v\nx.mp3,1\n");
    }
}

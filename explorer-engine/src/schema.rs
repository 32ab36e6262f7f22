use std::collections::HashSet;

use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::error::ExplorerError;

/// How a column is treated by the workflow. Declared once at upload and
/// carried through every transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Boolean,
    Categorical,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Categorical => "categorical",
        }
    }

    pub fn of(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float16
            | DataType::Float32
            | DataType::Float64 => Some(ColumnKind::Numeric),
            DataType::Boolean => Some(ColumnKind::Boolean),
            DataType::Utf8 | DataType::LargeUtf8 => Some(ColumnKind::Categorical),
            _ => None,
        }
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    columns: Vec<ColumnSpec>,
}

impl TableSchema {
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self, ExplorerError> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(ExplorerError::DuplicateColumn {
                    column: column.name.clone(),
                });
            }
        }
        Ok(Self { columns })
    }

    /// Declares a schema from the Arrow types of a freshly parsed batch.
    pub fn infer(batch: &RecordBatch) -> Result<Self, ExplorerError> {
        let columns = batch
            .schema()
            .fields()
            .iter()
            .map(|field| {
                let kind = ColumnKind::of(field.data_type()).ok_or_else(|| {
                    ExplorerError::SchemaMismatch {
                        message: format!(
                            "column '{}' has unsupported type {}",
                            field.name(),
                            arrow_type_to_string(field.data_type())
                        ),
                    }
                })?;
                Ok(ColumnSpec {
                    name: field.name().clone(),
                    kind,
                })
            })
            .collect::<Result<Vec<_>, ExplorerError>>()?;
        Self::new(columns)
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn get(&self, name: &str) -> Result<&ColumnSpec, ExplorerError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ExplorerError::UnknownColumn {
                column: name.to_string(),
            })
    }

    pub fn project(&self, indices: &[usize]) -> Self {
        Self {
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
        }
    }

    /// Checks that a batch still carries exactly the declared columns.
    pub fn validate(&self, batch: &RecordBatch) -> Result<(), ExplorerError> {
        let arrow_schema = batch.schema();
        let fields = arrow_schema.fields();
        if fields.len() != self.columns.len() {
            return Err(ExplorerError::SchemaMismatch {
                message: format!(
                    "expected {} columns, table has {}",
                    self.columns.len(),
                    fields.len()
                ),
            });
        }

        for (spec, field) in self.columns.iter().zip(fields.iter()) {
            if &spec.name != field.name() {
                return Err(ExplorerError::SchemaMismatch {
                    message: format!("expected column '{}', found '{}'", spec.name, field.name()),
                });
            }
            if ColumnKind::of(field.data_type()) != Some(spec.kind) {
                return Err(ExplorerError::ColumnType {
                    column: spec.name.clone(),
                    expected: spec.kind.to_string(),
                    found: arrow_type_to_string(field.data_type()),
                });
            }
        }

        Ok(())
    }
}

pub fn arrow_type_to_string(data_type: &DataType) -> String {
    match data_type {
        DataType::Boolean => "Boolean".to_string(),
        DataType::Int8 => "Int8".to_string(),
        DataType::Int16 => "Int16".to_string(),
        DataType::Int32 => "Int32".to_string(),
        DataType::Int64 => "Int64".to_string(),
        DataType::UInt8 => "UInt8".to_string(),
        DataType::UInt16 => "UInt16".to_string(),
        DataType::UInt32 => "UInt32".to_string(),
        DataType::UInt64 => "UInt64".to_string(),
        DataType::Float16 => "Float16".to_string(),
        DataType::Float32 => "Float32".to_string(),
        DataType::Float64 => "Float64".to_string(),
        DataType::Utf8 => "String".to_string(),
        DataType::LargeUtf8 => "LargeString".to_string(),
        DataType::Date32 => "Date32".to_string(),
        DataType::Date64 => "Date64".to_string(),
        DataType::Timestamp(unit, tz) => match tz {
            Some(tz) => format!("Timestamp({:?}, {})", unit, tz),
            None => format!("Timestamp({:?})", unit),
        },
        _ => format!("{:?}", data_type),
    }
}

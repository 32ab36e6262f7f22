use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray};
use arrow::compute::{cast, concat_batches, filter_record_batch};
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Float32Type, Float64Type, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{ColumnInfo, ColumnSelection, TablePreview};
use crate::error::ExplorerError;
use crate::schema::{arrow_type_to_string, ColumnKind, ColumnSpec, TableSchema};

/// Tokens read as a missing value, anchored to the whole field.
const MISSING_VALUE_PATTERN: &str = r"^(|#N/A|#N/A N/A|#NA|-1\.#IND|-1\.#QNAN|-NaN|-nan|1\.#IND|1\.#QNAN|<NA>|N/A|NA|NULL|NaN|None|n/a|nan|null)$";

const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvOptions {
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvOptions {
    /// Accepts `,`, `;`, `|`, a literal tab or the word `tab`.
    pub fn with_delimiter_str(self, delimiter: &str) -> Result<Self, ExplorerError> {
        let byte = match delimiter {
            "tab" | "\\t" | "\t" => b'\t',
            other if other.len() == 1 => other.as_bytes()[0],
            other => {
                return Err(ExplorerError::Parse {
                    message: format!("Unsupported delimiter: {:?}", other),
                })
            }
        };
        if !DELIMITERS.contains(&byte) {
            return Err(ExplorerError::Parse {
                message: format!("Unsupported delimiter: {:?}", delimiter),
            });
        }
        Ok(Self { delimiter: byte })
    }
}

/// An in-memory table with a declared column schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    schema: TableSchema,
    batch: RecordBatch,
}

impl Dataset {
    pub fn new(schema: TableSchema, batch: RecordBatch) -> Result<Self, ExplorerError> {
        schema.validate(&batch)?;
        Ok(Self { schema, batch })
    }

    /// Builds a dataset from columns that all have `num_rows` rows. Used by
    /// transforms that rebuild the column list.
    pub fn from_columns(
        columns: Vec<(ColumnSpec, ArrayRef)>,
        num_rows: usize,
    ) -> Result<Self, ExplorerError> {
        let (specs, arrays): (Vec<_>, Vec<_>) = columns.into_iter().unzip();
        let fields: Vec<Field> = specs
            .iter()
            .zip(arrays.iter())
            .map(|(spec, array)| Field::new(spec.name.clone(), array.data_type().clone(), true))
            .collect();
        let batch = RecordBatch::try_new_with_options(
            Arc::new(Schema::new(fields)),
            arrays,
            &RecordBatchOptions::new().with_row_count(Some(num_rows)),
        )?;
        Self::new(TableSchema::new(specs)?, batch)
    }

    pub fn from_csv(bytes: &[u8], options: &CsvOptions) -> Result<Self, ExplorerError> {
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(ExplorerError::Parse {
                message: "file is empty".to_string(),
            });
        }

        let null_regex = Regex::new(MISSING_VALUE_PATTERN)?;
        let format = Format::default()
            .with_header(true)
            .with_delimiter(options.delimiter)
            .with_null_regex(null_regex.clone());
        let (inferred, records) = format
            .infer_schema(Cursor::new(bytes), None)
            .map_err(parse_error)?;

        if inferred.fields().is_empty() {
            return Err(ExplorerError::Parse {
                message: "no columns found in header".to_string(),
            });
        }

        let schema = Arc::new(Schema::new(normalize_fields(&inferred)));
        debug!(
            "Inferred {} columns over {} records",
            schema.fields().len(),
            records
        );

        let reader = ReaderBuilder::new(schema.clone())
            .with_header(true)
            .with_delimiter(options.delimiter)
            .with_null_regex(null_regex)
            .build(Cursor::new(bytes))
            .map_err(parse_error)?;
        let batches = reader
            .collect::<Result<Vec<_>, _>>()
            .map_err(parse_error)?;
        let batch = concat_batches(&schema, &batches)?;

        let table_schema = TableSchema::infer(&batch)?;
        info!(
            "Parsed dataset with {} rows and {} columns",
            batch.num_rows(),
            batch.num_columns()
        );
        Self::new(table_schema, batch)
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.schema.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema.names()
    }

    pub fn column(&self, name: &str) -> Result<(&ColumnSpec, &ArrayRef), ExplorerError> {
        let index = self
            .schema
            .index_of(name)
            .ok_or_else(|| ExplorerError::UnknownColumn {
                column: name.to_string(),
            })?;
        Ok((&self.schema.columns()[index], self.batch.column(index)))
    }

    pub fn columns(&self) -> impl Iterator<Item = (&ColumnSpec, &ArrayRef)> {
        self.schema.columns().iter().zip(self.batch.columns().iter())
    }

    pub fn column_infos(&self) -> Vec<ColumnInfo> {
        self.columns()
            .map(|(spec, array)| ColumnInfo {
                name: spec.name.clone(),
                kind: spec.kind,
                data_type: arrow_type_to_string(array.data_type()),
                missing: (0..array.len())
                    .filter(|&row| is_missing(array.as_ref(), row))
                    .count(),
            })
            .collect()
    }

    pub fn correlatable_column_names(&self) -> Vec<String> {
        self.schema
            .columns()
            .iter()
            .filter(|c| matches!(c.kind, ColumnKind::Numeric | ColumnKind::Boolean))
            .map(|c| c.name.clone())
            .collect()
    }

    /// Resolves a selection to column indices in dataset order.
    pub fn resolve(&self, selection: &ColumnSelection) -> Result<Vec<usize>, ExplorerError> {
        match selection {
            ColumnSelection::All => Ok((0..self.num_columns()).collect()),
            ColumnSelection::None => Ok(Vec::new()),
            ColumnSelection::Subset(names) => {
                let mut wanted = HashSet::new();
                for name in names {
                    self.schema.get(name)?;
                    wanted.insert(name.as_str());
                }
                Ok(self
                    .schema
                    .columns()
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| wanted.contains(c.name.as_str()))
                    .map(|(i, _)| i)
                    .collect())
            }
        }
    }

    pub fn select(&self, selection: &ColumnSelection) -> Result<Self, ExplorerError> {
        let indices = self.resolve(selection)?;
        let batch = self.batch.project(&indices)?;
        Self::new(self.schema.project(&indices), batch)
    }

    /// Removes every row holding a null or NaN in any column.
    pub fn drop_missing(&self) -> Result<Self, ExplorerError> {
        let mut keep = vec![true; self.num_rows()];
        for array in self.batch.columns() {
            if array.null_count() == 0 && !is_float(array.data_type()) {
                continue;
            }
            for (row, slot) in keep.iter_mut().enumerate() {
                if *slot && is_missing(array.as_ref(), row) {
                    *slot = false;
                }
            }
        }

        if keep.iter().all(|k| *k) {
            return Ok(self.clone());
        }

        let mask = BooleanArray::from(keep);
        let batch = filter_record_batch(&self.batch, &mask)?;
        debug!(
            "Dropped {} rows with missing values",
            self.num_rows() - batch.num_rows()
        );
        Self::new(self.schema.clone(), batch)
    }

    pub fn head(&self, rows: usize) -> Self {
        Self {
            schema: self.schema.clone(),
            batch: self.batch.slice(0, rows.min(self.num_rows())),
        }
    }

    pub fn preview(&self, rows: usize) -> Result<TablePreview, ExplorerError> {
        let head = self.head(rows);
        let options = FormatOptions::default();
        let formatters = head
            .batch
            .columns()
            .iter()
            .map(|array| ArrayFormatter::try_new(array.as_ref(), &options))
            .collect::<Result<Vec<_>, _>>()?;

        let rows = (0..head.num_rows())
            .map(|row| {
                head.batch
                    .columns()
                    .iter()
                    .zip(formatters.iter())
                    .map(|(array, formatter)| {
                        (!array.is_null(row)).then(|| formatter.value(row).to_string())
                    })
                    .collect()
            })
            .collect();

        Ok(TablePreview {
            columns: self.column_names(),
            rows,
            total_rows: self.num_rows(),
        })
    }

    /// Values of a numeric column as `f64`; nulls and NaN come back as `None`.
    pub fn numeric_values(&self, name: &str) -> Result<Vec<Option<f64>>, ExplorerError> {
        let (spec, array) = self.column(name)?;
        if spec.kind != ColumnKind::Numeric {
            return Err(ExplorerError::ColumnType {
                column: name.to_string(),
                expected: ColumnKind::Numeric.to_string(),
                found: spec.kind.to_string(),
            });
        }
        let floats = cast(array.as_ref(), &DataType::Float64)?;
        Ok(floats
            .as_primitive::<Float64Type>()
            .iter()
            .map(|value| value.filter(|v| !v.is_nan()))
            .collect())
    }

    /// Numeric values, plus boolean columns read as 0/1.
    pub fn indicator_values(&self, name: &str) -> Result<Vec<Option<f64>>, ExplorerError> {
        let (spec, array) = self.column(name)?;
        if spec.kind != ColumnKind::Boolean {
            return self.numeric_values(name);
        }
        let floats = cast(array.as_ref(), &DataType::Float64)?;
        Ok(floats.as_primitive::<Float64Type>().iter().collect())
    }

    /// Values of any column rendered as text; missing values come back as `None`.
    pub fn display_values(&self, name: &str) -> Result<Vec<Option<String>>, ExplorerError> {
        let (_, array) = self.column(name)?;
        let options = FormatOptions::default();
        let formatter = ArrayFormatter::try_new(array.as_ref(), &options)?;
        Ok((0..array.len())
            .map(|row| {
                (!is_missing(array.as_ref(), row)).then(|| formatter.value(row).to_string())
            })
            .collect())
    }

    pub fn to_csv(&self, options: &CsvOptions) -> Result<Vec<u8>, ExplorerError> {
        let mut buffer = Vec::new();
        {
            let mut writer = WriterBuilder::new()
                .with_header(true)
                .with_delimiter(options.delimiter)
                .build(&mut buffer);
            writer.write(&self.batch)?;
        }
        Ok(buffer)
    }
}

fn parse_error(err: arrow::error::ArrowError) -> ExplorerError {
    ExplorerError::Parse {
        message: err.to_string(),
    }
}

fn is_float(data_type: &DataType) -> bool {
    matches!(data_type, DataType::Float32 | DataType::Float64)
}

pub(crate) fn is_missing(array: &dyn Array, row: usize) -> bool {
    if array.is_null(row) {
        return true;
    }
    match array.data_type() {
        DataType::Float64 => array.as_primitive::<Float64Type>().value(row).is_nan(),
        DataType::Float32 => array.as_primitive::<Float32Type>().value(row).is_nan(),
        _ => false,
    }
}

/// Maps inferred CSV types onto the three column kinds and gives every
/// column a unique, non-empty name.
fn normalize_fields(inferred: &Schema) -> Vec<Field> {
    let mut used: HashSet<String> = HashSet::new();
    inferred
        .fields()
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let data_type = match field.data_type() {
                DataType::Int64 => DataType::Int64,
                DataType::Float64 | DataType::Null => DataType::Float64,
                DataType::Boolean => DataType::Boolean,
                _ => DataType::Utf8,
            };

            let base = if field.name().trim().is_empty() {
                format!("Unnamed: {}", index)
            } else {
                field.name().clone()
            };
            let mut name = base.clone();
            let mut suffix = 1;
            while used.contains(&name) {
                name = format!("{}.{}", base, suffix);
                suffix += 1;
            }
            used.insert(name.clone());

            Field::new(name, data_type, true)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Dataset {
        Dataset::from_csv(text.as_bytes(), &CsvOptions::default()).unwrap()
    }

    #[test]
    fn infers_column_kinds() {
        let dataset = parse("id,city,score,active\n1,Seoul,1.5,true\n2,Busan,2.5,false\n");
        let kinds: Vec<_> = dataset.schema().columns().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Numeric,
                ColumnKind::Categorical,
                ColumnKind::Numeric,
                ColumnKind::Boolean
            ]
        );
        assert_eq!(dataset.num_rows(), 2);
    }

    #[test]
    fn missing_tokens_become_nulls() {
        let dataset = parse("a,b\n1,x\nNA,\n3,n/a\n");
        let infos = dataset.column_infos();
        assert_eq!(infos[0].missing, 1);
        assert_eq!(infos[1].missing, 2);
        assert_eq!(infos[0].kind, ColumnKind::Numeric);
    }

    #[test]
    fn dates_stay_categorical() {
        let dataset = parse("day,value\n2024-01-01,1\n2024-01-02,2\n");
        assert_eq!(dataset.schema().columns()[0].kind, ColumnKind::Categorical);
    }

    #[test]
    fn duplicate_and_blank_headers_are_renamed() {
        let dataset = parse("a,a,,a\n1,2,3,4\n");
        assert_eq!(
            dataset.column_names(),
            vec!["a", "a.1", "Unnamed: 2", "a.2"]
        );
    }

    #[test]
    fn empty_and_ragged_files_are_parse_errors() {
        let empty = Dataset::from_csv(b"  \n", &CsvOptions::default());
        assert!(matches!(empty, Err(ExplorerError::Parse { .. })));

        let ragged = Dataset::from_csv(b"a,b\n1,2\n3,4,5\n", &CsvOptions::default());
        assert!(matches!(ragged, Err(ExplorerError::Parse { .. })));
    }

    #[test]
    fn semicolon_delimiter() {
        let options = CsvOptions::default().with_delimiter_str(";").unwrap();
        let dataset = Dataset::from_csv(b"a;b\n1;2\n", &options).unwrap();
        assert_eq!(dataset.column_names(), vec!["a", "b"]);
        assert!(CsvOptions::default().with_delimiter_str("::").is_err());
    }

    #[test]
    fn preview_is_first_rows_in_column_order() {
        let dataset = parse("b,a\n1,x\n2,y\n3,z\n");
        let preview = dataset.preview(2).unwrap();
        assert_eq!(preview.columns, vec!["b", "a"]);
        assert_eq!(
            preview.rows,
            vec![
                vec![Some("1".to_string()), Some("x".to_string())],
                vec![Some("2".to_string()), Some("y".to_string())],
            ]
        );
        assert_eq!(preview.total_rows, 3);
    }

    #[test]
    fn subset_selection_follows_dataset_order() {
        let dataset = parse("a,b,c\n1,2,3\n");
        let selected = dataset
            .select(&ColumnSelection::Subset(vec!["c".to_string(), "a".to_string()]))
            .unwrap();
        assert_eq!(selected.column_names(), vec!["a", "c"]);

        let unknown = dataset.select(&ColumnSelection::Subset(vec!["zz".to_string()]));
        assert!(matches!(unknown, Err(ExplorerError::UnknownColumn { .. })));
    }

    #[test]
    fn select_none_keeps_rows() {
        let dataset = parse("a,b\n1,2\n3,4\n");
        let none = dataset.select(&ColumnSelection::None).unwrap();
        assert_eq!(none.num_columns(), 0);
        assert_eq!(none.num_rows(), 2);
    }

    #[test]
    fn drop_missing_removes_incomplete_rows() {
        let dataset = parse("a,b\n1,x\n,y\n3,\n4,z\n");
        let cleaned = dataset.drop_missing().unwrap();
        assert_eq!(cleaned.num_rows(), 2);
        assert!(cleaned.column_infos().iter().all(|c| c.missing == 0));
    }

    #[test]
    fn numeric_values_reject_text_columns() {
        let dataset = parse("a,b\n1,x\n2,y\n");
        assert_eq!(
            dataset.numeric_values("a").unwrap(),
            vec![Some(1.0), Some(2.0)]
        );
        assert!(matches!(
            dataset.numeric_values("b"),
            Err(ExplorerError::ColumnType { .. })
        ));
    }

    #[test]
    fn boolean_columns_read_as_indicators() {
        let dataset = parse("a,flag,t\n1,true,x\n2,,y\n3,false,z\n");
        assert_eq!(dataset.correlatable_column_names(), vec!["a", "flag"]);
        assert_eq!(
            dataset.indicator_values("flag").unwrap(),
            vec![Some(1.0), None, Some(0.0)]
        );
        assert!(dataset.indicator_values("t").is_err());
    }

    #[test]
    fn csv_export_writes_header_and_rows() {
        let dataset = parse("a,b\n1,x\n2,y\n");
        let csv = String::from_utf8(dataset.to_csv(&CsvOptions::default()).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("a,b"));
        assert_eq!(lines.next(), Some("1,x"));
        assert_eq!(lines.next(), Some("2,y"));
    }
}

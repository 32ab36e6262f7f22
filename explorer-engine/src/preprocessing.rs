use std::collections::BTreeSet;
use std::sync::Arc;

use arrow::array::{ArrayRef, AsArray, UInt8Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::domain::PreprocessOptions;
use crate::error::ExplorerError;
use crate::schema::{ColumnKind, ColumnSpec};

/// Runs the preprocessing steps in their fixed order: column selection,
/// missing-row removal, then categorical expansion of the surviving columns.
pub fn preprocess(dataset: &Dataset, options: &PreprocessOptions) -> Result<Dataset, ExplorerError> {
    let mut data = dataset.select(&options.selection)?;

    if options.drop_missing {
        data = data.drop_missing()?;
    }

    if options.one_hot_encode {
        let encoder = OneHotEncoder::fit(&data)?;
        data = encoder.transform(&data)?;
    }

    info!(
        "Preprocessed dataset: {} rows x {} columns (drop_missing={}, one_hot={})",
        data.num_rows(),
        data.num_columns(),
        options.drop_missing,
        options.one_hot_encode
    );
    Ok(data)
}

/// One-hot encoder for categorical columns.
///
/// Fitting records the sorted distinct categories of every categorical
/// column. Transforming drops each fitted column and appends, after the
/// remaining columns and in fitted order, one `UInt8` indicator column per
/// category named `<column>_<category>`.
/// Missing values, and categories not seen while fitting, encode as a row
/// of zeros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneHotEncoder {
    columns: Vec<(String, Vec<String>)>,
}

impl OneHotEncoder {
    pub fn fit(dataset: &Dataset) -> Result<Self, ExplorerError> {
        let mut columns = Vec::new();
        for (spec, array) in dataset.columns() {
            if spec.kind != ColumnKind::Categorical {
                continue;
            }
            let strings = as_utf8(array)?;
            let categories: BTreeSet<String> = strings
                .as_string::<i32>()
                .iter()
                .flatten()
                .map(str::to_string)
                .collect();
            debug!(
                "Column '{}' has {} categories",
                spec.name,
                categories.len()
            );
            columns.push((spec.name.clone(), categories.into_iter().collect()));
        }
        Ok(Self { columns })
    }

    pub fn encoded_columns(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, categories)| categories.as_slice())
    }

    pub fn transform(&self, dataset: &Dataset) -> Result<Dataset, ExplorerError> {
        for (name, _) in &self.columns {
            let (spec, _) = dataset.column(name)?;
            if spec.kind != ColumnKind::Categorical {
                return Err(ExplorerError::ColumnType {
                    column: name.clone(),
                    expected: ColumnKind::Categorical.to_string(),
                    found: spec.kind.to_string(),
                });
            }
        }

        let mut columns: Vec<(ColumnSpec, ArrayRef)> = dataset
            .columns()
            .filter(|(spec, _)| self.categories(&spec.name).is_none())
            .map(|(spec, array)| (spec.clone(), array.clone()))
            .collect();

        for (name, categories) in &self.columns {
            let (_, array) = dataset.column(name)?;
            let strings = as_utf8(array)?;
            let values = strings.as_string::<i32>();
            let unseen = values
                .iter()
                .flatten()
                .filter(|value| categories.binary_search_by(|c| c.as_str().cmp(value)).is_err())
                .count();
            if unseen > 0 {
                debug!(
                    "Column '{}' has {} values outside the fitted categories",
                    name, unseen
                );
            }

            for category in categories {
                let indicator: UInt8Array = values
                    .iter()
                    .map(|value| Some(u8::from(value == Some(category.as_str()))))
                    .collect();
                columns.push((
                    ColumnSpec {
                        name: format!("{}_{}", name, category),
                        kind: ColumnKind::Numeric,
                    },
                    Arc::new(indicator) as ArrayRef,
                ));
            }
        }

        Dataset::from_columns(columns, dataset.num_rows())
    }
}

fn as_utf8(array: &ArrayRef) -> Result<ArrayRef, ExplorerError> {
    match array.data_type() {
        DataType::Utf8 => Ok(array.clone()),
        _ => Ok(cast(array.as_ref(), &DataType::Utf8)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::CsvOptions;
    use crate::domain::ColumnSelection;

    fn parse(text: &str) -> Dataset {
        Dataset::from_csv(text.as_bytes(), &CsvOptions::default()).unwrap()
    }

    #[test]
    fn one_hot_appends_indicators_after_other_columns() {
        let dataset = parse("id,color,size,shape\n1,red,3,box\n2,blue,4,ball\n3,red,5,box\n");
        let encoded = OneHotEncoder::fit(&dataset)
            .unwrap()
            .transform(&dataset)
            .unwrap();

        assert_eq!(
            encoded.column_names(),
            vec!["id", "size", "color_blue", "color_red", "shape_ball", "shape_box"]
        );
        assert_eq!(
            encoded.numeric_values("color_red").unwrap(),
            vec![Some(1.0), Some(0.0), Some(1.0)]
        );
    }

    #[test]
    fn indicators_sum_to_one_per_row() {
        let dataset = parse("c\na\nb\nc\nb\n");
        let encoded = OneHotEncoder::fit(&dataset)
            .unwrap()
            .transform(&dataset)
            .unwrap();
        assert_eq!(encoded.num_columns(), 3);

        let columns: Vec<Vec<Option<f64>>> = encoded
            .column_names()
            .iter()
            .map(|name| encoded.numeric_values(name).unwrap())
            .collect();
        for row in 0..encoded.num_rows() {
            let sum: f64 = columns.iter().map(|c| c[row].unwrap()).sum();
            assert_eq!(sum, 1.0, "row {} should have exactly one indicator", row);
        }
    }

    #[test]
    fn missing_category_encodes_as_zeros() {
        let dataset = parse("c,n\na,1\n,2\nb,3\n");
        let encoded = OneHotEncoder::fit(&dataset)
            .unwrap()
            .transform(&dataset)
            .unwrap();
        assert_eq!(encoded.numeric_values("c_a").unwrap()[1], Some(0.0));
        assert_eq!(encoded.numeric_values("c_b").unwrap()[1], Some(0.0));
    }

    #[test]
    fn unseen_categories_encode_as_zeros() {
        let train = parse("c\na\nb\n");
        let other = parse("c\nb\nz\n");
        let encoder = OneHotEncoder::fit(&train).unwrap();
        let encoded = encoder.transform(&other).unwrap();
        assert_eq!(encoded.column_names(), vec!["c_a", "c_b"]);
        assert_eq!(encoded.numeric_values("c_b").unwrap(), vec![Some(1.0), Some(0.0)]);
        assert_eq!(encoded.numeric_values("c_a").unwrap(), vec![Some(0.0), Some(0.0)]);
    }

    #[test]
    fn colliding_indicator_names_are_rejected() {
        let dataset = parse("c,c_a\na,1\n");
        let result = OneHotEncoder::fit(&dataset).unwrap().transform(&dataset);
        assert!(matches!(result, Err(ExplorerError::DuplicateColumn { .. })));
    }

    #[test]
    fn pipeline_encodes_only_selected_columns() {
        let dataset = parse("a,b,n\nx,p,1\ny,,2\nx,q,\n");
        let options = PreprocessOptions {
            selection: ColumnSelection::Subset(vec!["a".to_string(), "n".to_string()]),
            drop_missing: true,
            one_hot_encode: true,
        };
        let result = preprocess(&dataset, &options).unwrap();
        assert_eq!(result.column_names(), vec!["n", "a_x", "a_y"]);
        assert_eq!(result.num_rows(), 2);
    }

    #[test]
    fn default_options_keep_everything() {
        let dataset = parse("a,b\n1,\n2,y\n");
        let result = preprocess(&dataset, &PreprocessOptions::default()).unwrap();
        assert_eq!(result, dataset);
    }
}

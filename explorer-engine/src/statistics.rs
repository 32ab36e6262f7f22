use serde::Serialize;
use tracing::debug;

use crate::dataset::Dataset;
use crate::domain::ColumnSelection;
use crate::error::ExplorerError;
use crate::schema::ColumnKind;

/// Descriptive statistics for one numeric column. Values that are undefined
/// for the data (the mean of nothing, the spread of a single value) are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStatistics {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    pub q25: Option<f64>,
    #[serde(rename = "50%")]
    pub q50: Option<f64>,
    #[serde(rename = "75%")]
    pub q75: Option<f64>,
    pub max: Option<f64>,
    pub variance: Option<f64>,
    pub median: Option<f64>,
}

impl ColumnStatistics {
    pub fn from_values(column: &str, values: &[Option<f64>]) -> Self {
        let mut present: Vec<f64> = values.iter().flatten().copied().collect();
        present.sort_by(f64::total_cmp);

        let count = present.len();
        let mean = mean(&present);
        let variance = mean.and_then(|m| sample_variance(&present, m));
        let median = percentile(&present, 0.5);

        Self {
            column: column.to_string(),
            count,
            mean,
            std: variance.map(f64::sqrt),
            min: present.first().copied(),
            q25: percentile(&present, 0.25),
            q50: median,
            q75: percentile(&present, 0.75),
            max: present.last().copied(),
            variance,
            median,
        }
    }
}

/// Computes statistics for the numeric columns of a selection, in dataset
/// order. Non-numeric columns in the selection are skipped.
pub fn describe(
    dataset: &Dataset,
    selection: &ColumnSelection,
) -> Result<Vec<ColumnStatistics>, ExplorerError> {
    let indices = dataset.resolve(selection)?;
    if indices.is_empty() {
        return Err(ExplorerError::EmptySelection {
            message: "Select at least one column to analyze.".to_string(),
        });
    }

    let columns = dataset.schema().columns();
    let numeric: Vec<&str> = indices
        .iter()
        .map(|&i| &columns[i])
        .filter(|c| c.kind == ColumnKind::Numeric)
        .map(|c| c.name.as_str())
        .collect();
    if numeric.is_empty() {
        return Err(ExplorerError::EmptySelection {
            message: "None of the selected columns are numeric.".to_string(),
        });
    }

    debug!("Describing {} numeric columns", numeric.len());
    numeric
        .into_iter()
        .map(|name| {
            let values = dataset.numeric_values(name)?;
            Ok(ColumnStatistics::from_values(name, &values))
        })
        .collect()
}

/// Pairwise Pearson correlations between every numeric or boolean column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn compute(dataset: &Dataset) -> Result<Self, ExplorerError> {
        let columns = dataset.correlatable_column_names();
        let series = columns
            .iter()
            .map(|name| dataset.indicator_values(name))
            .collect::<Result<Vec<_>, _>>()?;

        let values = series
            .iter()
            .map(|x| series.iter().map(|y| pearson(x, y)).collect())
            .collect();

        Ok(Self { columns, values })
    }

    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        self.values.get(row).and_then(|r| r.get(column)).copied().flatten()
    }
}

/// Pearson correlation over the rows where both values are present.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let denominator = (sxx * syy).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return None;
    }
    Some((sxy / denominator).clamp(-1.0, 1.0))
}

fn mean(sorted: &[f64]) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    Some(sorted.iter().sum::<f64>() / sorted.len() as f64)
}

fn sample_variance(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some(squares / (values.len() - 1) as f64)
}

/// Linear-interpolation percentile of sorted values, `q` in [0, 1].
fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::CsvOptions;

    fn approx(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("value should be defined");
        assert!(
            (actual - expected).abs() < 1e-3,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn one_to_five() {
        let values: Vec<Option<f64>> = (1..=5).map(|v| Some(v as f64)).collect();
        let stats = ColumnStatistics::from_values("x", &values);
        assert_eq!(stats.count, 5);
        approx(stats.mean, 3.0);
        approx(stats.median, 3.0);
        approx(stats.variance, 2.5);
        approx(stats.std, 1.581);
        approx(stats.min, 1.0);
        approx(stats.q25, 2.0);
        approx(stats.q50, 3.0);
        approx(stats.q75, 4.0);
        approx(stats.max, 5.0);
    }

    #[test]
    fn percentiles_interpolate() {
        let values = vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
        let stats = ColumnStatistics::from_values("x", &values);
        approx(stats.q25, 1.75);
        approx(stats.median, 2.5);
        approx(stats.q75, 3.25);
    }

    #[test]
    fn missing_values_are_not_counted() {
        let stats = ColumnStatistics::from_values("x", &[Some(4.0), None, Some(6.0)]);
        assert_eq!(stats.count, 2);
        approx(stats.mean, 5.0);
    }

    #[test]
    fn single_value_has_no_spread() {
        let stats = ColumnStatistics::from_values("x", &[Some(7.0)]);
        assert_eq!(stats.count, 1);
        assert_eq!(stats.std, None);
        assert_eq!(stats.variance, None);
        approx(stats.median, 7.0);
    }

    #[test]
    fn describe_skips_text_and_rejects_empty() {
        let dataset =
            Dataset::from_csv(b"n,t\n1,a\n2,b\n3,c\n", &CsvOptions::default()).unwrap();

        let table = describe(&dataset, &ColumnSelection::All).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].column, "n");

        assert!(matches!(
            describe(&dataset, &ColumnSelection::None),
            Err(ExplorerError::EmptySelection { .. })
        ));
        assert!(matches!(
            describe(&dataset, &ColumnSelection::Subset(vec!["t".to_string()])),
            Err(ExplorerError::EmptySelection { .. })
        ));
    }

    #[test]
    fn pearson_detects_direction() {
        let x = vec![Some(1.0), Some(2.0), Some(3.0)];
        let up = vec![Some(2.0), Some(4.0), Some(6.0)];
        let down = vec![Some(3.0), Some(2.0), Some(1.0)];
        approx(pearson(&x, &up), 1.0);
        approx(pearson(&x, &down), -1.0);
        assert_eq!(pearson(&x, &[Some(1.0), Some(1.0), Some(1.0)]), None);
    }

    #[test]
    fn correlation_matrix_covers_numeric_columns() {
        let dataset = Dataset::from_csv(
            b"a,b,label\n1,2,x\n2,4,y\n3,7,z\n",
            &CsvOptions::default(),
        )
        .unwrap();
        let matrix = CorrelationMatrix::compute(&dataset).unwrap();
        assert_eq!(matrix.columns, vec!["a", "b"]);
        approx(matrix.get(0, 0), 1.0);
        assert_eq!(matrix.get(0, 1), matrix.get(1, 0));
    }

    #[test]
    fn correlation_matrix_reads_booleans_as_zero_one() {
        let dataset = Dataset::from_csv(
            b"n,flag\n1,false\n2,false\n3,true\n4,true\n",
            &CsvOptions::default(),
        )
        .unwrap();
        let matrix = CorrelationMatrix::compute(&dataset).unwrap();
        assert_eq!(matrix.columns, vec!["n", "flag"]);
        let r = matrix.get(0, 1).unwrap();
        assert!(r > 0.8 && r < 1.0, "unexpected correlation {}", r);
    }
}

use crate::charts::RenderedChart;
use crate::dataset::Dataset;
use crate::domain::{ColumnSelection, Page, PreprocessOptions};
use crate::error::ExplorerError;

/// Everything one user session remembers between interactions. Page
/// handlers receive it explicitly and hand back an updated copy.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub uploaded_data: Option<Dataset>,
    pub preprocessed_data: Option<Dataset>,
    pub page: Page,
    /// Preprocessing controls as last applied.
    pub preprocess_options: PreprocessOptions,
    pub stats_selection: ColumnSelection,
    pub last_chart: Option<RenderedChart>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploaded(&self) -> Result<&Dataset, ExplorerError> {
        self.uploaded_data
            .as_ref()
            .ok_or_else(|| ExplorerError::MissingPrerequisite {
                page: Page::Upload,
                message: "No data has been uploaded. Go to the upload page.".to_string(),
            })
    }

    pub fn preprocessed(&self) -> Result<&Dataset, ExplorerError> {
        self.preprocessed_data
            .as_ref()
            .ok_or_else(|| ExplorerError::MissingPrerequisite {
                page: Page::Preprocessing,
                message: "There is no preprocessed data. Preprocess the data first!".to_string(),
            })
    }

    pub fn chart(&self) -> Result<&RenderedChart, ExplorerError> {
        self.last_chart
            .as_ref()
            .ok_or_else(|| ExplorerError::MissingPrerequisite {
                page: Page::Visualization,
                message: "No chart has been generated yet.".to_string(),
            })
    }

    /// Replaces the derived table. A chart drawn from a different table is
    /// discarded with it.
    pub fn set_preprocessed(&mut self, dataset: Dataset) {
        if self.preprocessed_data.as_ref() != Some(&dataset) {
            self.last_chart = None;
        }
        self.preprocessed_data = Some(dataset);
    }
}

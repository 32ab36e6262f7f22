use tracing::{debug, error, info, warn};

use crate::charts::{ChartKind, ChartRenderer, ChartRequest};
use crate::dataset::{CsvOptions, Dataset};
use crate::domain::{
    ChartView, ColumnSelection, Notice, Page, PageBody, PageView, PreprocessOptions, NavTarget,
};
use crate::error::ExplorerError;
use crate::preprocessing::preprocess;
use crate::session::SessionState;
use crate::settings::EngineSettings;
use crate::statistics::{describe, ColumnStatistics};

/// One user interaction with a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Navigate(Page),
    Upload {
        file_name: String,
        bytes: Vec<u8>,
        options: CsvOptions,
    },
    Preprocess(PreprocessOptions),
    GenerateChart(ChartRequest),
    ComputeStatistics(ColumnSelection),
    /// Redraws the current page.
    Refresh,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Navigate(_) => "navigate",
            Action::Upload { .. } => "upload",
            Action::Preprocess(_) => "preprocess",
            Action::GenerateChart(_) => "generate_chart",
            Action::ComputeStatistics(_) => "compute_statistics",
            Action::Refresh => "refresh",
        }
    }
}

/// The state after an action, and what to show for it.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: SessionState,
    pub view: PageView,
}

/// Applies actions to session state. Holds no per-session data, so one
/// instance serves every session.
#[derive(Debug)]
pub struct Workflow {
    settings: EngineSettings,
    charts: ChartRenderer,
}

impl Workflow {
    pub fn new(settings: EngineSettings) -> Self {
        let charts = ChartRenderer::new(settings.charts.clone());
        Self { settings, charts }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Applies an action. A failed action returns the state it was given,
    /// with the failure reported as a notice in the view.
    pub fn dispatch(&self, state: SessionState, action: Action) -> Transition {
        debug!("Dispatching '{}' on page '{}'", action.name(), state.page);
        match action {
            Action::Navigate(page) => {
                let mut state = state;
                state.page = page;
                self.show(state)
            }
            Action::Refresh => self.show(state),
            Action::Upload {
                file_name,
                bytes,
                options,
            } => self.upload(state, &file_name, &bytes, &options),
            Action::Preprocess(options) => self.apply_preprocessing(state, options),
            Action::GenerateChart(request) => self.generate_chart(state, &request),
            Action::ComputeStatistics(selection) => self.compute_statistics(state, selection),
        }
    }

    /// Renders the page the session is on.
    pub fn show(&self, state: SessionState) -> Transition {
        match state.page {
            Page::Upload => {
                let view = self.upload_view(&state);
                Transition { state, view }
            }
            Page::Preprocessing => {
                let options = state.preprocess_options.clone();
                self.apply_preprocessing(state, options)
            }
            Page::Visualization => match state.preprocessed() {
                Ok(data) => {
                    let chart = state.last_chart.as_ref().map(|chart| ChartView {
                        kind: chart.kind,
                        title: chart.title.clone(),
                        svg: chart.svg.clone(),
                    });
                    let view = visualization_view(data, chart);
                    Transition { state, view }
                }
                Err(err) => halted(state, Page::Visualization, err),
            },
            Page::Stats => {
                let selection = state.stats_selection.clone();
                self.compute_statistics(state, selection)
            }
        }
    }

    fn upload(
        &self,
        mut state: SessionState,
        file_name: &str,
        bytes: &[u8],
        options: &CsvOptions,
    ) -> Transition {
        state.page = Page::Upload;
        if bytes.is_empty() {
            let view = self.upload_view(&state);
            return Transition { state, view };
        }

        match Dataset::from_csv(bytes, options) {
            Ok(dataset) => {
                info!(
                    "Uploaded '{}': {} rows x {} columns",
                    file_name,
                    dataset.num_rows(),
                    dataset.num_columns()
                );
                state.uploaded_data = Some(dataset);
                state.preprocess_options = PreprocessOptions::default();
                state.stats_selection = ColumnSelection::default();
                let view = self
                    .upload_view(&state)
                    .with_notice(Notice::success("Data upload complete."));
                Transition { state, view }
            }
            Err(err) => {
                warn!("Rejected upload '{}': {}", file_name, err);
                let view = self.upload_view(&state).with_notice(notice_for(&err));
                Transition { state, view }
            }
        }
    }

    fn upload_view(&self, state: &SessionState) -> PageView {
        let preview = state
            .uploaded_data
            .as_ref()
            .and_then(|data| data.preview(self.settings.preview_rows).ok());
        PageView::new(Page::Upload, PageBody::Upload { preview })
            .with_navigation("Next: preprocessing", Page::Preprocessing)
    }

    fn apply_preprocessing(&self, mut state: SessionState, options: PreprocessOptions) -> Transition {
        state.page = Page::Preprocessing;
        let source = match state.uploaded() {
            Ok(source) => source,
            Err(err) => return halted(state, Page::Preprocessing, err),
        };

        let (result, notice) = match preprocess(source, &options) {
            Ok(result) => (Some(result), None),
            Err(err) => {
                warn!("Preprocessing failed: {}", err);
                (None, Some(notice_for(&err)))
            }
        };

        if let Some(result) = result {
            state.preprocess_options = options;
            state.set_preprocessed(result);
        }

        // On failure the page keeps showing the last good table.
        let shown = match state.preprocessed_data.as_ref().or(state.uploaded_data.as_ref()) {
            Some(shown) => shown,
            None => {
                let err = ExplorerError::Internal {
                    message: "preprocessing page has no table to show".to_string(),
                };
                return halted(state, Page::Preprocessing, err);
            }
        };
        let mut view = match self.preprocessing_view(&state, shown) {
            Ok(view) => view,
            Err(err) => return halted(state, Page::Preprocessing, err),
        };
        if let Some(notice) = notice {
            view = view.with_notice(notice);
        }
        Transition { state, view }
    }

    fn preprocessing_view(
        &self,
        state: &SessionState,
        shown: &Dataset,
    ) -> Result<PageView, ExplorerError> {
        let source = state.uploaded()?;
        let body = PageBody::Preprocessing {
            columns: source.column_infos(),
            options: state.preprocess_options.clone(),
            preview: shown.preview(self.settings.preview_rows)?,
            row_count: shown.num_rows(),
            column_count: shown.num_columns(),
        };
        Ok(PageView::new(Page::Preprocessing, body)
            .with_navigation("Back: upload data", Page::Upload)
            .with_navigation("Next: visualization", Page::Visualization)
            .with_navigation("Next: analysis results", Page::Stats))
    }

    fn generate_chart(&self, mut state: SessionState, request: &ChartRequest) -> Transition {
        state.page = Page::Visualization;
        let data = match state.preprocessed() {
            Ok(data) => data,
            Err(err) => return halted(state, Page::Visualization, err),
        };

        match self.charts.render(data, request) {
            Ok(chart) => {
                let view = visualization_view(
                    data,
                    Some(ChartView {
                        kind: chart.kind,
                        title: chart.title.clone(),
                        svg: chart.svg.clone(),
                    }),
                );
                state.last_chart = Some(chart);
                Transition { state, view }
            }
            Err(err) => {
                if err.is_user_facing() {
                    warn!("Chart request rejected: {}", err);
                } else {
                    error!("Chart rendering failed: {}", err);
                }
                let view = visualization_view(data, None).with_notice(notice_for(&err));
                Transition { state, view }
            }
        }
    }

    fn compute_statistics(&self, mut state: SessionState, selection: ColumnSelection) -> Transition {
        state.page = Page::Stats;
        let data = match state.preprocessed() {
            Ok(data) => data,
            Err(err) => return halted(state, Page::Stats, err),
        };

        let result = describe(data, &selection);
        let view = match result {
            Ok(table) => statistics_view(data, &selection, Some(table)),
            Err(err) => {
                debug!("No statistics for {:?}: {}", selection, err);
                statistics_view(data, &selection, None).with_notice(notice_for(&err))
            }
        };

        // A selection naming columns the table no longer has is not kept.
        if data.resolve(&selection).is_ok() {
            state.stats_selection = selection;
        }
        Transition { state, view }
    }
}

fn visualization_view(data: &Dataset, chart: Option<ChartView>) -> PageView {
    let body = PageBody::Visualization {
        columns: data.column_infos(),
        chart_kinds: ChartKind::ALL.to_vec(),
        chart,
    };
    PageView::new(Page::Visualization, body).with_navigation("Back: preprocessing", Page::Preprocessing)
}

fn statistics_view(
    data: &Dataset,
    selection: &ColumnSelection,
    table: Option<Vec<ColumnStatistics>>,
) -> PageView {
    let body = PageBody::Statistics {
        columns: data.column_infos(),
        selection: selection.clone(),
        table,
    };
    PageView::new(Page::Stats, body).with_navigation("Back: visualization", Page::Visualization)
}

/// View for a page whose input is missing. Only the preprocessing page
/// offers a way back to the upload page.
fn halted(state: SessionState, page: Page, err: ExplorerError) -> Transition {
    debug!("Page '{}' halted: {}", page, err);
    let redirect = match page {
        Page::Preprocessing => Some(NavTarget::new("Go to upload page", Page::Upload)),
        _ => None,
    };
    let view = PageView::new(page, PageBody::Halted { redirect }).with_notice(notice_for(&err));
    Transition { state, view }
}

fn notice_for(err: &ExplorerError) -> Notice {
    match err {
        ExplorerError::EmptySelection { message } => Notice::warning(message.clone()),
        ExplorerError::MissingPrerequisite { message, .. } => Notice::error(message.clone()),
        other => Notice::error(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NoticeLevel;

    fn workflow() -> Workflow {
        Workflow::new(EngineSettings::default())
    }

    fn upload(text: &str) -> Action {
        Action::Upload {
            file_name: "data.csv".to_string(),
            bytes: text.as_bytes().to_vec(),
            options: CsvOptions::default(),
        }
    }

    #[test]
    fn empty_upload_is_a_no_op() {
        let wf = workflow();
        let t = wf.dispatch(SessionState::new(), upload(""));
        assert!(t.state.uploaded_data.is_none());
        assert!(t.view.notices.is_empty());
        assert_eq!(t.view.page, Page::Upload);
    }

    #[test]
    fn bad_upload_keeps_previous_data() {
        let wf = workflow();
        let t = wf.dispatch(SessionState::new(), upload("a,b\n1,2\n"));
        let before = t.state.uploaded_data.clone();

        let t = wf.dispatch(t.state, upload("a,b\n1,2,3\n"));
        assert_eq!(t.state.uploaded_data, before);
        assert_eq!(t.view.notices[0].level, NoticeLevel::Error);
    }

    #[test]
    fn navigation_without_data_halts_and_keeps_state() {
        let wf = workflow();
        for page in [Page::Preprocessing, Page::Visualization, Page::Stats] {
            let t = wf.dispatch(SessionState::new(), Action::Navigate(page));
            assert!(t.view.is_halted());
            assert_eq!(t.state.page, page);
            assert!(t.state.uploaded_data.is_none());
            assert!(t.state.preprocessed_data.is_none());
        }
    }

    #[test]
    fn only_preprocessing_offers_a_redirect() {
        let wf = workflow();
        let t = wf.dispatch(SessionState::new(), Action::Navigate(Page::Preprocessing));
        assert!(matches!(
            t.view.body,
            PageBody::Halted { redirect: Some(NavTarget { page: Page::Upload, .. }) }
        ));

        let t = wf.dispatch(SessionState::new(), Action::Navigate(Page::Stats));
        assert!(matches!(t.view.body, PageBody::Halted { redirect: None }));
    }

    #[test]
    fn empty_statistics_selection_warns() {
        let wf = workflow();
        let t = wf.dispatch(SessionState::new(), upload("a\n1\n2\n"));
        let t = wf.dispatch(t.state, Action::Navigate(Page::Preprocessing));
        let t = wf.dispatch(t.state, Action::ComputeStatistics(ColumnSelection::None));
        assert_eq!(t.view.notices[0].level, NoticeLevel::Warning);
        assert!(matches!(t.view.body, PageBody::Statistics { table: None, .. }));
    }
}

use std::time::Duration;

use crate::charts::ChartSettings;
use crate::dataset::CsvOptions;

/// Knobs of the workflow engine. The server fills these from its
/// environment configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Rows shown in upload and preprocessing previews.
    pub preview_rows: usize,
    /// Dialect used when an upload does not name one, and for CSV export.
    pub csv: CsvOptions,
    pub charts: ChartSettings,
    /// Inactivity after which a session is dropped.
    pub session_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            preview_rows: 5,
            csv: CsvOptions::default(),
            charts: ChartSettings::default(),
            session_timeout: Duration::from_secs(30 * 60),
        }
    }
}

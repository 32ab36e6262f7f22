pub mod charts;
pub mod dataset;
pub mod domain;
pub mod engine;
pub mod error;
pub mod preprocessing;
pub mod schema;
pub mod session;
pub mod session_manager;
pub mod settings;
pub mod statistics;
pub mod workflow;

pub use charts::{ChartKind, ChartRequest, ChartSettings};
pub use dataset::{CsvOptions, Dataset};
pub use domain::{ColumnSelection, Page, PageView, PreprocessOptions};
pub use engine::ExplorerEngine;
pub use error::ExplorerError;
pub use settings::EngineSettings;
pub use workflow::{Action, Transition, Workflow};

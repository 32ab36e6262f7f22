use serde::{Deserialize, Serialize};

use crate::charts::ChartKind;
use crate::schema::ColumnKind;
use crate::statistics::ColumnStatistics;

/// The four screens of the workflow, in the order a user walks through them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    #[default]
    Upload,
    Preprocessing,
    Visualization,
    Stats,
}

impl Page {
    pub const ALL: [Page; 4] = [
        Page::Upload,
        Page::Preprocessing,
        Page::Visualization,
        Page::Stats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Page::Upload => "upload",
            Page::Preprocessing => "preprocessing",
            Page::Visualization => "visualization",
            Page::Stats => "stats",
        }
    }

    /// Label of the sidebar button that opens this page.
    pub fn label(&self) -> &'static str {
        match self {
            Page::Upload => "Upload data",
            Page::Preprocessing => "Preprocessing",
            Page::Visualization => "Visualization",
            Page::Stats => "Analysis results",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Page::Upload => "Data upload",
            Page::Preprocessing => "Data preprocessing",
            Page::Visualization => "Data visualization",
            Page::Stats => "Analysis results",
        }
    }
}

impl std::fmt::Display for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Page {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Page::ALL
            .into_iter()
            .find(|page| page.as_str() == s)
            .ok_or_else(|| format!("Unknown page: {}", s))
    }
}

/// Which columns an operation should use. `Subset` names are resolved
/// against the dataset schema; the result always follows the dataset's
/// own column order, not the order the names were given in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "columns", rename_all = "snake_case")]
pub enum ColumnSelection {
    #[default]
    All,
    None,
    Subset(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessOptions {
    #[serde(default)]
    pub selection: ColumnSelection,
    #[serde(default)]
    pub drop_missing: bool,
    #[serde(default)]
    pub one_hot_encode: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
    pub data_type: String,
    pub missing: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    pub total_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// A button that moves the session to another page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavTarget {
    pub label: String,
    pub page: Page,
}

impl NavTarget {
    pub fn new(label: impl Into<String>, page: Page) -> Self {
        Self {
            label: label.into(),
            page,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartView {
    pub kind: ChartKind,
    pub title: String,
    pub svg: String,
}

/// Render instructions for one page. A presentation layer draws the sidebar
/// from `sidebar`, the notices inline, then the body controls.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView {
    pub page: Page,
    pub title: String,
    pub sidebar: Vec<NavTarget>,
    pub notices: Vec<Notice>,
    pub navigation: Vec<NavTarget>,
    pub body: PageBody,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PageBody {
    Upload {
        preview: Option<TablePreview>,
    },
    Preprocessing {
        columns: Vec<ColumnInfo>,
        options: PreprocessOptions,
        preview: TablePreview,
        row_count: usize,
        column_count: usize,
    },
    Visualization {
        columns: Vec<ColumnInfo>,
        chart_kinds: Vec<ChartKind>,
        chart: Option<ChartView>,
    },
    Statistics {
        columns: Vec<ColumnInfo>,
        selection: ColumnSelection,
        table: Option<Vec<ColumnStatistics>>,
    },
    /// The page could not render its controls because a prerequisite is missing.
    Halted {
        redirect: Option<NavTarget>,
    },
}

impl PageView {
    pub fn new(page: Page, body: PageBody) -> Self {
        Self {
            page,
            title: page.title().to_string(),
            sidebar: Page::ALL
                .into_iter()
                .map(|p| NavTarget::new(p.label(), p))
                .collect(),
            notices: Vec::new(),
            navigation: Vec::new(),
            body,
        }
    }

    pub fn with_notice(mut self, notice: Notice) -> Self {
        self.notices.push(notice);
        self
    }

    pub fn with_navigation(mut self, label: &str, page: Page) -> Self {
        self.navigation.push(NavTarget::new(label, page));
        self
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.body, PageBody::Halted { .. })
    }
}

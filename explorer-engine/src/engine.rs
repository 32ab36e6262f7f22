use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::PageView;
use crate::error::ExplorerError;
use crate::session::SessionState;
use crate::session_manager::SessionManager;
use crate::settings::EngineSettings;
use crate::workflow::{Action, Workflow};

pub struct ExplorerEngine {
    workflow: Arc<Workflow>,
    sessions: SessionManager,
}

impl ExplorerEngine {
    pub fn new(settings: EngineSettings) -> Self {
        info!("Initializing Explorer Engine");

        let sessions = SessionManager::new(settings.session_timeout);
        let workflow = Arc::new(Workflow::new(settings));

        info!("Explorer Engine initialized successfully");

        Self { workflow, sessions }
    }

    pub fn settings(&self) -> &EngineSettings {
        self.workflow.settings()
    }

    /// Starts a session and returns its id with the first page to show.
    pub async fn create_session(&self) -> (String, PageView) {
        let (id, _) = self.sessions.create().await;
        let view = self.workflow.show(SessionState::new()).view;
        (id.to_string(), view)
    }

    pub async fn remove_session(&self, session_id: &str) -> Result<(), ExplorerError> {
        self.sessions.remove(session_id).await
    }

    pub async fn view(&self, session_id: &str) -> Result<PageView, ExplorerError> {
        self.dispatch(session_id, Action::Refresh).await
    }

    /// Applies an action to a session. The session stays locked until the
    /// new state is stored, so its actions apply in arrival order.
    pub async fn dispatch(&self, session_id: &str, action: Action) -> Result<PageView, ExplorerError> {
        let handle = self.sessions.get(session_id).await?;
        let mut session = handle.lock().await;
        session.touch();

        let workflow = self.workflow.clone();
        let state = session.state.clone();
        let transition = tokio::task::spawn_blocking(move || workflow.dispatch(state, action))
            .await
            .map_err(|e| ExplorerError::Internal {
                message: format!("Action task failed: {}", e),
            })?;

        debug!(
            "Session {} is now on page '{}'",
            session.id, transition.state.page
        );
        session.state = transition.state;
        Ok(transition.view)
    }

    /// The preprocessed table as CSV.
    pub async fn export_preprocessed(&self, session_id: &str) -> Result<Vec<u8>, ExplorerError> {
        let handle = self.sessions.get(session_id).await?;
        let mut session = handle.lock().await;
        session.touch();
        let csv = self.workflow.settings().csv;
        session.state.preprocessed()?.to_csv(&csv)
    }

    /// PNG of the last generated chart.
    pub async fn export_chart(&self, session_id: &str) -> Result<Vec<u8>, ExplorerError> {
        let handle = self.sessions.get(session_id).await?;
        let mut session = handle.lock().await;
        session.touch();
        Ok(session.state.chart()?.png.clone())
    }

    pub async fn purge_expired_sessions(&self) -> usize {
        self.sessions.purge_expired().await
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.len().await
    }
}

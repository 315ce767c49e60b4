use std::sync::Arc;
use std::time::Duration;

use ferropath_core::AppContext;
use ferropath_core::store::{Deadline, SqliteSession, SqliteStore};
use ferropath_core::Error as CoreError;

use crate::config::ServerSection;
use crate::error::ApiError;

/// Shared by every handler; read-only once the server is ready
pub struct AppState {
    pub context: AppContext<SqliteStore>,
    pub request_timeout: Duration,
    pub max_concurrent_requests: usize,
}

impl AppState {
    pub fn new(context: AppContext<SqliteStore>, server: &ServerSection) -> Self {
        Self {
            context,
            request_timeout: server.request_timeout(),
            max_concurrent_requests: server.max_concurrent_requests,
        }
    }
}

/// Runs `work` on the blocking pool with a pooled session whose deadline
/// is the request timeout. The session is released when `work` returns.
pub async fn with_session<T, F>(state: &Arc<AppState>, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: for<'a> FnOnce(&'a AppContext<SqliteStore>, &SqliteSession<'a>) -> Result<T, CoreError>
        + Send
        + 'static,
{
    let state = Arc::clone(state);
    let deadline = Deadline::after(state.request_timeout);

    tokio::task::spawn_blocking(move || {
        let session = state.context.session(deadline)?;
        work(&state.context, &session)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
    .map_err(ApiError::from)
}

use axum::extract::{Path, State};
use cid_protocol::validate_session_id;
use std::time::Duration;
use tracing::debug;

use crate::{sse::progress_stream, sse::SseStream, AppState, Result};

pub async fn progress_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<SseStream> {
    validate_session_id(&session_id)?;
    debug!(session = %session_id, "Progress stream opened");

    let events = state.sessions.subscribe(&session_id);
    let keepalive = Duration::from_secs(state.config.sse_keepalive_interval.max(1));
    Ok(progress_stream(events, keepalive))
}

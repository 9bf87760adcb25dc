//! Web API endpoints for the channel catalog.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::database::{ChannelRecord, Database, ProgramRecord};
use crate::web::state::WebState;

/// Channel as returned by the API, with its present/following programs attached.
#[derive(Debug, Serialize)]
pub struct ChannelView {
    #[serde(flatten)]
    pub channel: ChannelRecord,
    pub program_present: Option<ProgramRecord>,
    pub program_following: Option<ProgramRecord>,
    /// False for sub-channels that have nothing on air right now.
    pub is_display: bool,
}

impl ChannelView {
    fn load(db: &Database, channel: ChannelRecord, now: i64) -> crate::database::Result<Self> {
        let (program_present, program_following) = db.get_current_and_next_program(&channel.id, now)?;
        let is_display = !(channel.is_subchannel && program_present.is_none());
        Ok(Self {
            channel,
            program_present,
            program_following,
            is_display,
        })
    }
}

/// Listing order: network family, then remote control key, then channel number.
pub fn sort_channels(channels: &mut [ChannelRecord]) {
    channels.sort_by(|a, b| {
        a.channel_type
            .listing_rank()
            .cmp(&b.channel_type.listing_rank())
            .then_with(|| a.remocon_id.cmp(&b.remocon_id))
            .then_with(|| a.channel_number.cmp(&b.channel_number))
    });
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn error_response(status: StatusCode, error: impl ToString) -> axum::response::Response {
    (
        status,
        Json(json!({
            "success": false,
            "error": error.to_string()
        })),
    )
        .into_response()
}

/// GET /api/channels
pub async fn get_channels(State(web_state): State<Arc<WebState>>) -> impl IntoResponse {
    let db = web_state.database.lock().await;
    let now = now();

    let mut channels = match db.get_watchable_channels() {
        Ok(channels) => channels,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    };
    sort_channels(&mut channels);

    let views = channels
        .into_iter()
        .map(|channel| ChannelView::load(&db, channel, now))
        .collect::<Result<Vec<_>, _>>();

    match views {
        Ok(views) => Json(json!({
            "success": true,
            "count": views.len(),
            "channels": views
        }))
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// GET /api/channels/:display_channel_id
pub async fn get_channel(
    State(web_state): State<Arc<WebState>>,
    Path(display_channel_id): Path<String>,
) -> impl IntoResponse {
    let db = web_state.database.lock().await;

    let channel = match db.get_channel_by_display_id(&display_channel_id) {
        Ok(Some(channel)) => channel,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                format!("Specified display_channel_id was not found: {}", display_channel_id),
            )
        }
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    };

    match ChannelView::load(&db, channel, now()) {
        Ok(view) => Json(json!({
            "success": true,
            "channel": view
        }))
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// POST /api/channels/update
pub async fn trigger_update(State(web_state): State<Arc<WebState>>) -> impl IntoResponse {
    let Some(scheduler) = web_state.scheduler.clone() else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Update scheduler is not running");
    };

    if scheduler.is_updating() {
        return (
            StatusCode::ACCEPTED,
            Json(json!({
                "success": true,
                "message": "Update already in progress"
            })),
        )
            .into_response();
    }

    tokio::spawn(async move {
        if let Err(e) = scheduler.trigger_update().await {
            log::error!("Manual channel update failed: {}", e);
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "message": "Update started"
        })),
    )
        .into_response()
}

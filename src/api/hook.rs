//! `POST /{id}`: run a runbook for an incoming event

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, State as AxumState},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tracing::{Instrument, error, info_span};
use uuid::Uuid;

use crate::SharedState;
use crate::dispatcher::{HookRequest, dispatch};

pub async fn handle_hook(
    AxumState(state): AxumState<SharedState>,
    Path(id): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let span = info_span!("hook", request_id = %Uuid::now_v7(), runbook = %id);
    let request = HookRequest {
        runbook_id: &id,
        peer,
        headers: &headers,
        body: &body,
    };

    let report = match dispatch(&state, request).instrument(span).await {
        Ok(report) => report,
        Err(e) => return e.into_response(),
    };

    if !state.settings.echo {
        return StatusCode::OK.into_response();
    }

    match serde_json::to_string_pretty(&report) {
        Ok(data) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            data,
        )
            .into_response(),
        Err(e) => {
            // scripts already ran; report success without a body
            error!("Failed to serialize response for '{}': {}", id, e);
            StatusCode::OK.into_response()
        }
    }
}

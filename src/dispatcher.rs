//! Per-request hook pipeline.
//!
//! resolve address -> load runbook -> authorize -> template -> execute.
//! The first failing step ends the request with its [`HookError`].

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, error, info, warn};

use crate::AppState;
use crate::client_addr::resolve_client_addr;
use crate::error::{HookError, Result};
use crate::executor::ExecutionReport;
use crate::templating::Payload;

/// Everything the pipeline needs from one inbound request
#[derive(Debug, Clone, Copy)]
pub struct HookRequest<'a> {
    pub runbook_id: &'a str,
    pub peer: SocketAddr,
    pub headers: &'a HeaderMap,
    pub body: &'a [u8],
}

pub async fn dispatch(state: &AppState, req: HookRequest<'_>) -> Result<ExecutionReport> {
    let runbook_id = req.runbook_id;
    let remote_addr = req.peer.to_string();
    let client_addr = resolve_client_addr(&state.settings, req.peer, req.headers);

    if client_addr != req.peer.ip().to_string() {
        info!(
            runbook = runbook_id,
            %remote_addr,
            %client_addr,
            "Received hook for '{}' from {} on {}",
            runbook_id,
            client_addr,
            remote_addr
        );
    } else {
        info!(
            runbook = runbook_id,
            %remote_addr,
            "Received hook for '{}' from {}",
            runbook_id,
            remote_addr
        );
    }

    let mut runbook = state.runbooks.load(runbook_id).await.inspect_err(|e| {
        error!(runbook = runbook_id, "{}", e);
    })?;

    let client_ip = client_addr.parse::<IpAddr>().ok();
    if client_ip.is_none() {
        warn!(
            runbook = runbook_id,
            %remote_addr,
            %client_addr,
            "Could not resolve client address"
        );
    }

    if !runbook.addr_is_allowed(client_ip) {
        warn!(
            runbook = runbook_id,
            %remote_addr,
            %client_addr,
            "Hook '{}' is not allowed from {}",
            runbook_id,
            remote_addr
        );
        return Err(HookError::Unauthorized {
            runbook: runbook_id.to_string(),
            remote_addr,
        });
    }
    info!(
        runbook = runbook_id,
        %remote_addr,
        %client_addr,
        "Hook '{}' authorized",
        runbook_id
    );

    let payload = Payload::new(req.body);
    if !payload.is_empty() {
        debug!(runbook = runbook_id, "POST data: {}", payload.raw());
    }
    runbook.interpolate(&payload).map_err(|e| {
        error!(runbook = runbook_id, "Failed to template arguments: {}", e);
        HookError::from(e)
    })?;

    let report = state
        .executor
        .execute(&runbook.scripts)
        .await
        .inspect_err(|e| {
            error!(runbook = runbook_id, "{}", e);
        })?;

    info!(
        runbook = runbook_id,
        %remote_addr,
        %client_addr,
        scripts = report.results.len(),
        "Hook '{}' completed",
        runbook_id
    );
    Ok(report)
}

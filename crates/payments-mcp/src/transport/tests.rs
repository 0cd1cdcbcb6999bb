// crates/payments-mcp/src/transport/tests.rs
// ============================================================================
// Module: Transport Unit Tests
// Description: Unit tests for request context extraction and state tracking.
// Purpose: Validate header handling and lifecycle publication.
// Dependencies: payments-mcp
// ============================================================================

//! ## Overview
//! Covers the header-to-context mapping used by the network transports and
//! the watch-channel state tracker shared by every transport.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::header::AUTHORIZATION;
use payments_mcp_config::ServerTransport;

use super::MERCHANT_ID_HEADER;
use super::StateTracker;
use super::TASK_ID_HEADER;
use super::TransportState;
use super::http_request_context;
use super::stdio_request_context;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a header map from name/value pairs.
fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.insert(*name, HeaderValue::from_static(value));
    }
    map
}

// ============================================================================
// SECTION: Request Context
// ============================================================================

#[test]
fn http_context_copies_bearer_token_and_task_id() {
    let map = headers(&[
        ("authorization", "Bearer YWJjOnh5eg=="),
        (TASK_ID_HEADER, "task-42"),
        (MERCHANT_ID_HEADER, "merchant-7"),
    ]);
    let context = http_request_context(ServerTransport::Http, &map);
    assert_eq!(context.transport(), ServerTransport::Http);
    assert_eq!(context.auth_token(), Some("YWJjOnh5eg=="));
    assert_eq!(context.task_id(), Some("task-42"));
    assert_eq!(context.merchant_id(), Some("merchant-7"));
    assert!(context.credential().is_none());
}

#[test]
fn http_context_generates_missing_task_id() {
    let context = http_request_context(ServerTransport::Sse, &HeaderMap::new());
    let task_id = context.task_id().expect("task id");
    assert!(!task_id.is_empty());
    assert!(context.auth_token().is_none());
    assert!(context.merchant_id().is_none());
}

#[test]
fn http_context_replaces_empty_task_id() {
    let map = headers(&[(TASK_ID_HEADER, "")]);
    let context = http_request_context(ServerTransport::Http, &map);
    assert!(!context.task_id().expect("task id").is_empty());
}

#[test]
fn http_context_request_ids_are_fresh() {
    let map = headers(&[(TASK_ID_HEADER, "shared")]);
    let first = http_request_context(ServerTransport::Http, &map);
    let second = http_request_context(ServerTransport::Http, &map);
    assert_ne!(first.request_id(), second.request_id());
    assert_eq!(first.task_id(), second.task_id());
}

#[test]
fn http_context_ignores_non_bearer_authorization() {
    let mut map = HeaderMap::new();
    map.insert(AUTHORIZATION, HeaderValue::from_static("Basic YWJjOnh5eg=="));
    let context = http_request_context(ServerTransport::Http, &map);
    assert!(context.auth_token().is_none());
}

#[test]
fn stdio_context_has_generated_ids() {
    let context = stdio_request_context();
    assert_eq!(context.transport(), ServerTransport::Stdio);
    assert!(context.request_id().is_some_and(|id| !id.is_empty()));
    assert!(context.task_id().is_some_and(|id| !id.is_empty()));
}

// ============================================================================
// SECTION: State Tracking
// ============================================================================

#[test]
fn state_tracker_publishes_latest_state() {
    let tracker = StateTracker::new(ServerTransport::Http);
    let receiver = tracker.subscribe();
    assert_eq!(*receiver.borrow(), TransportState::Created);
    tracker.set(TransportState::Started);
    tracker.set(TransportState::Serving);
    assert_eq!(*receiver.borrow(), TransportState::Serving);
}

#[test]
fn state_labels_are_stable() {
    let labels = [
        TransportState::Created,
        TransportState::Started,
        TransportState::Serving,
        TransportState::ShuttingDown,
        TransportState::Stopped,
        TransportState::Failed,
    ]
    .map(TransportState::as_str);
    assert_eq!(labels, ["created", "started", "serving", "shutting_down", "stopped", "failed"]);
}

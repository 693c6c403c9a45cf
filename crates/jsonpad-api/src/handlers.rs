//! Demo JSONP endpoints.
//!
//! Each handler builds a [`JsonpResult`] and hands it to the shared
//! [`JsonpResponder`](crate::JsonpResponder) held in router state.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use jsonpad_core::{JsonpResult, SHORTHAND_CALLBACK_KEY, jsonp};
use serde::{Serialize, Serializer};

use crate::extract::JsonpRequest;
use crate::ApiState;

/// Largest range `/api/v1/range/{count}` will stream.
pub const MAX_RANGE: u64 = 1_000_000;

#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: u32,
    pub tag: &'static str,
}

pub fn catalog() -> Vec<Item> {
    vec![
        Item { id: 1, tag: "alpha" },
        Item { id: 2, tag: "beta" },
        Item { id: 3, tag: "gamma" },
    ]
}

/// Serializes `0..count` as a JSON array without materializing it.
#[derive(Debug, Clone, Copy)]
pub struct Range(pub u64);

impl Serialize for Range {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(0..self.0)
    }
}

// ── Items ──────────────────────────────────────────────────────

/// GET /api/v1/items?callback=fn
pub async fn list_items(State(state): State<ApiState>, request: JsonpRequest) -> Response {
    state.responder.respond(request, jsonp(catalog()))
}

/// GET /api/v1/items/{callback}
pub async fn list_items_routed(State(state): State<ApiState>, request: JsonpRequest) -> Response {
    let result = JsonpResult::with_callback_key(catalog(), SHORTHAND_CALLBACK_KEY);
    state.responder.respond(request, result)
}

/// GET /api/v1/legacy/items?jsoncallback=fn
pub async fn list_items_legacy(State(state): State<ApiState>, request: JsonpRequest) -> Response {
    state.responder.respond(request, JsonpResult::new(catalog()))
}

// ── Streaming ──────────────────────────────────────────────────

/// GET /api/v1/range/{count}?callback=fn
pub async fn stream_range(
    State(state): State<ApiState>,
    Path(count): Path<u64>,
    request: JsonpRequest,
) -> Response {
    if count > MAX_RANGE {
        return (
            StatusCode::BAD_REQUEST,
            format!("count {count} exceeds max {MAX_RANGE}"),
        )
            .into_response();
    }
    state.responder.respond_streaming(request, jsonp(Range(count)))
}

// ── Health ─────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}

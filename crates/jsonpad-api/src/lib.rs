//! jsonpad-api — axum integration for JSONP responses.
//!
//! [`JsonpRequest`] extracts route and query values; [`JsonpResponder`]
//! executes a [`jsonpad_core::JsonpResult`] into an axum response, either
//! buffered or streamed from a blocking serializer thread.
//!
//! # Demo Routes
//!
//! | Method | Path | Callback source |
//! |---|---|---|
//! | GET | `/api/v1/items` | `?callback=` |
//! | GET | `/api/v1/items/{callback}` | route segment |
//! | GET | `/api/v1/legacy/items` | `?jsoncallback=` |
//! | GET | `/api/v1/range/{count}` | `?callback=` (streamed) |
//! | GET | `/healthz` | none |

mod extract;
pub mod handlers;
mod responder;
mod stream;

use axum::Router;
use axum::routing::get;

pub use extract::JsonpRequest;
pub use responder::JsonpResponder;

/// Shared state for the demo handlers.
#[derive(Clone)]
pub struct ApiState {
    pub responder: JsonpResponder,
}

/// Build the demo router.
pub fn build_router(responder: JsonpResponder) -> Router {
    let state = ApiState { responder };

    let api_routes = Router::new()
        .route("/items", get(handlers::list_items))
        .route("/items/{callback}", get(handlers::list_items_routed))
        .route("/legacy/items", get(handlers::list_items_legacy))
        .route("/range/{count}", get(handlers::stream_range))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}

//! Turns a [`JsonpResult`] into an axum response.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use jsonpad_core::{
    ActionContext, HttpResponse, JsonpError, JsonpResult, JsonpResultExecutor, ResponseHead,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::extract::JsonpRequest;
use crate::stream::{ChannelWriter, body_from_channel};

/// Body chunks buffered between the serializer thread and the client.
const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// Executes JSONP results for axum handlers.
///
/// Cheap to clone; share one per application through router state.
#[derive(Debug, Clone)]
pub struct JsonpResponder {
    executor: Arc<JsonpResultExecutor>,
    channel_capacity: usize,
}

impl JsonpResponder {
    pub fn new(executor: JsonpResultExecutor) -> Self {
        Self {
            executor: Arc::new(executor),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn executor(&self) -> &JsonpResultExecutor {
        &self.executor
    }

    /// Execute into memory and return the complete response.
    ///
    /// Nothing reaches the client until execution is over, so any failure,
    /// including a serialization failure part-way through, becomes a 500.
    pub fn respond<T: Serialize>(&self, request: JsonpRequest, result: JsonpResult<T>) -> Response {
        let mut ctx = ActionContext::from_parts(
            request.route,
            request.query,
            HttpResponse::new(Vec::new()),
        );
        match self.executor.execute(&mut ctx, &result) {
            Ok(()) => {
                let response = ctx.into_response();
                into_axum(&response.head, Body::from(response.body))
            }
            Err(err) => failure(&err),
        }
    }

    /// Commit the head now and stream the body as it is serialized.
    ///
    /// Serialization runs on the blocking pool. A failure after the head is
    /// sent is logged and ends the body with an error, so the client sees a
    /// truncated response.
    pub fn respond_streaming<T>(&self, request: JsonpRequest, result: JsonpResult<T>) -> Response
    where
        T: Serialize + Send + 'static,
    {
        let mut head = ResponseHead::new();
        let prepared = match self
            .executor
            .prepare(&mut head, &request.route, &request.query, &result)
        {
            Ok(prepared) => prepared,
            Err(err) => return failure(&err),
        };

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let executor = Arc::clone(&self.executor);
        tokio::task::spawn_blocking(move || {
            let sink = ChannelWriter::new(tx.clone());
            if let Err(err) = executor.write_body(&prepared, sink, result.value()) {
                warn!(
                    error = %err,
                    callback = %prepared.callback,
                    "streamed JSONP body aborted"
                );
                let _ = tx.blocking_send(Err(std::io::Error::other(err.to_string())));
            }
        });

        into_axum(&head, body_from_channel(rx))
    }
}

fn into_axum(head: &ResponseHead, body: Body) -> Response {
    let status = StatusCode::from_u16(head.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, body).into_response();
    let headers = response.headers_mut();
    for (name, value) in head.headers.iter() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!(%name, "dropping header that is not valid HTTP"),
        }
    }
    response
}

fn failure(err: &JsonpError) -> Response {
    if err.is_pre_write() {
        warn!(error = %err, "JSONP result rejected before writing");
    } else {
        error!(error = %err, "JSONP execution failed");
    }
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
}

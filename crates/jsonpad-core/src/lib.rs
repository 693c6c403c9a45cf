//! jsonpad-core — JSONP result execution.
//!
//! Formats any `serde::Serialize` value as `callbackName(<json>)` so that a
//! cross-origin `<script src=...>` consumer can execute it.
//!
//! # Execution
//!
//! 1. The callback name comes from the route value named by the result's
//!    callback key, else the query parameter of that name, else the key
//!    itself.
//! 2. The content type is the result's own, else the one already on the
//!    response, else the configured default
//!    (`application/x-javascript; charset=utf-8`). The body encoding is taken
//!    from the winning media type's `charset`.
//! 3. Headers and status are committed before any body byte is written.
//! 4. `callback(`, the JSON, and `)` are streamed through a
//!    [`ResponseStreamWriter`] whose buffers come from a shared
//!    [`BufferPool`] and go back to it on every exit path.
//!
//! ```
//! use std::sync::Arc;
//! use jsonpad_core::{ActionContext, JsonpOptions, JsonpResult, JsonpResultExecutor};
//!
//! let executor = JsonpResultExecutor::new(Arc::new(JsonpOptions::default()));
//! let mut ctx = ActionContext::new(Vec::<u8>::new()).with_route_value("cb", "onData");
//! executor
//!     .execute(&mut ctx, &JsonpResult::with_callback_key(vec![1, 2, 3], "cb"))
//!     .unwrap();
//!
//! assert_eq!(ctx.response.body, b"onData([1,2,3])");
//! ```

mod context;
mod error;
mod executor;
mod header;
mod media;
mod options;
mod pool;
mod result;
mod writer;

pub use context::{ActionContext, HttpResponse, Params, ResponseHead};
pub use error::JsonpError;
pub use executor::{JsonpResultExecutor, PreparedWrite, resolve_callback_name, serialize_into};
pub use header::{CONTENT_TYPE, HeaderMap};
pub use media::{Charset, ResolvedContentType, charset_of, resolve_content_type};
pub use options::{
    DEFAULT_CONTENT_TYPE, Formatting, JsonpOptions, PoolConfig, SerializerSettings,
};
pub use pool::{BufferPool, PoolItem, PoolStats, Pooled};
pub use result::{DEFAULT_CALLBACK_KEY, JsonpResult, SHORTHAND_CALLBACK_KEY, jsonp};
pub use writer::ResponseStreamWriter;

pub use encoding_rs::Encoding;

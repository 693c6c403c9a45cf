//! Executes a [`JsonpResult`] against a response.
//!
//! Execution runs in two phases. [`prepare`](JsonpResultExecutor::prepare)
//! resolves the callback name and content type and commits the response
//! head; [`write_body`](JsonpResultExecutor::write_body) streams
//! `callback(<json>)` into the body. [`execute`](JsonpResultExecutor::execute)
//! runs both. Hosts that must send headers before the body exists (e.g. a
//! streaming HTTP response) call the phases separately.
//!
//! # Callback names are not escaped
//!
//! The callback name is written verbatim. A callback taken from the query
//! string is attacker-controlled, so callers exposing JSONP to untrusted
//! clients should allow-list callback names before executing.

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, info};

use crate::context::{ActionContext, Params, ResponseHead};
use crate::error::JsonpError;
use crate::media::{ResolvedContentType, resolve_content_type};
use crate::options::{Formatting, JsonpOptions, SerializerSettings};
use crate::pool::BufferPool;
use crate::result::JsonpResult;
use crate::writer::ResponseStreamWriter;

/// Outcome of [`JsonpResultExecutor::prepare`]: everything needed to write
/// the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedWrite {
    pub callback: String,
    pub content: ResolvedContentType,
    pub settings: SerializerSettings,
}

/// Pick the callback name: route value, then query value, then the key
/// itself. Empty values count as absent.
pub fn resolve_callback_name<'a>(route: &'a Params, query: &'a Params, key: &'a str) -> &'a str {
    route
        .get(key)
        .filter(|name| !name.is_empty())
        .or_else(|| query.get(key).filter(|name| !name.is_empty()))
        .unwrap_or(key)
}

/// Writes JSONP results using shared options and a shared buffer pool.
#[derive(Debug, Clone)]
pub struct JsonpResultExecutor {
    options: Arc<JsonpOptions>,
    pool: Arc<BufferPool>,
}

impl JsonpResultExecutor {
    /// Create an executor backed by the process-wide buffer pool.
    pub fn new(options: Arc<JsonpOptions>) -> Self {
        Self::with_pool(options, BufferPool::shared())
    }

    pub fn with_pool(options: Arc<JsonpOptions>, pool: Arc<BufferPool>) -> Self {
        Self { options, pool }
    }

    pub fn options(&self) -> &JsonpOptions {
        &self.options
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Write `result` into the context's response.
    pub fn execute<T, B>(
        &self,
        context: &mut ActionContext<B>,
        result: &JsonpResult<T>,
    ) -> Result<(), JsonpError>
    where
        T: Serialize,
        B: Write,
    {
        let prepared = self.prepare(
            &mut context.response.head,
            &context.route_values,
            &context.query,
            result,
        )?;
        self.write_body(&prepared, &mut context.response.body, result.value())?;
        Ok(())
    }

    /// Resolve the callback and content type, then commit the response head.
    ///
    /// Fails with [`JsonpError::InvalidArgument`], leaving `head` untouched,
    /// when the callback key is empty or the head was already committed.
    pub fn prepare<T>(
        &self,
        head: &mut ResponseHead,
        route: &Params,
        query: &Params,
        result: &JsonpResult<T>,
    ) -> Result<PreparedWrite, JsonpError> {
        let key = result.callback_key();
        if key.is_empty() {
            return Err(JsonpError::invalid_argument("callback key must not be empty"));
        }
        if head.has_started() {
            return Err(JsonpError::invalid_argument(
                "response has already started; headers can no longer be set",
            ));
        }

        let callback = resolve_callback_name(route, query, key).to_string();
        let content = resolve_content_type(
            result.content_type(),
            head.content_type(),
            &self.options.default_content_type,
        );

        head.set_content_type(content.content_type.clone());
        if let Some(status) = result.status_code() {
            head.status = status;
        }
        head.start();

        let settings = result
            .serializer_settings()
            .unwrap_or(&self.options.serializer)
            .clone();

        info!(
            value_type = std::any::type_name::<T>(),
            callback = %callback,
            content_type = %content.content_type,
            charset = content.charset.name(),
            status = head.status,
            "executing JSONP result"
        );

        Ok(PreparedWrite {
            callback,
            content,
            settings,
        })
    }

    /// Stream `callback(<json>)` into `body`, returning the bytes written.
    ///
    /// On a serialization or transport failure whatever was already
    /// buffered is still flushed, so the body may end mid-document.
    pub fn write_body<T, W>(
        &self,
        prepared: &PreparedWrite,
        body: W,
        value: &T,
    ) -> Result<u64, JsonpError>
    where
        T: Serialize + ?Sized,
        W: Write,
    {
        let mut writer = ResponseStreamWriter::new(body, prepared.content.charset, &self.pool);
        writer.write_str(&prepared.callback)?;
        writer.write_str("(")?;
        serialize_into(&mut writer, value, &prepared.settings)?;
        writer.write_str(")")?;
        let written = writer.finish()?;

        debug!(bytes = written, callback = %prepared.callback, "JSONP body written");
        Ok(written)
    }
}

/// Serialize `value` into `out`, borrowing it so the caller keeps ownership
/// of the writer and can keep writing after the JSON.
pub fn serialize_into<T, W>(
    out: &mut W,
    value: &T,
    settings: &SerializerSettings,
) -> Result<(), JsonpError>
where
    T: Serialize + ?Sized,
    W: Write,
{
    match settings.formatting {
        Formatting::Compact => {
            let mut serializer = serde_json::Serializer::new(&mut *out);
            value.serialize(&mut serializer)?;
        }
        Formatting::Indented => {
            let indent = " ".repeat(settings.indent);
            let formatter = PrettyFormatter::with_indent(indent.as_bytes());
            let mut serializer = serde_json::Serializer::with_formatter(&mut *out, formatter);
            value.serialize(&mut serializer)?;
        }
    }
    Ok(())
}

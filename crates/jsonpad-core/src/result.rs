//! The value-plus-metadata a handler returns to be written as JSONP.

use crate::options::SerializerSettings;

/// Callback key used by [`JsonpResult::new`].
pub const DEFAULT_CALLBACK_KEY: &str = "jsoncallback";

/// Callback key used by the [`jsonp`] shorthand.
///
/// Differs from [`DEFAULT_CALLBACK_KEY`]; both are kept because existing
/// clients send one or the other.
pub const SHORTHAND_CALLBACK_KEY: &str = "callback";

/// A serializable value with optional response metadata.
///
/// The callback key names the route/query parameter holding the callback
/// function name, and is itself the callback name when neither is present.
#[derive(Debug, Clone)]
pub struct JsonpResult<T> {
    value: T,
    content_type: Option<String>,
    status_code: Option<u16>,
    serializer_settings: Option<SerializerSettings>,
    callback_key: String,
}

impl<T> JsonpResult<T> {
    pub fn new(value: T) -> Self {
        Self::with_callback_key(value, DEFAULT_CALLBACK_KEY)
    }

    pub fn with_callback_key(value: T, callback_key: impl Into<String>) -> Self {
        Self {
            value,
            content_type: None,
            status_code: None,
            serializer_settings: None,
            callback_key: callback_key.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_serializer_settings(mut self, settings: SerializerSettings) -> Self {
        self.serializer_settings = Some(settings);
        self
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn serializer_settings(&self) -> Option<&SerializerSettings> {
        self.serializer_settings.as_ref()
    }

    pub fn callback_key(&self) -> &str {
        &self.callback_key
    }
}

/// Shorthand for a result keyed on `callback`.
pub fn jsonp<T>(value: T) -> JsonpResult<T> {
    JsonpResult::with_callback_key(value, SHORTHAND_CALLBACK_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_defaults() {
        let result = JsonpResult::new(1);
        assert_eq!(result.callback_key(), "jsoncallback");
        assert_eq!(result.content_type(), None);
        assert_eq!(result.status_code(), None);
        assert!(result.serializer_settings().is_none());

        assert_eq!(jsonp(1).callback_key(), "callback");
    }

    #[test]
    fn builder_sets_metadata() {
        let result = JsonpResult::with_callback_key(vec![1, 2], "cb")
            .with_content_type("text/javascript")
            .with_status(201)
            .with_serializer_settings(SerializerSettings::indented(4));

        assert_eq!(result.callback_key(), "cb");
        assert_eq!(result.content_type(), Some("text/javascript"));
        assert_eq!(result.status_code(), Some(201));
        assert_eq!(result.serializer_settings(), Some(&SerializerSettings::indented(4)));
        assert_eq!(result.into_value(), vec![1, 2]);
    }
}

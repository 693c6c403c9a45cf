//! Per-request execution context: route/query lookup and the response.

use std::collections::HashMap;

use crate::header::{CONTENT_TYPE, HeaderMap};

/// Request parameters (route values or query pairs) keyed by name.
///
/// When built from an iterator, the first occurrence of a name wins, which
/// matches how a repeated query parameter is read as a single value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: HashMap<String, String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, keeping any existing value for the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.entry(name.into()).or_insert_with(|| value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

/// Status line and headers of an outgoing response.
///
/// Once the head has started (headers committed), the executor refuses to
/// renegotiate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: HeaderMap,
    started: bool,
}

impl ResponseHead {
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: HeaderMap::new(),
            started: false,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE)
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.headers.set(CONTENT_TYPE, content_type);
    }

    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Commit the head. Later header changes are a caller error.
    pub fn start(&mut self) {
        self.started = true;
    }
}

impl Default for ResponseHead {
    fn default() -> Self {
        Self::new()
    }
}

/// A response whose body is any byte sink.
#[derive(Debug)]
pub struct HttpResponse<B> {
    pub head: ResponseHead,
    pub body: B,
}

impl<B> HttpResponse<B> {
    pub fn new(body: B) -> Self {
        Self {
            head: ResponseHead::new(),
            body,
        }
    }

    pub fn into_body(self) -> B {
        self.body
    }
}

/// Everything the executor reads from and writes to for one request.
#[derive(Debug)]
pub struct ActionContext<B> {
    pub(crate) route_values: Params,
    pub(crate) query: Params,
    pub response: HttpResponse<B>,
}

impl<B> ActionContext<B> {
    pub fn new(body: B) -> Self {
        Self {
            route_values: Params::new(),
            query: Params::new(),
            response: HttpResponse::new(body),
        }
    }

    pub fn from_parts(route_values: Params, query: Params, response: HttpResponse<B>) -> Self {
        Self {
            route_values,
            query,
            response,
        }
    }

    pub fn with_route_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.route_values.insert(name, value);
        self
    }

    pub fn with_query_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name, value);
        self
    }

    pub fn route_value(&self, name: &str) -> Option<&str> {
        self.route_values.get(name)
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query.get(name)
    }

    pub fn into_response(self) -> HttpResponse<B> {
        self.response
    }
}

//! Request extractor feeding the executor's route and query lookups.

use std::convert::Infallible;

use axum::extract::{FromRequestParts, Query, RawPathParams};
use axum::http::request::Parts;
use jsonpad_core::Params;

/// Route values and query pairs of an incoming request.
///
/// Never rejects: a request without matched route parameters or with an
/// unparsable query string simply contributes no values, and the callback
/// falls back to the key literal.
#[derive(Debug, Clone, Default)]
pub struct JsonpRequest {
    pub route: Params,
    pub query: Params,
}

impl JsonpRequest {
    pub fn new(route: Params, query: Params) -> Self {
        Self { route, query }
    }
}

impl<S> FromRequestParts<S> for JsonpRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let route = match RawPathParams::from_request_parts(parts, state).await {
            Ok(params) => params
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            Err(_) => Params::new(),
        };

        let query = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map(|Query(pairs)| pairs.into_iter().collect())
            .unwrap_or_default();

        Ok(Self { route, query })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(uri: &str) -> JsonpRequest {
        let (mut parts, ()) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        JsonpRequest::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn query_pairs_are_decoded() {
        let request = extract("/items?callback=jQuery123_456&x=a%20b").await;
        assert_eq!(request.query.get("callback"), Some("jQuery123_456"));
        assert_eq!(request.query.get("x"), Some("a b"));
        assert!(request.route.is_empty());
    }

    #[tokio::test]
    async fn repeated_query_keeps_first() {
        let request = extract("/items?callback=first&callback=second").await;
        assert_eq!(request.query.get("callback"), Some("first"));
    }

    #[tokio::test]
    async fn missing_query_is_empty() {
        let request = extract("/items").await;
        assert!(request.query.is_empty());
    }
}

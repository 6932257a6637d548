//! Per-request state handed to middlewares and actions

use axum::body::Bytes;
use axum::extract::Query;
use axum::http::{Extensions, HeaderMap, Method, Request, Uri};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use validator::Validate;

use super::pattern::PathParams;
use crate::core::auth::Session;
use crate::core::error::{AppError, RequestError};

/// Everything an action needs to know about the request it serves
///
/// Built by the wired controller once the request is known to be under its
/// base path. `path` is relative to that base path.
#[derive(Debug)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    path: String,
    headers: HeaderMap,
    body: Bytes,
    query: HashMap<String, String>,
    params: PathParams,
    session: Option<Session>,
    extensions: Extensions,
}

impl RequestContext {
    /// Build a context for `request`, routed on `path`
    pub fn new(request: &Request<Bytes>, path: &str) -> Self {
        let query = match Query::<HashMap<String, String>>::try_from_uri(request.uri()) {
            Ok(Query(query)) => query,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unparseable query string");
                HashMap::new()
            }
        };

        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            path: path.to_string(),
            headers: request.headers().clone(),
            body: request.body().clone(),
            query,
            params: PathParams::new(),
            session: None,
            extensions: Extensions::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Full request URI, base path included
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Path relative to the controller's base path
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A header value, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    // ---------------------------------------------------------------------
    // Route parameters
    // ---------------------------------------------------------------------

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// A route parameter the action cannot work without
    pub fn require_param(&self, name: &str) -> Result<&str, AppError> {
        self.param(name).ok_or_else(|| {
            RequestError::MissingParam {
                name: name.to_string(),
            }
            .into()
        })
    }

    pub(crate) fn set_params(&mut self, params: PathParams) {
        self.params = params;
    }

    // ---------------------------------------------------------------------
    // Query string
    // ---------------------------------------------------------------------

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Parse a query parameter, failing with 400 when it does not parse
    pub fn query_parsed<T>(&self, name: &str) -> Result<Option<T>, AppError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.query_param(name)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| -> AppError {
                    RequestError::InvalidQuery {
                        parameter: name.to_string(),
                        message: e.to_string(),
                    }
                    .into()
                })
            })
            .transpose()
    }

    // ---------------------------------------------------------------------
    // Body
    // ---------------------------------------------------------------------

    /// Deserialize the JSON body
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        if self.body.is_empty() {
            return Err(RequestError::InvalidBody {
                message: "expected a JSON body".to_string(),
            }
            .into());
        }
        serde_json::from_slice(&self.body).map_err(|e| {
            RequestError::InvalidBody {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Deserialize the JSON body and run the input validator on it
    pub fn validated_json<T: DeserializeOwned + Validate>(&self) -> Result<T, AppError> {
        let value: T = self.json()?;
        crate::core::validation::validate(&value)?;
        Ok(value)
    }

    // ---------------------------------------------------------------------
    // Session
    // ---------------------------------------------------------------------

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The session, or 401
    pub fn require_session(&self) -> Result<&Session, AppError> {
        self.session.as_ref().ok_or_else(|| {
            RequestError::Unauthorized {
                message: "Unauthorized".to_string(),
            }
            .into()
        })
    }

    /// Id of the user behind the session, if any
    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id.as_str())
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    /// Request-scoped values shared between middlewares and actions
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    #[cfg(test)]
    pub(crate) fn for_test(method: &str, path: &str) -> Self {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Bytes::new())
            .expect("valid test request");
        Self::new(&request, path)
    }
}

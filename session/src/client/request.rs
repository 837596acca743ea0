//! Owned request descriptions.
//!
//! A `reqwest::RequestBuilder` is consumed when sent, so requests are kept as
//! plain data and rebuilt for every attempt.

use crate::errors::{SessionError, SessionResult};
use reqwest::Method;
use serde::Serialize;

/// Body of an [`ApiRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
}

/// A request against the backend API, relative to the configured API URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: RequestBody,
    public: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            public: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> SessionResult<Self> {
        let value = serde_json::to_value(body).map_err(|e| {
            SessionError::validation(format!("Request body is not serializable: {e}"))
        })?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    /// Sets a form-encoded body.
    pub fn form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = RequestBody::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Appends a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Marks the request as public: no bearer header is attached and a `401`
    /// is returned to the caller as is.
    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn is_public(&self) -> bool {
        self.public
    }
}

/// Which submission of a request is being made.
///
/// Passed along the pipeline instead of flagging the request itself, so the
/// same [`ApiRequest`] can be shared between callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    /// The single resubmission after a credential refresh.
    Retry,
}

impl Attempt {
    /// The attempt that follows this one, if another is allowed.
    pub fn next(self) -> Option<Attempt> {
        match self {
            Attempt::First => Some(Attempt::Retry),
            Attempt::Retry => None,
        }
    }
}

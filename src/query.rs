//! JSON path queries over change documents.
//!
//! Every dynamic lookup into a record goes through [`Query`]. Queries follow
//! [RFC 9535](https://www.rfc-editor.org/rfc/rfc9535) and are parsed once, when the
//! configuration is loaded. A query that does not parse is kept so that every evaluation
//! reports it, which lets the caller count it and treat it as "no match".

use super::error::Error;

use serde_json::Value;
use serde_json_path::JsonPath;
use std::fmt;

#[derive(Debug, Clone)]
pub struct Query {
    raw: String,
    compiled: Result<JsonPath, String>,
}

impl Query {
    pub fn new(path: impl Into<String>) -> Self {
        let raw: String = path.into();
        let compiled = JsonPath::parse(&raw).map_err(|err| err.to_string());
        Self { raw, compiled }
    }

    pub fn as_str(&self) -> &str {
        self.raw.as_str()
    }

    pub fn is_valid(&self) -> bool {
        self.compiled.is_ok()
    }

    /// Return every value the query selects, in document order.
    pub fn evaluate<'a>(&self, document: &'a Value) -> Result<Vec<&'a Value>, Error> {
        match &self.compiled {
            Ok(path) => Ok(path.query(document).all()),
            Err(reason) => Err(Error::InvalidQuery {
                path: self.raw.clone(),
                reason: reason.clone(),
            }),
        }
    }

    /// Return the first value the query selects.
    pub fn first<'a>(&self, document: &'a Value) -> Result<Option<&'a Value>, Error> {
        self.evaluate(document)
            .map(|values| values.into_iter().next())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Evaluate a query given as a string.
pub fn evaluate(document: &Value, path: &str) -> Result<Vec<Value>, Error> {
    Query::new(path)
        .evaluate(document)
        .map(|values| values.into_iter().cloned().collect())
}

//! Dataset scope and the request/response types of the vending exchange.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::predicate::PredicateSet;

/// Default share holding the audit-log table.
pub const DEFAULT_SHARE: &str = "audit_logs";
/// Default schema holding the audit-log table.
pub const DEFAULT_SCHEMA: &str = "audit";
/// Default audit-log table name.
pub const DEFAULT_TABLE: &str = "logging";

/// Row-count hint sent with every exchange unless overridden.
pub const DEFAULT_LIMIT_HINT: u64 = 1000;

/// Identifies a logical dataset on the sharing server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryScope {
    pub share: String,
    pub schema: String,
    pub table: String,
}

impl QueryScope {
    #[must_use]
    pub fn new(
        share: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            share: share.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl Default for QueryScope {
    fn default() -> Self {
        Self::new(DEFAULT_SHARE, DEFAULT_SCHEMA, DEFAULT_TABLE)
    }
}

impl fmt::Display for QueryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.share, self.schema, self.table)
    }
}

/// One vending exchange. Built per call and never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationRequest {
    pub scope: QueryScope,
    pub predicate_hints: Option<PredicateSet>,
    pub limit_hint: u64,
}

impl LocationRequest {
    /// Request without predicate hints, as used by monitoring queries.
    #[must_use]
    pub fn unfiltered(scope: QueryScope, limit_hint: u64) -> Self {
        Self {
            scope,
            predicate_hints: None,
            limit_hint,
        }
    }

    /// Request advertising `predicates` to the server for pruning.
    #[must_use]
    pub fn filtered(scope: QueryScope, predicates: PredicateSet, limit_hint: u64) -> Self {
        Self {
            scope,
            predicate_hints: Some(predicates),
            limit_hint,
        }
    }

    /// JSON body of the exchange.
    ///
    /// `predicateHints` is omitted when there are no hints.
    #[must_use]
    pub fn body(&self) -> QueryRequestBody {
        QueryRequestBody {
            predicate_hints: self
                .predicate_hints
                .as_ref()
                .filter(|set| !set.is_empty())
                .map(|set| set.clauses().to_vec()),
            limit_hint: Some(self.limit_hint),
        }
    }
}

/// Wire shape of the exchange request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequestBody {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub predicate_hints: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub limit_hint: Option<u64>,
}

/// A signed, short-lived URL to a remote columnar object.
///
/// The expiry is server-defined and not tracked here, so a location must be
/// used for a single query and then dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedLocation(String);

impl SignedLocation {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Signed URLs carry credentials in the query string; only the path is shown.
impl fmt::Debug for SignedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible = self.0.split('?').next().unwrap_or_default();
        f.debug_tuple("SignedLocation").field(&visible).finish()
    }
}

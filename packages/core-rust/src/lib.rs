//! `Specter` Core — credential record, search predicates, result cells, and the
//! monitoring query catalog.

pub mod catalog;
pub mod credentials;
pub mod predicate;
pub mod result;
pub mod scope;
pub mod sql;
pub mod value;

pub use catalog::{CatalogError, MonitorQuery, MONITOR_QUERIES};
pub use credentials::{ConfigError, CredentialRecord, DEFAULT_PROFILE_PATH};
pub use predicate::{build_predicates, FilterField, PredicateSet, SearchFilters};
pub use result::QueryResult;
pub use scope::{LocationRequest, QueryRequestBody, QueryScope, SignedLocation};
pub use sql::{bind_location, quote_literal, LOCATION_PLACEHOLDER};
pub use value::{format_cell, CellValue};

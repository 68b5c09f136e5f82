//! Public facade crate for `policyscope`.
//!
//! Re-exports the backend-agnostic types/traits from `policyscope-core` at the
//! root, and the reqwest/scraper implementations from `policyscope-local`
//! under their module names, so callers depend on one crate.

pub use policyscope_core::*;

pub use policyscope_local::{analyze, extract, grade, links, pipeline};
pub use policyscope_local::{LocalFetcher, BROWSER_USER_AGENT};

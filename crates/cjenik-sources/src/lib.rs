//! Chain sources: everything that turns a retail chain's public price
//! publication into canonical [`cjenik_core::Store`] values.
//!
//! Each chain implements [`ChainSource`] and is registered by slug in
//! [`registry`]. The driver only ever observes a list of stores or an error;
//! fetching policy (timeouts, encodings, index formats) is internal to the
//! source.

pub mod client;
mod html;
pub mod jadranka_trgovina;
mod pricelist;
pub mod registry;
pub mod zabac;

pub use client::HttpClient;
pub use jadranka_trgovina::JadrankaTrgovinaSource;
pub use registry::{registry, ChainSource};
pub use zabac::ZabacSource;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid price list from {context}: {reason}")]
    InvalidPriceList { context: String, reason: String },

    #[error("price list is missing required column {column:?}")]
    MissingColumn { column: String },
}

//! Canonical CSV output layer and dated ZIP archival.
//!
//! One chain's daily data becomes three files (`stores.csv`, `products.csv`,
//! `prices.csv`) under `root/<date>/<chain>/`; [`read`] is the exact inverse
//! used to re-run the pipeline from an existing archive instead of the web.

pub mod archive;
pub mod read;
pub mod write;

pub use archive::{copy_archive_info, create_archive};
pub use read::load_chain;
pub use write::save_chain;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

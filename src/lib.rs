//! Resilient catalog retrieval: search an identifier, fetch its detail page
//! through whichever fetch strategy works, and rank the download items.

pub mod config;
pub mod cookies;
pub mod error;
pub mod fetch;
pub mod ident;
pub mod parse;
pub mod rank;
pub mod retry;
pub mod scraper;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use retry::{CancelToken, RetryPolicy};
pub use crate::scraper::Scraper;
pub use types::{CandidateRecord, DetailRecord, DownloadItem, Health};

//! scrapegen - self-correcting generation of product extraction routines.
//!
//! Captures a listing page, asks a language model for a JavaScript
//! `extractProducts(text)` routine, tests it in a sandbox and feeds failures
//! back to the model. Working routines are cached by URL and replayed across
//! paginated listings by the crawler.

pub mod browser;
pub mod cache;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod crawl;
pub mod error;
pub mod export;
pub mod host;
pub mod llm;
pub mod models;
pub mod sandbox;
pub mod session;
pub mod storage;

pub use error::{ExtractError, ExtractResult};

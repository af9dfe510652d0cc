//! Data models for extraction routines, products and pages.

mod page;
mod parser;
mod product;

pub use page::{LoadStatus, PageContent, PageEvent};
pub use parser::GeneratedParser;
pub use product::{normalize_price, products_from_values, Product};

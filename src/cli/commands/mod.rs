//! Command implementations.

mod cache;
mod check;
mod crawl;
mod generate;

pub use cache::{cmd_cache_clear, cmd_cache_list, cmd_cache_remove, cmd_cache_show};
pub use check::cmd_check;
pub use crawl::cmd_crawl;
pub use generate::{cmd_extract, cmd_generate};

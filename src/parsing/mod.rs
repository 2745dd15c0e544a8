//! Parsers for documents retrieved from EDGAR.

pub mod information_table;
pub mod utils;

pub use information_table::{InformationTableConfig, InformationTableParser};

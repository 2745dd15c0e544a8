//! Flat-file exports: CSV tables and a self-contained HTML report.

pub mod csv;
pub mod html;

pub use self::csv::{
    read_holdings, read_holdings_from, read_metadata, write_changes, write_changes_to, write_cik_list,
    write_holdings, write_holdings_to, write_metadata, write_turnover, write_turnover_to,
};
pub use self::html::{render_html, write_html};

//! Printable quotes and tabular exports.
//!
//! Everything here is synchronous and side-effect free apart from the
//! [`PrintHost`] it is handed: documents are rendered from data already in
//! memory and never touch the backend.
//!
//! "PDF" export is the browser's print-to-PDF. A document is written into a
//! new window which then opens the print dialog. When the window cannot be
//! opened (popups blocked) the user is alerted and nothing else happens.

mod csv;
mod print;
mod quote;

pub use csv::{CsvDownload, ReportTable, export_filename};
pub use print::{
    POPUP_BLOCKED_MESSAGE, PrintHost, PrintOutcome, PrintPage, PrintWindow, print_table,
    render_table_html,
};
pub use quote::{QuoteDocument, QuoteLine, QuoteSummary, print_quote, render_quote_html};

use thiserror::Error;

/// Errors from rendering export documents.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Template rendering failed.
    #[error("Failed to render document: {0}")]
    Render(#[from] askama::Error),
}

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

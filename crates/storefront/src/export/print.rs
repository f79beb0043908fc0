//! Print dialog plumbing and the printable report table.

use askama::Template;
use axum::response::{Html, IntoResponse, Response};
use tracing::warn;

use super::{ReportTable, Result};

/// Shown when the print window could not be opened.
pub const POPUP_BLOCKED_MESSAGE: &str = "Please allow popups for this site to print or save as PDF.";

/// Script that opens the print dialog once the document has loaded.
const PRINT_ON_LOAD: &str =
    "<script>window.addEventListener('load', function () { window.print(); });</script>";

/// A window that a printable document is written into.
pub trait PrintWindow {
    /// Append HTML to the document.
    fn write(&mut self, html: &str);

    /// Open the print dialog for the document.
    fn print(&mut self);
}

/// Whatever can open print windows and show alerts.
pub trait PrintHost {
    /// Open a window for a new document; `None` when popups are blocked.
    fn open_window(&mut self) -> Option<&mut dyn PrintWindow>;

    /// Show a message to the user.
    fn alert(&mut self, message: &str);
}

/// What became of a print request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintOutcome {
    /// The document was written and the print dialog requested.
    Printed,
    /// The window was blocked; the user was alerted.
    Blocked,
}

/// Write `html` into a new window and print it.
pub(crate) fn print_document<H: PrintHost + ?Sized>(host: &mut H, html: &str) -> PrintOutcome {
    let Some(window) = host.open_window() else {
        host.alert(POPUP_BLOCKED_MESSAGE);
        return PrintOutcome::Blocked;
    };
    window.write(html);
    window.print();
    PrintOutcome::Printed
}

// =============================================================================
// Server-Rendered Print Page
// =============================================================================

/// A print host whose window is the HTTP response.
///
/// The page always "opens"; printing appends a script that triggers the
/// browser's print dialog on load.
#[derive(Debug, Default)]
pub struct PrintPage {
    html: String,
    print_on_load: bool,
}

impl PrintPage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The finished document.
    #[must_use]
    pub fn into_html(self) -> String {
        if !self.print_on_load {
            return self.html;
        }
        match self.html.rfind("</body>") {
            Some(at) => {
                let mut html = self.html;
                html.insert_str(at, PRINT_ON_LOAD);
                html
            }
            None => self.html + PRINT_ON_LOAD,
        }
    }
}

impl PrintWindow for PrintPage {
    fn write(&mut self, html: &str) {
        self.html.push_str(html);
    }

    fn print(&mut self) {
        self.print_on_load = true;
    }
}

impl PrintHost for PrintPage {
    fn open_window(&mut self) -> Option<&mut dyn PrintWindow> {
        Some(self)
    }

    fn alert(&mut self, message: &str) {
        warn!(message, "Print page alert");
    }
}

impl IntoResponse for PrintPage {
    fn into_response(self) -> Response {
        Html(self.into_html()).into_response()
    }
}

// =============================================================================
// Report Table
// =============================================================================

/// Printable report table template.
#[derive(Template)]
#[template(path = "export/report_table.html")]
struct ReportTableTemplate<'a> {
    table: &'a ReportTable,
    generated_at: &'a str,
}

/// Render a report table as a standalone printable HTML document.
///
/// # Errors
///
/// Returns an error if the template fails to render.
pub fn render_table_html(table: &ReportTable, generated_at: &str) -> Result<String> {
    Ok(ReportTableTemplate {
        table,
        generated_at,
    }
    .render()?)
}

/// Render a report table and send it to the print dialog.
///
/// # Errors
///
/// Returns an error if the template fails to render. A blocked window is
/// not an error; it yields [`PrintOutcome::Blocked`].
pub fn print_table<H: PrintHost + ?Sized>(
    host: &mut H,
    table: &ReportTable,
    generated_at: &str,
) -> Result<PrintOutcome> {
    let html = render_table_html(table, generated_at)?;
    Ok(print_document(host, &html))
}

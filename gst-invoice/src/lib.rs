//! GST invoicing: totals, invoice numbers and printable invoices
//!
//! This crate computes invoice totals under the two-rate goods and services tax model (CGST and
//! SGST within a state, IGST across states), generates sequential invoice numbers, and renders
//! issued invoices to HTML and to PDF using a connection to headless chrome(ium).
//!
//! # Example
//!
//! ```rust
//! use bigdecimal::BigDecimal;
//! use gst_invoice::{
//!     compute_invoice_totals, next_invoice_number, InvoiceTotalsInputBuilder,
//!     LineItemInputBuilder,
//! };
//!
//! let input = InvoiceTotalsInputBuilder::default()
//!     .add_line(
//!         LineItemInputBuilder::default()
//!             .product_reference("P1")
//!             .quantity(1)
//!             .unit_rate(50)
//!             .gst_rate_percent(5)
//!             .build()
//!             .unwrap(),
//!     )
//!     .add_line(
//!         LineItemInputBuilder::default()
//!             .product_reference("P2")
//!             .quantity(3)
//!             .unit_rate(20)
//!             .gst_rate_percent(12)
//!             .build()
//!             .unwrap(),
//!     )
//!     .discount_percent(10)
//!     .build()
//!     .unwrap();
//! let totals = compute_invoice_totals(&input).unwrap();
//! assert_eq!(totals.total().to_string(), "108.70");
//!
//! assert_eq!(next_invoice_number("SP-2025", None).unwrap(), "SP-2025-0001");
//! ```

pub mod catalog;
pub mod error;
pub mod gst;
pub mod invoice;
pub mod money;
pub mod numbering;
pub mod template_env;
pub mod totals;

use std::{
    net::TcpListener,
    process::{Child, Command, Stdio},
    thread,
    time::Duration,
};

use base64::{Engine, engine::general_purpose};
pub use catalog::{Catalog, LineRequest, Product, ProductBuilder, ProductBuilderError};
pub use error::{Error, ErrorKind};
pub use gst::{GstSplit, gst_split, is_interstate};
pub use invoice::{
    Address, AddressBuilder, AddressBuilderError, Invoice, InvoiceBuilder, InvoiceLine, Party,
    PartyBuilder, PartyBuilderError,
};
pub use money::{money_from_f64, round_money, round_money_f64};
pub use numbering::{NumberFormat, next_invoice_number};
pub use totals::{
    InvoiceTotalsInput, InvoiceTotalsInputBuilder, InvoiceTotalsInputBuilderError,
    InvoiceTotalsResult, LineItemInput, LineItemInputBuilder, LineItemInputBuilderError,
    LineItemResult, compute_invoice_totals, compute_line,
};

use error::{AddContext, with_cleanup};
use fantoccini::{
    Client, ClientBuilder,
    wd::{PrintConfigurationBuilder, PrintMargins, PrintSize},
};
use serde_json::Map;
use tracing::{debug, info};

use crate::template_env::{render_template, setup_template_env};

const CHROMEDRIVER_PORT: u16 = 4444;

/// Starts ChromeDriver as a child process on port 4444
///
/// # Returns
/// - [`Child`] if ChromeDriver successfully starts and the port is available
///
/// # Errors
/// - [`crate::Error`] if the chromedriver binary is not in the path, or if port 4444 is not
/// available, or if the chromedriver process fails to start for any other reason
pub fn start_chromedriver() -> Result<Child, crate::Error> {
    if is_port_in_use(CHROMEDRIVER_PORT) {
        return Err(
            crate::Error::from(format!("Port {CHROMEDRIVER_PORT} is already in use"))
                .add_context("starting chromedriver"),
        );
    }

    let mut child = Command::new("chromedriver")
        .arg(format!("--port={CHROMEDRIVER_PORT}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    for _ in 0..100 {
        if is_port_in_use(CHROMEDRIVER_PORT) {
            debug!(pid = child.id(), "chromedriver is listening");
            return Ok(child);
        }

        if child
            .try_wait()
            .map_err(crate::Error::from)
            .add_context("starting chromedriver")?
            .is_some()
        {
            return Err(
                crate::Error::from(String::from("Chromedriver has stopped unexpectedly"))
                    .add_context("starting chromedriver"),
            );
        }

        thread::sleep(Duration::from_millis(10));
    }

    if !is_port_in_use(CHROMEDRIVER_PORT) {
        child.kill()?;
        return Err(crate::Error::from(format!(
            "Chromedriver failed to bind to port {CHROMEDRIVER_PORT}"
        ))
        .add_context("starting chromedriver"));
    }

    Ok(child)
}

/// Check if a given port is currently in use
///
/// # Arguments
/// - `port` The port number to check
///
/// # Returns
/// - `true` if the TCP port is currently on use on the localhost
/// - `false` if the TCP port is not being used on localhost
fn is_port_in_use(port: u16) -> bool {
    TcpListener::bind(format!("localhost:{port}")).is_err()
}

async fn connect_to_client() -> Result<Client, fantoccini::error::NewSessionError> {
    let mut caps = Map::new();
    caps.insert(
        "goog:chromeOptions".to_string(),
        serde_json::json!({
            "args": ["--headless"]
        }),
    );
    ClientBuilder::native()
        .capabilities(caps)
        .connect(&format!("http://localhost:{CHROMEDRIVER_PORT}"))
        .await
}

/// Render an issued [`Invoice`] to HTML.
///
/// The stored totals are formatted as they are; nothing is recomputed.
///
/// # Errors
/// Returns `Err(crate::Error)` if the template environment cannot be set up or rendering fails.
pub fn render_html(invoice: &Invoice) -> Result<String, crate::Error> {
    let template_env = setup_template_env()
        .map_err(crate::Error::from)
        .add_context("setting up templating environment")?;
    render_template(&template_env, invoice)
        .map_err(crate::Error::from)
        .add_context("rendering html template")
}

/// Generate a PDF byte array from [`Invoice`]
///
/// This function renders an HTML template from the provided [`Invoice`],
/// navigates a headless browser to the rendered HTML, prints the page as an A4 PDF, and returns
/// the resulting byte array. ChromeDriver must already be listening on port 4444, see
/// [`start_chromedriver`]. Once connected, the browser session is closed whether or not printing
/// succeeds, and a printing error takes precedence over a failure to close.
///
/// # Arguments
///
/// - `invoice`: Reference to the [`Invoice`] to render and print.
///
/// # Returns
///
/// - The byte array representing the PDF if successful
///
/// # Errors
///
/// Returns `Err(crate::Error)` if any step fails:
/// - connecting to the headless browser [`Client`]
/// - setting up the templating environment
/// - rendering the HTML template
/// - navigating the browser to the generated data URL
/// - configuring the print job or printing to PDF
/// - closing the browser session
pub async fn generate_pdf(invoice: &Invoice) -> Result<Vec<u8>, crate::Error> {
    let render = render_html(invoice).add_context("generating pdf")?;
    let encoded = general_purpose::STANDARD.encode(render.as_bytes());
    let data_url = format!("data:text/html;base64,{encoded}");
    let client = connect_to_client()
        .await
        .map_err(crate::Error::from)
        .add_context("connecting to client")
        .add_context("generating pdf")?;
    let pdf = print_page(&client, &data_url).await;
    let closed = client
        .close()
        .await
        .map_err(crate::Error::from)
        .add_context("closing browser session");
    let pdf = with_cleanup(pdf, closed)?;
    info!(number = invoice.number(), bytes = pdf.len(), "printed invoice pdf");
    Ok(pdf)
}

async fn print_page(client: &Client, data_url: &str) -> Result<Vec<u8>, crate::Error> {
    client
        .goto(data_url)
        .await
        .map_err(crate::Error::from)
        .add_context("navigating to address")
        .add_context("printing pdf")?;
    client
        .print(
            PrintConfigurationBuilder::default()
                .margins(PrintMargins {
                    top: 0.5,
                    left: 1.0,
                    right: 1.0,
                    bottom: 0.5,
                })
                .size(PrintSize::A4)
                .build()
                .map_err(crate::Error::from)
                .add_context("configuring printer")
                .add_context("printing pdf")?,
        )
        .await
        .map_err(crate::Error::from)
        .add_context("printing pdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn party(name: &str) -> Party {
        PartyBuilder::default().name(name).build().unwrap()
    }

    #[test]
    fn render_html_formats_without_recomputing() {
        let inv = InvoiceBuilder::default()
            .number("SP-25-0007")
            .seller(party("seller"))
            .buyer(party("buyer"))
            .add_line(
                "this is a test",
                LineItemInputBuilder::default()
                    .product_reference("test")
                    .quantity(3)
                    .unit_rate(20)
                    .gst_rate_percent(12)
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        let html = render_html(&inv).unwrap();
        assert!(html.contains("SP-25-0007"));
        assert!(html.contains("\u{20b9}67.20"));
    }

    #[tokio::test]
    #[ignore = "needs chromedriver and chrome on the PATH"]
    async fn test_generate_pdf() {
        let mut c = start_chromedriver().unwrap();
        let inv = InvoiceBuilder::default()
            .number("SP-25-0001")
            .seller(party("sender"))
            .buyer(party("receiver"))
            .add_line(
                "this is a test",
                LineItemInputBuilder::default()
                    .product_reference("test")
                    .quantity(2)
                    .unit_rate(10)
                    .gst_rate_percent(18)
                    .build()
                    .unwrap(),
            )
            .discount_percent(5)
            .build()
            .unwrap();
        let v = generate_pdf(&inv).await.unwrap();
        assert!(v.starts_with(b"%PDF"));
        c.kill().unwrap();
    }
}

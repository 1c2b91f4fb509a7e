use std::{io::Write, path::Path, process::Child};

use chrono::{Duration, Local};
use clap::Parser;
use gst_invoice::{
    Invoice, InvoiceBuilder, InvoiceTotalsInput, compute_invoice_totals,
    error::{AddContext, with_cleanup},
    generate_pdf, next_invoice_number, start_chromedriver,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    cli::{Cli, Command, InvoiceRequest, read_json_input},
    config::Config,
    ledger::{Ledger, load_catalog, save_catalog},
};

mod cli;
mod config;
mod ledger;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), gst_invoice::Error> {
    let raw = serde_json::to_string_pretty(value)
        .map_err(gst_invoice::Error::from)
        .add_context("serializing output")?;
    println!("{raw}");
    Ok(())
}

fn kill_chrome(chrome_process: &mut Child) -> Result<(), gst_invoice::Error> {
    chrome_process
        .kill()
        .map_err(gst_invoice::Error::from)
        .add_context("killing chromedriver process from cli")?;
    Ok(())
}

/// Print `invoice` with a chromedriver that lives only for this call.
async fn invoice_pdf(invoice: &Invoice) -> Result<Vec<u8>, gst_invoice::Error> {
    let mut chrome_process = start_chromedriver().add_context("starting chromedriver in cli")?;
    let pdf = generate_pdf(invoice)
        .await
        .add_context("generating pdf data from invoice")
        .add_context(&format!("invoice number: {}", invoice.number()));
    with_cleanup(pdf, kill_chrome(&mut chrome_process))
}

fn pdf_file_name(invoice: &Invoice) -> String {
    format!("{}.pdf", invoice.number().replace(['/', '\\'], "_"))
}

async fn write_invoice_pdf(
    invoice: &Invoice,
    out: Option<&Path>,
) -> Result<(), gst_invoice::Error> {
    let data = invoice_pdf(invoice).await?;
    match out {
        Some(out) => {
            let path = out.join(pdf_file_name(invoice));
            if std::fs::write(&path, &data).is_err() {
                warn!(
                    number = invoice.number(),
                    path = %path.display(),
                    "failed to write invoice pdf, printing to stdout instead"
                );
                write_pdf_to_stdout(&data)
            } else {
                info!(number = invoice.number(), path = %path.display(), "wrote invoice pdf");
                Ok(())
            }
        }
        None => write_pdf_to_stdout(&data),
    }
}

fn write_pdf_to_stdout(data: &[u8]) -> Result<(), gst_invoice::Error> {
    let mut stdout = std::io::stdout();
    stdout
        .write_all(data)
        .map_err(gst_invoice::Error::from)
        .add_context("writing invoice pdf to stdout")?;
    stdout
        .flush()
        .map_err(gst_invoice::Error::from)
        .add_context("flushing stdout")
        .add_context("printing to stdout")?;
    Ok(())
}

fn totals(data: Option<&Path>) -> Result<(), gst_invoice::Error> {
    let input: InvoiceTotalsInput = read_json_input(data).add_context("reading line items")?;
    let totals = compute_invoice_totals(&input).add_context("computing totals")?;
    print_json(&totals)
}

fn next_number(prefix: &str, last: Option<&str>) -> Result<(), gst_invoice::Error> {
    let number = next_invoice_number(prefix, last).add_context("generating next number")?;
    println!("{number}");
    Ok(())
}

/// Build the invoice for `request` and record it.
///
/// Nothing is written until the invoice is built and stock is available. The catalog is then
/// written before the ledger, and put back as it was if the ledger cannot be saved, so an
/// invoice is in the ledger only if its stock has been taken.
fn issue_invoice(config: &Config, request: InvoiceRequest) -> Result<Invoice, gst_invoice::Error> {
    let catalog_path = config.catalog_path();
    let mut catalog = load_catalog(&catalog_path)?;
    let mut ledger = Ledger::open(config.ledger_path())?;

    let items = catalog
        .resolve_all(&request.lines)
        .add_context("resolving invoice lines")?;
    let number = config
        .numbering()
        .next(ledger.last_number(config.numbering()))
        .add_context("numbering invoice")?;

    let created = Local::now().fixed_offset();
    let mut builder = InvoiceBuilder::default()
        .number(number)
        .created_datetime(created)
        .net_due_datetime(created + Duration::days(i64::from(config.due_days())))
        .seller(config.seller().clone())
        .buyer(request.buyer)
        .discount_percent(request.discount_percent);
    if let Some(is_interstate) = request.is_interstate {
        builder = builder.is_interstate(is_interstate);
    }
    if let Some(purchase_order) = request.purchase_order {
        builder = builder.purchase_order(purchase_order);
    }
    if let Some(logo) = config.logo_path() {
        builder = builder.logo(logo);
    }
    for item in &items {
        let title = catalog
            .get(item.product_reference())
            .map(|p| p.name().to_string())
            .unwrap_or_else(|| item.product_reference().to_string());
        builder = builder.add_line(title, item.clone());
    }
    let invoice = builder.build().add_context("building invoice")?;

    let original_catalog = catalog.clone();
    catalog
        .deduct_stock(&items)
        .add_context(&format!("updating stock for invoice {}", invoice.number()))?;
    ledger.append(invoice.clone())?;
    save_catalog(&catalog_path, &catalog)?;
    if let Err(e) = ledger.save() {
        warn!(number = invoice.number(), "ledger not saved, restoring catalog");
        let restored = save_catalog(&catalog_path, &original_catalog)
            .add_context("restoring catalog after failed ledger save");
        return with_cleanup(Err(e), restored);
    }
    info!(
        number = invoice.number(),
        total = %invoice.totals().total(),
        lines = invoice.lines().len(),
        "issued invoice"
    );
    Ok(invoice)
}

async fn issue(
    config_path: &Path,
    data: Option<&Path>,
    pdf_dir: Option<&Path>,
) -> Result<(), gst_invoice::Error> {
    let config = Config::load(config_path).add_context("loading configuration")?;
    let request: InvoiceRequest = read_json_input(data).add_context("reading invoice request")?;
    let invoice = issue_invoice(&config, request).add_context("issuing invoice")?;
    print_json(&invoice)?;
    if let Some(dir) = pdf_dir {
        write_invoice_pdf(&invoice, Some(dir)).await?;
    }
    Ok(())
}

async fn render(
    config_path: &Path,
    number: &str,
    out: Option<&Path>,
) -> Result<(), gst_invoice::Error> {
    let config = Config::load(config_path).add_context("loading configuration")?;
    let ledger = Ledger::open(config.ledger_path())?;
    let invoice = ledger
        .find(number)
        .ok_or_else(|| gst_invoice::Error::from(format!("no invoice numbered '{number}'")))
        .add_context("rendering invoice")?;
    write_invoice_pdf(invoice, out).await
}

fn products(config_path: &Path) -> Result<(), gst_invoice::Error> {
    let config = Config::load(config_path).add_context("loading configuration")?;
    let catalog = load_catalog(&config.catalog_path())?;
    print_json(&catalog)
}

#[tokio::main]
async fn main() -> Result<(), gst_invoice::Error> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Totals { data } => totals(data.as_deref()),
        Command::NextNumber { prefix, last } => next_number(&prefix, last.as_deref()),
        Command::Issue { config, data, pdf } => {
            issue(&config, data.as_deref(), pdf.as_deref()).await
        }
        Command::Render {
            config,
            number,
            out,
        } => render(&config, &number, out.as_deref()).await,
        Command::Products { config } => products(&config),
    }
}

use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use bigdecimal::BigDecimal;
use clap::{Parser, Subcommand};
use gst_invoice::{
    LineRequest, Party,
    error::AddContext,
    money::{deserialize_bigdecimal, serialize_bigdecimal},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

fn read_until_eof() -> io::Result<String> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    Ok(input)
}

#[derive(Debug, Parser)]
#[command(version, about = "GST invoice totals, numbering and PDFs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute the totals of an invoice given as JSON line items
    Totals {
        /// Path to the JSON file with line items, discount and interstate flag. Reads stdin
        /// when omitted
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
    /// Print the invoice number that follows the given one
    NextNumber {
        #[arg(short, long)]
        prefix: String,

        /// Last number issued under the prefix; omit for the first invoice
        #[arg(short, long)]
        last: Option<String>,
    },
    /// Issue an invoice: number it, total it, record it and update stock
    Issue {
        #[arg(short, long)]
        config: PathBuf,

        /// Path to the JSON invoice request. Reads stdin when omitted
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Directory to also write `<number>.pdf` into
        #[arg(long)]
        pdf: Option<PathBuf>,
    },
    /// Print an issued invoice as PDF
    Render {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long)]
        number: String,

        /// Path to the directory where the PDF should be saved instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// List the product catalog
    Products {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// What a user submits to issue an invoice. Rates not given per line come from the catalog.
#[derive(Debug, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub buyer: Party,
    pub lines: Vec<LineRequest>,
    #[serde(
        default,
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    pub discount_percent: BigDecimal,
    /// Overrides the interstate decision derived from the parties' state codes
    #[serde(default)]
    pub is_interstate: Option<bool>,
    #[serde(default)]
    pub purchase_order: Option<String>,
}

/// Read JSON from `path`, or from stdin when no path is given.
pub fn read_json_input<T>(path: Option<&Path>) -> Result<T, gst_invoice::Error>
where
    T: DeserializeOwned,
{
    let raw = match path {
        Some(path) => fs::read_to_string(path)
            .map_err(gst_invoice::Error::from)
            .add_context(&format!("reading input from file '{}'", path.display()))?,
        None => read_until_eof()
            .map_err(gst_invoice::Error::from)
            .add_context("reading input from stdin")?,
    };
    serde_json::from_str(&raw)
        .map_err(gst_invoice::Error::from)
        .add_context("parsing input JSON")
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_next_number() {
        let cli = Cli::parse_from([
            "gst-invoice-cli",
            "next-number",
            "-p",
            "SP-2025",
            "-l",
            "SP-2025-0001",
        ]);
        match cli.command {
            Command::NextNumber { prefix, last } => {
                assert_eq!(prefix, "SP-2025");
                assert_eq!(last.as_deref(), Some("SP-2025-0001"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn request_defaults() {
        let request: InvoiceRequest = serde_json::from_value(serde_json::json!({
            "buyer": {"name": "Kaveri Stores"},
            "lines": [{"product_reference": "TEA", "quantity": 2}]
        }))
        .unwrap();
        assert_eq!(request.discount_percent, BigDecimal::from(0));
        assert!(request.is_interstate.is_none());
        assert_eq!(request.lines[0].product_reference(), "TEA");
    }

    #[test]
    fn reads_json_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.json");
        fs::write(&path, r#"{"buyer": {"name": "B"}, "lines": [], "discount_percent": "2.5"}"#)
            .unwrap();
        let request: InvoiceRequest = read_json_input(Some(&path)).unwrap();
        assert_eq!(request.discount_percent.to_string(), "2.5");

        let err = read_json_input::<InvoiceRequest>(Some(&dir.path().join("missing.json")))
            .unwrap_err();
        assert!(err.to_string().starts_with("reading input from file"));
    }
}

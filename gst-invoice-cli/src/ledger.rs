//! JSON files holding issued invoices and the product catalog.
//!
//! One CLI process reads, updates and rewrites these files per command. Running two `issue`
//! commands against the same ledger at once can hand out the same number twice; callers must
//! not do that.

use std::{fs, io, path::Path, path::PathBuf};

use gst_invoice::{Catalog, Error, Invoice, NumberFormat, error::AddContext};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

/// Read `path` as JSON, or return the default value if the file does not exist yet.
pub fn read_json_or_default<T>(path: &Path) -> Result<T, Error>
where
    T: DeserializeOwned + Default,
{
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "file does not exist yet, starting empty");
            return Ok(T::default());
        }
        Err(e) => {
            return Err(Error::from(e).add_context(&format!("reading '{}'", path.display())));
        }
    };
    serde_json::from_str(&raw)
        .map_err(Error::from)
        .add_context(&format!("parsing '{}'", path.display()))
}

/// Write `value` as pretty JSON next to `path` and move it into place, so a failed write
/// never leaves a truncated file behind.
pub fn write_json<T>(path: &Path, value: &T) -> Result<(), Error>
where
    T: Serialize,
{
    let raw = serde_json::to_string_pretty(value)
        .map_err(Error::from)
        .add_context(&format!("serializing '{}'", path.display()))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, raw)
        .map_err(Error::from)
        .add_context(&format!("writing '{}'", tmp.display()))?;
    fs::rename(&tmp, path)
        .map_err(Error::from)
        .add_context(&format!("replacing '{}'", path.display()))
}

pub fn load_catalog(path: &Path) -> Result<Catalog, Error> {
    read_json_or_default(path).add_context("loading catalog")
}

pub fn save_catalog(path: &Path, catalog: &Catalog) -> Result<(), Error> {
    write_json(path, catalog).add_context("saving catalog")
}

/// Issued invoices, oldest first.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    invoices: Vec<Invoice>,
}

impl Ledger {
    /// Open the ledger at `path`; a missing file is an empty ledger.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let invoices = read_json_or_default(&path).add_context("opening ledger")?;
        Ok(Self { path, invoices })
    }

    pub fn invoices(&self) -> &[Invoice] {
        &self.invoices
    }

    /// The most recently issued number in `format`'s series, malformed or not.
    pub fn last_number(&self, format: &NumberFormat) -> Option<&str> {
        self.invoices
            .iter()
            .rev()
            .map(Invoice::number)
            .find(|number| format.owns(number))
    }

    pub fn find(&self, number: &str) -> Option<&Invoice> {
        self.invoices.iter().find(|i| i.number() == number)
    }

    /// Record an issued invoice. Numbers are unique within the ledger.
    pub fn append(&mut self, invoice: Invoice) -> Result<(), Error> {
        if self.find(invoice.number()).is_some() {
            return Err(Error::from(format!(
                "invoice {} has already been issued",
                invoice.number()
            )));
        }
        debug!(number = invoice.number(), "appending invoice to ledger");
        self.invoices.push(invoice);
        Ok(())
    }

    pub fn save(&self) -> Result<(), Error> {
        write_json(&self.path, &self.invoices).add_context("saving ledger")
    }
}

#[cfg(test)]
mod tests {
    use gst_invoice::{InvoiceBuilder, LineItemInputBuilder, PartyBuilder, ProductBuilder};

    use super::*;

    fn invoice(number: &str) -> Invoice {
        InvoiceBuilder::default()
            .number(number)
            .seller(PartyBuilder::default().name("S").build().unwrap())
            .buyer(PartyBuilder::default().name("B").build().unwrap())
            .add_line(
                "Tea",
                LineItemInputBuilder::default()
                    .product_reference("TEA")
                    .quantity(2)
                    .unit_rate(100)
                    .gst_rate_percent(18)
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn missing_file_is_an_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path().join("ledger.json")).unwrap();
        assert!(ledger.invoices().is_empty());
        assert_eq!(ledger.last_number(&NumberFormat::new("SP-25")), None);
    }

    #[test]
    fn invoices_persist_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let mut ledger = Ledger::open(&path).unwrap();
        ledger.append(invoice("SP-25-0001")).unwrap();
        ledger.append(invoice("SP-25-0002")).unwrap();
        ledger.save().unwrap();

        let reopened = Ledger::open(&path).unwrap();
        assert_eq!(reopened.invoices().len(), 2);
        let stored = reopened.find("SP-25-0002").unwrap();
        assert_eq!(stored.totals().total().to_string(), "236.00");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn last_number_is_scoped_to_the_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::open(dir.path().join("ledger.json")).unwrap();
        ledger.append(invoice("SP-24-0410")).unwrap();
        ledger.append(invoice("SP-25-0001")).unwrap();
        ledger.append(invoice("SP-25-0002")).unwrap();
        ledger.append(invoice("SP-24-0411")).unwrap();

        let format = NumberFormat::new("SP-25");
        assert_eq!(ledger.last_number(&format), Some("SP-25-0002"));
        assert_eq!(
            format.next(ledger.last_number(&format)).unwrap(),
            "SP-25-0003"
        );
    }

    #[test]
    fn malformed_last_number_is_not_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::open(dir.path().join("ledger.json")).unwrap();
        ledger.append(invoice("SP-25-0001")).unwrap();
        ledger.append(invoice("SP-25-00x2")).unwrap();

        let format = NumberFormat::new("SP-25");
        assert_eq!(ledger.last_number(&format), Some("SP-25-00x2"));
        let err = format.next(ledger.last_number(&format)).unwrap_err();
        assert!(matches!(
            err.kind(),
            gst_invoice::ErrorKind::InvalidPreviousNumber(n) if n == "SP-25-00x2"
        ));
    }

    #[test]
    fn duplicate_numbers_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::open(dir.path().join("ledger.json")).unwrap();
        ledger.append(invoice("SP-25-0001")).unwrap();
        assert!(ledger.append(invoice("SP-25-0001")).is_err());
        assert_eq!(ledger.invoices().len(), 1);
    }

    #[test]
    fn catalog_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        assert_eq!(load_catalog(&path).unwrap().products().count(), 0);

        let catalog = Catalog::new([ProductBuilder::default()
            .reference("TEA")
            .name("Tea")
            .unit_rate(120)
            .gst_rate_percent(5)
            .stock(4)
            .build()
            .unwrap()]);
        save_catalog(&path, &catalog).unwrap();
        let loaded = load_catalog(&path).unwrap();
        assert_eq!(loaded.get("TEA").unwrap().stock().map(|s| s.to_string()), Some("4".into()));
    }

    #[test]
    fn corrupt_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(&path, "not json").unwrap();
        let err = Ledger::open(&path).unwrap_err();
        assert!(err.to_string().starts_with("opening ledger -> parsing"));
    }
}

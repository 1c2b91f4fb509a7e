use std::{
    fs,
    path::{Path, PathBuf},
};

use gst_invoice::{Error, NumberFormat, Party, error::AddContext};
use serde::Deserialize;

fn default_due_days() -> u32 {
    30
}

/// Settings shared by every command that touches issued invoices.
///
/// Relative paths are resolved against the directory holding the config file.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    numbering: NumberFormat,
    seller: Party,
    catalog: PathBuf,
    ledger: PathBuf,
    #[serde(default)]
    logo: Option<PathBuf>,
    /// Days between issue and payment due date
    #[serde(default = "default_due_days")]
    due_days: u32,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let raw = fs::read_to_string(path)
            .map_err(Error::from)
            .add_context(&format!("reading config file '{}'", path.display()))?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_json(&raw, base_dir)
    }

    pub fn from_json(raw: &str, base_dir: PathBuf) -> Result<Self, Error> {
        let config: Config = serde_json::from_str(raw)
            .map_err(Error::from)
            .add_context("parsing config JSON")?;
        Ok(Config { base_dir, ..config })
    }

    pub fn numbering(&self) -> &NumberFormat {
        &self.numbering
    }

    pub fn seller(&self) -> &Party {
        &self.seller
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.base_dir.join(&self.catalog)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.base_dir.join(&self.ledger)
    }

    pub fn logo_path(&self) -> Option<PathBuf> {
        self.logo.as_ref().map(|logo| self.base_dir.join(logo))
    }

    pub fn due_days(&self) -> u32 {
        self.due_days
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "seller": {
            "name": "Sri Traders",
            "gstin": "29ABCDE1234F1Z5",
            "address": {
                "line1": "12 Residency Road",
                "city": "Bengaluru",
                "state_code": "KA",
                "postal_code": "560025"
            }
        },
        "catalog": "catalog.json",
        "ledger": "/var/lib/invoices/ledger.json"
    }"#;

    #[test]
    fn defaults_are_applied() {
        let config = Config::from_json(MINIMAL, PathBuf::from("/etc/shop")).unwrap();
        assert_eq!(config.numbering(), &NumberFormat::default());
        assert_eq!(config.numbering().prefix(), "SP-25");
        assert_eq!(config.due_days(), 30);
        assert!(config.logo_path().is_none());
        assert_eq!(config.seller().state_code(), Some("KA"));
    }

    #[test]
    fn relative_paths_follow_the_config_file() {
        let config = Config::from_json(MINIMAL, PathBuf::from("/etc/shop")).unwrap();
        assert_eq!(config.catalog_path(), PathBuf::from("/etc/shop/catalog.json"));
        assert_eq!(
            config.ledger_path(),
            PathBuf::from("/var/lib/invoices/ledger.json")
        );
    }

    #[test]
    fn numbering_can_be_configured() {
        let raw = MINIMAL.replacen(
            "\"catalog\"",
            "\"numbering\": {\"prefix\": \"SP-2025\", \"width\": 5}, \"due_days\": 15, \"catalog\"",
            1,
        );
        let config = Config::from_json(&raw, PathBuf::new()).unwrap();
        assert_eq!(config.numbering().next(None).unwrap(), "SP-2025-00001");
        assert_eq!(config.due_days(), 15);
    }

    #[test]
    fn missing_seller_is_an_error() {
        let err = Config::from_json(r#"{"catalog": "c", "ledger": "l"}"#, PathBuf::new())
            .unwrap_err();
        assert!(err.to_string().starts_with("parsing config JSON"));
    }
}

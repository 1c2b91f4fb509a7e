//! Invoice domain types and serialization helpers.
//!
//! This module defines the structures used to represent issued invoices, parties,
//! addresses, and invoice lines. Builders are derived for constructing instances; the
//! [`InvoiceBuilder`] runs [`compute_invoice_totals`] once, and the resulting totals are stored
//! with the invoice so that later readers format them instead of recomputing them.

use std::path::PathBuf;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, FixedOffset, Local};
use derive_builder::Builder;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::info;

use crate::{
    error::{AddContext, Error, ErrorKind},
    gst,
    money::{deserialize_bigdecimal, serialize_bigdecimal},
    totals::{
        InvoiceTotalsInputBuilder, InvoiceTotalsResult, LineItemInput, LineItemResult,
        compute_invoice_totals,
    },
};

fn serialize_datetime<S>(value: &DateTime<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_rfc3339())
}

fn deserialize_datetime<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&s).map_err(serde::de::Error::custom)
}

/// A party involved in the invoice (seller or buyer)
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(strip_option, into), pattern = "owned")]
pub struct Party {
    name: String,
    #[builder(default)]
    #[serde(default)]
    phone: Option<String>,
    #[builder(default)]
    #[serde(default)]
    email: Option<String>,
    /// GST identification number
    #[builder(default)]
    #[serde(default)]
    gstin: Option<String>,
    #[builder(default)]
    #[serde(default)]
    address: Option<Address>,
}

impl Party {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gstin(&self) -> Option<&str> {
        self.gstin.as_deref()
    }

    /// State code of the party's address, if it has one.
    pub fn state_code(&self) -> Option<&str> {
        self.address.as_ref().map(|a| a.state_code.as_str())
    }
}

/// A postal address
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(strip_option, into), pattern = "owned")]
pub struct Address {
    line1: String,
    #[builder(default)]
    #[serde(default)]
    line2: Option<String>,
    city: String,
    /// GST state code, e.g. `KA` or `29`; decides between intrastate and interstate tax.
    state_code: String,
    postal_code: String,
}

/// An invoice line: what was sold, at which rates, and the rounded amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    title: String,
    item: LineItemInput,
    amounts: LineItemResult,
}

impl InvoiceLine {
    /// Return the title printed for this line.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Return the line as it was entered.
    pub fn item(&self) -> &LineItemInput {
        &self.item
    }

    /// Return the rounded subtotal, tax and total of this line.
    pub fn amounts(&self) -> &LineItemResult {
        &self.amounts
    }
}

/// Invoice top level model
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(strip_option, into), pattern = "owned", build_fn(skip))]
pub struct Invoice {
    number: String,
    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime"
    )]
    created_datetime: DateTime<FixedOffset>,
    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime"
    )]
    net_due_datetime: DateTime<FixedOffset>,
    seller: Party,
    buyer: Party,
    #[serde(default)]
    logo: Option<PathBuf>,
    #[builder(field(ty = "Vec<(String, LineItemInput)>"), setter(custom))]
    lines: Vec<InvoiceLine>,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    discount_percent: BigDecimal,
    is_interstate: bool,
    #[builder(setter(skip))]
    totals: InvoiceTotalsResult,
    #[serde(default)]
    purchase_order: Option<String>,
}

impl Invoice {
    /// Return the invoice number.
    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn created_datetime(&self) -> &DateTime<FixedOffset> {
        &self.created_datetime
    }

    pub fn net_due_datetime(&self) -> &DateTime<FixedOffset> {
        &self.net_due_datetime
    }

    pub fn seller(&self) -> &Party {
        &self.seller
    }

    pub fn buyer(&self) -> &Party {
        &self.buyer
    }

    /// Return a reference to the invoice's lines.
    pub fn lines(&self) -> &[InvoiceLine] {
        &self.lines
    }

    pub fn discount_percent(&self) -> &BigDecimal {
        &self.discount_percent
    }

    pub fn is_interstate(&self) -> bool {
        self.is_interstate
    }

    /// Return the totals computed when the invoice was built.
    pub fn totals(&self) -> &InvoiceTotalsResult {
        &self.totals
    }

    pub fn purchase_order(&self) -> Option<&str> {
        self.purchase_order.as_deref()
    }
}

impl InvoiceBuilder {
    /// Add a line to the builder's internal list.
    ///
    /// # Arguments
    /// * `title` - Text printed for the line, usually the product name.
    /// * `item` - The [`LineItemInput`] to append.
    ///
    /// # Returns
    /// The updated [`InvoiceBuilder`].
    ///
    /// # Example
    /// ```rust
    /// use gst_invoice::{InvoiceBuilder, LineItemInputBuilder};
    ///
    /// let item = LineItemInputBuilder::default()
    ///     .product_reference("TEA-250")
    ///     .quantity(1)
    ///     .unit_rate(120)
    ///     .gst_rate_percent(5)
    ///     .build().unwrap();
    /// let builder = InvoiceBuilder::default().add_line("Assam tea 250g", item);
    /// ```
    pub fn add_line(mut self, title: impl Into<String>, item: LineItemInput) -> Self {
        self.lines.push((title.into(), item));
        self
    }

    /// Finalize the builder into an [`Invoice`], computing its totals.
    ///
    /// Missing optional fields are filled with reasonable defaults:
    /// * `created_datetime` defaults to [`Local::now`].
    /// * `net_due_datetime` defaults to 30 days after `created_datetime`.
    /// * `discount_percent` defaults to zero.
    /// * `is_interstate` is derived from the seller's and buyer's state codes, and is `false`
    ///   when either party has no address.
    ///
    /// # Returns
    /// [`Invoice`] on success.
    ///
    /// # Errors
    /// * [`ErrorKind::MissingField`] if `number`, `seller` or `buyer` is missing.
    /// * Any error of [`compute_invoice_totals`].
    ///
    /// # Example
    /// ```rust
    /// use bigdecimal::BigDecimal;
    /// use gst_invoice::{AddressBuilder, InvoiceBuilder, LineItemInputBuilder, PartyBuilder};
    ///
    /// let address = |state: &str| {
    ///     AddressBuilder::default()
    ///         .line1("1 MG Road")
    ///         .city("Bengaluru")
    ///         .state_code(state)
    ///         .postal_code("560001")
    ///         .build()
    ///         .unwrap()
    /// };
    /// let inv = InvoiceBuilder::default()
    ///     .number("SP-25-0001")
    ///     .seller(PartyBuilder::default().name("Seller").address(address("KA")).build().unwrap())
    ///     .buyer(PartyBuilder::default().name("Buyer").address(address("TN")).build().unwrap())
    ///     .add_line(
    ///         "Assam tea 250g",
    ///         LineItemInputBuilder::default()
    ///             .product_reference("TEA-250")
    ///             .quantity(2)
    ///             .unit_rate(100)
    ///             .gst_rate_percent(18)
    ///             .build()
    ///             .unwrap(),
    ///     )
    ///     .build()
    ///     .unwrap();
    /// assert!(inv.is_interstate());
    /// assert_eq!(inv.totals().igst(), &BigDecimal::from(36));
    /// ```
    pub fn build(self) -> Result<Invoice, Error> {
        let number = self
            .number
            .ok_or_else(|| Error::from(ErrorKind::MissingField("number")))?;
        let seller = self
            .seller
            .ok_or_else(|| Error::from(ErrorKind::MissingField("seller")))?;
        let buyer = self
            .buyer
            .ok_or_else(|| Error::from(ErrorKind::MissingField("buyer")))?;
        let created_datetime = self
            .created_datetime
            .unwrap_or_else(|| Local::now().fixed_offset());
        let net_due_datetime = self
            .net_due_datetime
            .unwrap_or(created_datetime + Duration::days(30));
        let logo = self.logo.unwrap_or(None);
        let discount_percent = self
            .discount_percent
            .unwrap_or_else(|| BigDecimal::from(0));
        let is_interstate = self.is_interstate.unwrap_or_else(|| {
            match (seller.state_code(), buyer.state_code()) {
                (Some(from), Some(to)) => gst::is_interstate(from, to),
                _ => false,
            }
        });
        let purchase_order = self.purchase_order.unwrap_or(None);

        let (titles, items): (Vec<String>, Vec<LineItemInput>) = self.lines.into_iter().unzip();
        let input = InvoiceTotalsInputBuilder::default()
            .line_items(items)
            .discount_percent(discount_percent.clone())
            .is_interstate(is_interstate)
            .build()
            .map_err(|e| Error::from(format!("{e:?}")))?;
        let totals = compute_invoice_totals(&input)
            .add_context(&format!("computing totals of invoice {number}"))?;
        let lines = titles
            .into_iter()
            .zip(input.line_items().iter().cloned())
            .zip(totals.lines().iter().cloned())
            .map(|((title, item), amounts)| InvoiceLine {
                title,
                item,
                amounts,
            })
            .collect();

        info!(
            number = %number,
            total = %totals.total(),
            interstate = is_interstate,
            "built invoice"
        );
        Ok(Invoice {
            number,
            created_datetime,
            net_due_datetime,
            seller,
            buyer,
            logo,
            lines,
            discount_percent,
            is_interstate,
            totals,
            purchase_order,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::TimeZone;

    use super::*;
    use crate::totals::LineItemInputBuilder;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn make_party(name: &str, state: &str) -> Party {
        PartyBuilder::default()
            .name(name)
            .gstin(format!("29ABCDE1234F1Z{}", name.len()))
            .address(
                AddressBuilder::default()
                    .line1("L")
                    .city("C")
                    .state_code(state)
                    .postal_code("Z")
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    fn item(reference: &str, quantity: &str, rate: &str, gst: &str) -> LineItemInput {
        LineItemInputBuilder::default()
            .product_reference(reference)
            .quantity(dec(quantity))
            .unit_rate(dec(rate))
            .gst_rate_percent(dec(gst))
            .build()
            .unwrap()
    }

    #[test]
    fn test_deserialize_datetime() {
        #[derive(Deserialize)]
        struct Wrap {
            #[serde(deserialize_with = "super::deserialize_datetime")]
            #[allow(dead_code)]
            date: DateTime<FixedOffset>,
        }

        let val = serde_json::json!({"date": "2026-02-10T12:00:00+05:30"});
        let _: Wrap = serde_json::from_value(val).unwrap();
        let val = serde_json::json!({"date": "reee"});
        let x = serde_json::from_value::<Wrap>(val);
        assert!(x.is_err())
    }

    #[test]
    fn test_serialize_datetime() {
        #[derive(Serialize)]
        struct Wrap {
            #[serde(serialize_with = "super::serialize_datetime")]
            dt: DateTime<FixedOffset>,
        }

        let dt = chrono::Utc
            .with_ymd_and_hms(2026, 2, 9, 12, 0, 0)
            .unwrap()
            .into();
        let j = serde_json::to_value(Wrap { dt }).unwrap();
        let s = j.get("dt").and_then(|v| v.as_str()).unwrap();
        assert_eq!("2026-02-09T12:00:00+00:00", s);
    }

    #[test]
    fn minimal_party_builder_success() {
        let party = PartyBuilder::default().name("Alice").build().unwrap();
        assert_eq!(party.name(), "Alice");
        assert!(party.gstin().is_none());
        assert!(party.state_code().is_none());
    }

    #[test]
    fn party_builder_missing_required_name_fails() {
        let _ = PartyBuilder::default().build().unwrap_err();
    }

    #[test]
    fn address_builder_missing_state_code_fails() {
        let _ = AddressBuilder::default()
            .line1("L")
            .city("C")
            .postal_code("Z")
            .build()
            .unwrap_err();
    }

    #[test]
    fn invoice_builder_success_and_computations() {
        let inv = InvoiceBuilder::default()
            .number("SP-25-0001")
            .seller(make_party("Seller", "KA"))
            .buyer(make_party("Buyer", "KA"))
            .add_line("Item A", item("A", "1", "50", "5"))
            .add_line("Item B", item("B", "3", "20", "12"))
            .discount_percent(10)
            .purchase_order("PO-7")
            .build()
            .unwrap();

        assert!(!inv.is_interstate());
        assert_eq!(inv.lines().len(), 2);
        assert_eq!(inv.lines()[1].title(), "Item B");
        assert_eq!(inv.lines()[1].amounts().line_tax(), &dec("7.20"));
        assert_eq!(inv.totals().cgst(), &dec("4.85"));
        assert_eq!(inv.totals().total(), &dec("108.70"));
        assert_eq!(inv.purchase_order(), Some("PO-7"));

        let expected_date = Local::now();
        assert_eq!(expected_date.date_naive(), inv.created_datetime().date_naive());
        assert_eq!(
            *inv.net_due_datetime() - *inv.created_datetime(),
            Duration::days(30)
        );
    }

    #[test]
    fn explicit_interstate_flag_wins() {
        let inv = InvoiceBuilder::default()
            .number("SP-25-0002")
            .seller(make_party("Seller", "KA"))
            .buyer(make_party("Buyer", "KA"))
            .is_interstate(true)
            .add_line("Item", item("A", "2", "100", "18"))
            .build()
            .unwrap();
        assert_eq!(inv.totals().igst(), &dec("36"));
        assert_eq!(inv.totals().cgst(), &dec("0"));
    }

    #[test]
    fn interstate_is_derived_from_state_codes() {
        let inv = InvoiceBuilder::default()
            .number("SP-25-0003")
            .seller(make_party("Seller", "KA"))
            .buyer(make_party("Buyer", "MH"))
            .add_line("Item", item("A", "2", "100", "18"))
            .build()
            .unwrap();
        assert!(inv.is_interstate());
        assert_eq!(inv.totals().igst(), &dec("36"));
    }

    #[test]
    fn invalid_lines_fail_the_build() {
        let err = InvoiceBuilder::default()
            .number("SP-25-0004")
            .seller(make_party("Seller", "KA"))
            .buyer(make_party("Buyer", "KA"))
            .add_line("Broken", item("A", "0", "100", "18"))
            .build()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidLineItem(_)));
        assert!(err.to_string().starts_with("computing totals of invoice SP-25-0004"));
    }

    #[test]
    fn invoice_builder_missing_required_fields_fails() {
        let err = InvoiceBuilder::default()
            .seller(make_party("S", "KA"))
            .buyer(make_party("B", "KA"))
            .build()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MissingField("number")));

        let err = InvoiceBuilder::default()
            .number("1")
            .buyer(make_party("B", "KA"))
            .build()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MissingField("seller")));

        let err = InvoiceBuilder::default()
            .number("1")
            .seller(make_party("S", "KA"))
            .build()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MissingField("buyer")));
    }

    #[test]
    fn stored_totals_survive_a_round_trip() {
        let inv = InvoiceBuilder::default()
            .number("SP-25-0005")
            .seller(make_party("Seller", "KA"))
            .buyer(make_party("Buyer", "KA"))
            .add_line("Item", item("A", "1", "0.01", "100"))
            .build()
            .unwrap();
        let json = serde_json::to_value(&inv).unwrap();
        assert_eq!(json["totals"]["cgst"], "0.01");
        assert_eq!(json["lines"][0]["amounts"]["line_total"], "0.02");

        let back: Invoice = serde_json::from_value(json).unwrap();
        assert_eq!(back.totals(), inv.totals());
        assert_eq!(back.number(), "SP-25-0005");
        assert_eq!(back.created_datetime(), inv.created_datetime());
    }
}

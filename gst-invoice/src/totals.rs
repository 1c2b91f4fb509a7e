//! Invoice totals: line amounts, discount, taxable value, GST split and grand total.
//!
//! Every amount is rounded with [`round_money`] as soon as it is final, and aggregates are sums
//! of those rounded values. Stored invoices depend on that order of operations, so the steps in
//! [`compute_invoice_totals`] must not be reordered or fused.

use bigdecimal::BigDecimal;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{Error, ErrorKind},
    gst::gst_split,
    money::{deserialize_bigdecimal, round_money, serialize_bigdecimal},
};

/// One line of an invoice as entered by the caller.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), pattern = "owned")]
pub struct LineItemInput {
    product_reference: String,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    quantity: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    unit_rate: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    gst_rate_percent: BigDecimal,
}

impl LineItemInput {
    pub fn product_reference(&self) -> &str {
        &self.product_reference
    }

    pub fn quantity(&self) -> &BigDecimal {
        &self.quantity
    }

    pub fn unit_rate(&self) -> &BigDecimal {
        &self.unit_rate
    }

    pub fn gst_rate_percent(&self) -> &BigDecimal {
        &self.gst_rate_percent
    }

    fn validate(&self) -> Result<(), Error> {
        let zero = BigDecimal::from(0);
        let reason = if self.quantity <= zero {
            format!("quantity {} must be greater than zero", self.quantity)
        } else if self.unit_rate < zero {
            format!("unit rate {} must not be negative", self.unit_rate)
        } else if self.gst_rate_percent < zero {
            format!("GST rate {}% must not be negative", self.gst_rate_percent)
        } else {
            return Ok(());
        };
        Err(Error::from(ErrorKind::InvalidLineItem(format!(
            "{}: {reason}",
            self.product_reference
        ))))
    }
}

/// Rounded amounts of a single line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemResult {
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    line_subtotal: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    line_tax: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    line_total: BigDecimal,
}

impl LineItemResult {
    /// `quantity * unit_rate`, rounded.
    pub fn line_subtotal(&self) -> &BigDecimal {
        &self.line_subtotal
    }

    /// GST on the rounded subtotal, rounded.
    pub fn line_tax(&self) -> &BigDecimal {
        &self.line_tax
    }

    pub fn line_total(&self) -> &BigDecimal {
        &self.line_total
    }
}

/// Everything needed to total an invoice.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), pattern = "owned")]
pub struct InvoiceTotalsInput {
    #[builder(default)]
    #[serde(default)]
    line_items: Vec<LineItemInput>,
    #[builder(default = BigDecimal::from(0))]
    #[serde(
        default,
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    discount_percent: BigDecimal,
    #[builder(default)]
    #[serde(default)]
    is_interstate: bool,
}

impl InvoiceTotalsInput {
    pub fn line_items(&self) -> &[LineItemInput] {
        &self.line_items
    }

    pub fn discount_percent(&self) -> &BigDecimal {
        &self.discount_percent
    }

    pub fn is_interstate(&self) -> bool {
        self.is_interstate
    }
}

impl InvoiceTotalsInputBuilder {
    /// Append a line to the builder's line items, keeping insertion order.
    ///
    /// # Example
    /// ```rust
    /// use gst_invoice::{InvoiceTotalsInputBuilder, LineItemInputBuilder};
    ///
    /// let line = LineItemInputBuilder::default()
    ///     .product_reference("TEA-250")
    ///     .quantity(2)
    ///     .unit_rate(100)
    ///     .gst_rate_percent(18)
    ///     .build()
    ///     .unwrap();
    /// let input = InvoiceTotalsInputBuilder::default().add_line(line).build().unwrap();
    /// assert_eq!(input.line_items().len(), 1);
    /// ```
    pub fn add_line(self, line: LineItemInput) -> Self {
        match self.line_items {
            Some(mut l) => {
                l.push(line);
                Self {
                    line_items: Some(l),
                    ..self
                }
            }
            None => Self {
                line_items: Some(vec![line]),
                ..self
            },
        }
    }
}

/// Rounded totals of a whole invoice.
///
/// `taxable_value == subtotal - discount_amount` and
/// `total == taxable_value + cgst + sgst + igst`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotalsResult {
    lines: Vec<LineItemResult>,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    subtotal: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    discount_amount: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    taxable_value: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    cgst: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    sgst: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    igst: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    total: BigDecimal,
}

impl InvoiceTotalsResult {
    /// Per-line amounts, in input order.
    pub fn lines(&self) -> &[LineItemResult] {
        &self.lines
    }

    pub fn subtotal(&self) -> &BigDecimal {
        &self.subtotal
    }

    pub fn discount_amount(&self) -> &BigDecimal {
        &self.discount_amount
    }

    pub fn taxable_value(&self) -> &BigDecimal {
        &self.taxable_value
    }

    pub fn cgst(&self) -> &BigDecimal {
        &self.cgst
    }

    pub fn sgst(&self) -> &BigDecimal {
        &self.sgst
    }

    pub fn igst(&self) -> &BigDecimal {
        &self.igst
    }

    /// `cgst + sgst + igst`.
    pub fn tax_total(&self) -> BigDecimal {
        &self.cgst + &self.sgst + &self.igst
    }

    pub fn total(&self) -> &BigDecimal {
        &self.total
    }
}

/// Compute the rounded amounts of one line.
///
/// # Errors
/// [`ErrorKind::InvalidLineItem`] if the quantity is not positive or a rate is negative.
pub fn compute_line(line: &LineItemInput) -> Result<LineItemResult, Error> {
    line.validate()?;
    Ok(line_amounts(line))
}

fn line_amounts(line: &LineItemInput) -> LineItemResult {
    let line_subtotal = round_money(&(&line.quantity * &line.unit_rate));
    let line_tax =
        round_money(&(&line_subtotal * &line.gst_rate_percent / BigDecimal::from(100)));
    let line_total = round_money(&(&line_subtotal + &line_tax));
    LineItemResult {
        line_subtotal,
        line_tax,
        line_total,
    }
}

/// Compute the totals of an invoice.
///
/// All lines are validated in order, then the discount, before anything is computed; the first
/// violation is returned and no partial result is produced. An invoice with no lines totals to
/// zero.
///
/// # Errors
/// - [`ErrorKind::InvalidLineItem`] for the first line with a non-positive quantity or a
///   negative rate
/// - [`ErrorKind::InvalidDiscount`] if the discount is outside `0..=100`
///
/// # Example
/// ```rust
/// use bigdecimal::BigDecimal;
/// use gst_invoice::{compute_invoice_totals, InvoiceTotalsInputBuilder, LineItemInputBuilder};
///
/// let input = InvoiceTotalsInputBuilder::default()
///     .add_line(
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
/// let totals = compute_invoice_totals(&input).unwrap();
/// assert_eq!(totals.cgst(), &BigDecimal::from(18));
/// assert_eq!(totals.total(), &BigDecimal::from(236));
/// ```
pub fn compute_invoice_totals(input: &InvoiceTotalsInput) -> Result<InvoiceTotalsResult, Error> {
    for line in &input.line_items {
        line.validate()?;
    }
    let hundred = BigDecimal::from(100);
    if input.discount_percent < BigDecimal::from(0) || input.discount_percent > hundred {
        return Err(Error::from(ErrorKind::InvalidDiscount(
            input.discount_percent.clone(),
        )));
    }

    let lines: Vec<LineItemResult> = input.line_items.iter().map(line_amounts).collect();
    let subtotal = lines
        .iter()
        .fold(round_money(&BigDecimal::from(0)), |acc, l| acc + &l.line_subtotal);
    let tax_total = lines
        .iter()
        .fold(round_money(&BigDecimal::from(0)), |acc, l| acc + &l.line_tax);

    let discount_amount = round_money(&(&subtotal * &input.discount_percent / &hundred));
    let taxable_value = round_money(&(&subtotal - &discount_amount));
    let split = gst_split(input.is_interstate, &tax_total);
    let total = round_money(&(&taxable_value + &split.total()));

    debug!(
        lines = lines.len(),
        subtotal = %subtotal,
        tax = %tax_total,
        total = %total,
        interstate = input.is_interstate,
        "computed invoice totals"
    );

    Ok(InvoiceTotalsResult {
        lines,
        subtotal,
        discount_amount,
        taxable_value,
        cgst: split.cgst,
        sgst: split.sgst,
        igst: split.igst,
        total,
    })
}

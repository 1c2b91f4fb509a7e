//! Splitting an invoice's tax between central, state and integrated GST.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::money::{deserialize_bigdecimal, round_money, serialize_bigdecimal};

/// The three GST components of an invoice. Intrastate supplies carry CGST and SGST, interstate
/// supplies carry IGST only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GstSplit {
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    pub cgst: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    pub sgst: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    pub igst: BigDecimal,
}

impl GstSplit {
    /// Sum of the three components.
    pub fn total(&self) -> BigDecimal {
        &self.cgst + &self.sgst + &self.igst
    }
}

/// Split `tax_total` into its GST components.
///
/// Interstate: everything goes to IGST. Intrastate: each half is rounded on its own, so for an
/// odd paisa total `cgst + sgst` can be one paisa more than the rounded total.
///
/// # Example
/// ```rust
/// use bigdecimal::BigDecimal;
/// use gst_invoice::gst_split;
///
/// let split = gst_split(false, &BigDecimal::from(36));
/// assert_eq!(split.cgst, BigDecimal::from(18));
/// assert_eq!(split.sgst, BigDecimal::from(18));
/// assert_eq!(split.igst, BigDecimal::from(0));
/// ```
pub fn gst_split(is_interstate: bool, tax_total: &BigDecimal) -> GstSplit {
    let zero = round_money(&BigDecimal::from(0));
    if is_interstate {
        GstSplit {
            cgst: zero.clone(),
            sgst: zero,
            igst: round_money(tax_total),
        }
    } else {
        let half = round_money(&(tax_total / BigDecimal::from(2)));
        GstSplit {
            cgst: half.clone(),
            sgst: half,
            igst: zero,
        }
    }
}

/// Whether a supply between the two state codes is interstate. Codes are compared ignoring case
/// and surrounding whitespace.
pub fn is_interstate(seller_state: &str, buyer_state: &str) -> bool {
    !seller_state
        .trim()
        .eq_ignore_ascii_case(buyer_state.trim())
}

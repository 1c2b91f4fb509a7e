//! Sequential invoice numbers of the form `{prefix}{separator}{zero padded sequence}`.
//!
//! The generator never reads state of its own: callers pass the last number issued under the
//! prefix and are responsible for serializing issuance per prefix.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, ErrorKind};

/// Separator placed between prefix and sequence.
pub const DEFAULT_SEPARATOR: &str = "-";
/// Minimum number of digits in the sequence part.
pub const DEFAULT_WIDTH: usize = 4;
/// Prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "SP-25";

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

fn default_width() -> usize {
    DEFAULT_WIDTH
}

/// How invoice numbers for one prefix are rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberFormat {
    prefix: String,
    #[serde(default = "default_separator")]
    separator: String,
    #[serde(default = "default_width")]
    width: usize,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl NumberFormat {
    /// Format with the default separator and width.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: default_separator(),
            width: DEFAULT_WIDTH,
        }
    }

    pub fn with_separator(self, separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            ..self
        }
    }

    pub fn with_width(self, width: usize) -> Self {
        Self { width, ..self }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether `number` belongs to this format's series, i.e. starts with prefix and separator.
    /// The suffix is not checked, so a damaged number still counts and fails in [`Self::next`].
    pub fn owns(&self, number: &str) -> bool {
        number
            .strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.starts_with(self.separator.as_str()))
    }

    fn render(&self, sequence: u64, width: usize) -> String {
        format!(
            "{}{}{:0>width$}",
            self.prefix,
            self.separator,
            sequence,
            width = width
        )
    }

    /// Extract the sequence value and its digit count from an issued number.
    ///
    /// # Errors
    /// [`ErrorKind::InvalidPreviousNumber`] unless `number` is exactly prefix, separator and a
    /// run of ASCII digits that fits in a `u64`.
    pub fn parse_sequence(&self, number: &str) -> Result<(u64, usize), Error> {
        let invalid = || Error::from(ErrorKind::InvalidPreviousNumber(number.to_string()));
        let digits = number
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix(self.separator.as_str()))
            .ok_or_else(invalid)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let sequence = digits.parse::<u64>().map_err(|_| invalid())?;
        Ok((sequence, digits.len()))
    }

    /// The number following `last_number`, or the first number of the sequence if nothing has
    /// been issued yet. The previous suffix width is kept; it only grows when the sequence
    /// needs more digits.
    ///
    /// # Errors
    /// [`ErrorKind::InvalidPreviousNumber`] if `last_number` does not belong to this format or
    /// the sequence cannot be incremented.
    ///
    /// # Example
    /// ```rust
    /// use gst_invoice::NumberFormat;
    ///
    /// let format = NumberFormat::new("INV").with_separator("/").with_width(3);
    /// assert_eq!(format.next(None).unwrap(), "INV/001");
    /// assert_eq!(format.next(Some("INV/041")).unwrap(), "INV/042");
    /// ```
    pub fn next(&self, last_number: Option<&str>) -> Result<String, Error> {
        let next = match last_number {
            None => self.render(1, self.width),
            Some(last) => {
                let (sequence, width) = self.parse_sequence(last)?;
                let sequence = sequence.checked_add(1).ok_or_else(|| {
                    Error::from(ErrorKind::InvalidPreviousNumber(last.to_string()))
                })?;
                self.render(sequence, width)
            }
        };
        debug!(
            prefix = %self.prefix,
            previous = ?last_number,
            next = %next,
            "generated invoice number"
        );
        Ok(next)
    }
}

/// Next invoice number for `prefix` using the default separator and width.
///
/// # Example
/// ```rust
/// use gst_invoice::next_invoice_number;
///
/// let first = next_invoice_number("SP-2025", None).unwrap();
/// assert_eq!(first, "SP-2025-0001");
/// assert_eq!(next_invoice_number("SP-2025", Some(&first)).unwrap(), "SP-2025-0002");
/// ```
pub fn next_invoice_number(prefix: &str, last_number: Option<&str>) -> Result<String, Error> {
    NumberFormat::new(prefix).next(last_number)
}

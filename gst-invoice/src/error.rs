use std::fmt::{Debug, Display};

use bigdecimal::BigDecimal;
use tracing::warn;

pub struct Error {
    kind: ErrorKind,
    context: Vec<String>,
}

pub enum ErrorKind {
    /// Non-positive quantity, negative unit rate or negative GST rate.
    InvalidLineItem(String),
    /// Discount percentage outside `0..=100`.
    InvalidDiscount(BigDecimal),
    /// The last issued number does not have the shape `prefix + separator + digits`.
    InvalidPreviousNumber(String),
    NonFiniteAmount(f64),
    UnknownProduct(String),
    InsufficientStock {
        product: String,
        requested: BigDecimal,
        available: BigDecimal,
    },
    MissingField(&'static str),
    Io(std::io::Error),
    Json(serde_json::Error),
    Template(minijinja::Error),
    FantocciniNewSession(fantoccini::error::NewSessionError),
    FantocciniCmdError(fantoccini::error::CmdError),
    FantocciniPrintError(fantoccini::error::PrintConfigurationError),
    Other(String),
}

pub trait AddContext<T> {
    fn add_context(self, ctx: &str) -> Result<T, Error>;
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidLineItem(reason) => write!(f, "invalid line item: {reason}"),
            ErrorKind::InvalidDiscount(percent) => {
                write!(f, "discount of {percent}% is outside 0 to 100")
            }
            ErrorKind::InvalidPreviousNumber(number) => {
                write!(f, "previous invoice number '{number}' does not match the format")
            }
            ErrorKind::NonFiniteAmount(amount) => write!(f, "amount {amount} is not finite"),
            ErrorKind::UnknownProduct(reference) => write!(f, "unknown product '{reference}'"),
            ErrorKind::InsufficientStock {
                product,
                requested,
                available,
            } => write!(
                f,
                "insufficient stock for '{product}': requested {requested}, available {available}"
            ),
            ErrorKind::MissingField(field) => write!(f, "missing required field '{field}'"),
            ErrorKind::Io(e) => write!(f, "{e:?}"),
            ErrorKind::Json(e) => write!(f, "{e:?}"),
            ErrorKind::Template(e) => write!(f, "{e:?}"),
            ErrorKind::FantocciniNewSession(e) => write!(f, "{e:?}"),
            ErrorKind::FantocciniCmdError(e) => write!(f, "{e:?}"),
            ErrorKind::FantocciniPrintError(e) => write!(f, "{e:?}"),
            ErrorKind::Other(message) => write!(f, "{message}"),
        }
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut context = self.context.clone();
        context.reverse();
        let context = if context.is_empty() {
            String::from("no context")
        } else {
            context.join(" -> ")
        };
        write!(f, "{context}")
    }
}

impl std::error::Error for Error {}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            context: vec![kind.to_string()],
            kind,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::from(ErrorKind::Io(value))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::from(ErrorKind::Json(value))
    }
}

impl From<minijinja::Error> for Error {
    fn from(value: minijinja::Error) -> Self {
        Error::from(ErrorKind::Template(value))
    }
}

impl From<fantoccini::error::PrintConfigurationError> for Error {
    fn from(value: fantoccini::error::PrintConfigurationError) -> Self {
        Error::from(ErrorKind::FantocciniPrintError(value))
    }
}

impl From<fantoccini::error::NewSessionError> for Error {
    fn from(value: fantoccini::error::NewSessionError) -> Self {
        Error::from(ErrorKind::FantocciniNewSession(value))
    }
}

impl From<fantoccini::error::CmdError> for Error {
    fn from(value: fantoccini::error::CmdError) -> Self {
        Error::from(ErrorKind::FantocciniCmdError(value))
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::from(ErrorKind::Other(value))
    }
}

impl Error {
    /// Add more context to the given error. This context will ultimately be displayed to the user
    /// and could be useful for correcting bad input or filing a help ticket.
    ///
    /// Generally a single layer of context should be added for every level that an error is
    /// surfaced. If the error is surfaced all the way to main and not handled there, then all the
    /// context will be displayed to the user in reverse order
    ///
    /// # Arguments
    /// * `context` - Any additional information that would be useful for the user to see if the
    /// error is surfaced to them
    pub fn add_context(self, context: &str) -> Error {
        let mut existing = self.context;
        existing.push(context.to_string());
        Self {
            context: existing,
            ..self
        }
    }

    /// The underlying cause, for callers that translate errors into their own messages.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl<T> AddContext<T> for Result<T, Error> {
    fn add_context(self, ctx: &str) -> Result<T, Error> {
        match self {
            Ok(d) => Ok(d),
            Err(e) => Err(e.add_context(ctx)),
        }
    }
}

/// Combine the outcome of some work with the outcome of the cleanup that ran after it.
///
/// The work's error wins; a cleanup error is only returned when the work succeeded, and is
/// logged otherwise.
pub fn with_cleanup<T>(result: Result<T, Error>, cleanup: Result<(), Error>) -> Result<T, Error> {
    match (result, cleanup) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(cleanup_err)) => Err(cleanup_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(cleanup_err)) => {
            warn!(error = %cleanup_err, "cleanup failed after an earlier error");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_displayed_outermost_first() {
        let err = Error::from(ErrorKind::MissingField("number"))
            .add_context("building invoice")
            .add_context("issuing invoice");
        assert_eq!(
            err.to_string(),
            "issuing invoice -> building invoice -> missing required field 'number'"
        );
        assert!(matches!(err.kind(), ErrorKind::MissingField("number")));
    }

    #[test]
    fn add_context_leaves_ok_untouched() {
        let ok: Result<u8, Error> = Ok(3);
        assert_eq!(ok.add_context("unused").unwrap(), 3);
    }

    #[test]
    fn with_cleanup_keeps_the_first_error() {
        let work: Result<u8, Error> = Err(Error::from(String::from("printing failed")));
        let cleanup = Err(Error::from(String::from("closing failed")));
        let err = with_cleanup(work, cleanup).unwrap_err();
        assert_eq!(err.to_string(), "printing failed");

        let err = with_cleanup(Ok(1u8), Err(Error::from(String::from("closing failed"))))
            .unwrap_err();
        assert_eq!(err.to_string(), "closing failed");

        assert_eq!(with_cleanup(Ok(1u8), Ok(())).unwrap(), 1);
    }
}

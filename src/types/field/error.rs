//! Error type for converting payload fields into typed attributes.

use std::{
    error::Error,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// A payload field couldn't be converted into its attribute.
#[derive(Debug)]
pub struct FieldError {
    /// Wire key the error occurred on.
    key: &'static str,
    /// Type of error that occurred.
    kind: FieldErrorType,
    /// Source of the error, if there is any.
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl FieldError {
    /// Wire key of the field that failed to convert.
    pub const fn key(&self) -> &'static str {
        self.key
    }

    /// Immutable reference to the type of error that occurred.
    #[must_use = "retrieving the type has no effect if left unused"]
    pub const fn kind(&self) -> &FieldErrorType {
        &self.kind
    }

    /// Consume the error, returning the source error if there is any.
    #[must_use = "consuming the error and retrieving the source has no effect if left unused"]
    pub fn into_source(self) -> Option<Box<dyn Error + Send + Sync>> {
        self.source
    }

    /// Consume the error, returning the owned error type and the source error.
    #[must_use = "consuming the error into its parts has no effect if left unused"]
    pub fn into_parts(self) -> (FieldErrorType, Option<Box<dyn Error + Send + Sync>>) {
        (self.kind, self.source)
    }

    pub(crate) const fn type_mismatch(key: &'static str, expected: &'static str) -> Self {
        Self {
            key,
            kind: FieldErrorType::Type { expected },
            source: None,
        }
    }

    pub(crate) const fn range(key: &'static str) -> Self {
        Self {
            key,
            kind: FieldErrorType::Range,
            source: None,
        }
    }

    pub(crate) const fn length(key: &'static str, max: usize, len: usize) -> Self {
        Self {
            key,
            kind: FieldErrorType::Length { max, len },
            source: None,
        }
    }

    pub(crate) const fn missing(key: &'static str) -> Self {
        Self {
            key,
            kind: FieldErrorType::Missing,
            source: None,
        }
    }

    pub(crate) fn format(key: &'static str, source: impl Error + Send + Sync + 'static) -> Self {
        Self {
            key,
            kind: FieldErrorType::Format,
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn snapshot(key: &'static str, source: impl Error + Send + Sync + 'static) -> Self {
        Self {
            key,
            kind: FieldErrorType::Snapshot,
            source: Some(Box::new(source)),
        }
    }

    /// Attach a source error, used when an identifier fails to parse.
    pub(crate) fn with_source(mut self, source: impl Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("field `")?;
        f.write_str(self.key)?;
        f.write_str("` ")?;

        match &self.kind {
            FieldErrorType::Type { expected } => {
                f.write_str("expected ")?;
                f.write_str(expected)
            }
            FieldErrorType::Range => f.write_str("is out of the accepted range"),
            FieldErrorType::Length { max, len } => {
                write!(f, "is {len} characters long, at most {max} are allowed")
            }
            FieldErrorType::Format => f.write_str("is not in the expected format"),
            FieldErrorType::Missing => f.write_str("is required but missing"),
            FieldErrorType::Snapshot => f.write_str("could not be captured as a prior value"),
        }
    }
}

impl Error for FieldError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn Error + 'static))
    }
}

/// Type of [`FieldError`] that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorType {
    /// Value is of the wrong JSON kind.
    Type {
        /// Description of what was expected.
        expected: &'static str,
    },
    /// Numeric value is outside of the accepted range.
    Range,
    /// String value is longer than the documented maximum.
    Length {
        /// Maximum accepted length in characters.
        max: usize,
        /// Length of the received value.
        len: usize,
    },
    /// String value is not in the expected textual format.
    Format,
    /// A required key is absent.
    Missing,
    /// The prior value of a changed attribute could not be captured.
    Snapshot,
}

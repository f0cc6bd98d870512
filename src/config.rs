//! Environment configuration for the replay binary.

use std::{
    env,
    error::Error,
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

use crate::types::id::{marker::UserMarker, Id};

/// Path of a newline-delimited gateway payload file. Stdin when unset.
pub const INPUT_VAR: &str = "CACHE_REPLAY_INPUT";

/// ID of the connected user, for indexing private channels before READY.
pub const CURRENT_USER_VAR: &str = "CACHE_CURRENT_USER_ID";

/// Settings of a cache replay run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReplayConfig {
    pub input: Option<PathBuf>,
    pub current_user: Option<Id<UserMarker>>,
}

impl ReplayConfig {
    /// Read the configuration from the process environment, after loading a
    /// `.env` file if there is one.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        #[cfg(feature = "io")]
        dotenv::dotenv().ok();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read the configuration through a variable lookup function. Empty
    /// values count as unset.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a variable is set to an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name| lookup(name).filter(|value| !value.trim().is_empty());

        let input = var(INPUT_VAR).map(PathBuf::from);

        let current_user = match var(CURRENT_USER_VAR) {
            Some(raw) => Some(raw.trim().parse().map_err(|source| ConfigError {
                kind: ConfigErrorType::InvalidCurrentUser { value: raw.clone() },
                source: Some(Box::new(source)),
            })?),
            None => None,
        };

        Ok(Self {
            input,
            current_user,
        })
    }
}

/// Configuration could not be read.
#[derive(Debug)]
pub struct ConfigError {
    kind: ConfigErrorType,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl ConfigError {
    /// Immutable reference to the type of error that occurred.
    #[must_use = "retrieving the type has no effect if left unused"]
    pub const fn kind(&self) -> &ConfigErrorType {
        &self.kind
    }

    /// Consume the error, returning the source error if there is any.
    #[must_use = "consuming the error and retrieving the source has no effect if left unused"]
    pub fn into_source(self) -> Option<Box<dyn Error + Send + Sync>> {
        self.source
    }

    /// Consume the error, returning the owned error type and the source error.
    #[must_use = "consuming the error into its parts has no effect if left unused"]
    pub fn into_parts(self) -> (ConfigErrorType, Option<Box<dyn Error + Send + Sync>>) {
        (self.kind, self.source)
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.kind {
            ConfigErrorType::InvalidCurrentUser { value } => {
                write!(f, "{CURRENT_USER_VAR} is not a valid user id: {value:?}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn Error + 'static))
    }
}

/// Type of [`ConfigError`] that occurred.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ConfigErrorType {
    /// The current user variable isn't a snowflake.
    InvalidCurrentUser { value: String },
}

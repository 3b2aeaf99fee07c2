use std::fmt;
use std::time::Duration;

// ============================================================================
// Supervisor Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("factory {factory:?} failed to create its consumers: {source}")]
    FactoryCreation {
        factory: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("factory {factory:?} failed to recreate consumer {consumer:?}: {source}")]
    ConsumerCreation {
        factory: String,
        consumer: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("factory {factory:?} for consumer {consumer:?} is no longer registered")]
    MissingFactory { factory: String, consumer: String },

    #[error("failed to kill consumer {consumer:?}: {source}")]
    Kill {
        consumer: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("consumer {consumer:?} did not stop within {timeout:?}")]
    KillTimeout { consumer: String, timeout: Duration },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("manager is no longer accepting commands")]
    ManagerUnavailable,

    #[error("metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),
}

// ============================================================================
// MultiError
// ============================================================================
//
// Ordered collection of failures. An empty aggregate means "no error":
// callers go through `into_result`, which never yields an empty `Err`.
//
// ============================================================================

#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<SupervisorError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: SupervisorError) {
        self.errors.push(error);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SupervisorError> {
        self.errors.iter()
    }

    /// `Ok(())` when nothing was collected, otherwise the aggregate itself.
    pub fn into_result(self) -> Result<(), MultiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

impl From<Vec<SupervisorError>> for MultiError {
    fn from(errors: Vec<SupervisorError>) -> Self {
        Self { errors }
    }
}

impl From<SupervisorError> for MultiError {
    fn from(error: SupervisorError) -> Self {
        Self { errors: vec![error] }
    }
}

impl FromIterator<SupervisorError> for MultiError {
    fn from_iter<I: IntoIterator<Item = SupervisorError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for MultiError {
    type Item = SupervisorError;
    type IntoIter = std::vec::IntoIter<SupervisorError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a MultiError {
    type Item = &'a SupervisorError;
    type IntoIter = std::slice::Iter<'a, SupervisorError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

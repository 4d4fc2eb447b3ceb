use std::fmt;

use crate::finalize::Phase;

#[derive(Debug)]
pub enum ReportError {
    InvalidConfiguration {
        field: &'static str,
        message: String,
    },
    Asset(String),
    MissingField {
        row: usize,
        field: String,
    },
    /// A lifecycle call arrived in a phase that does not accept it. This is a
    /// caller bug, never a transient condition.
    StateViolation {
        phase: Phase,
        page: Option<usize>,
        message: String,
    },
    UnplaceableFlowable(String),
    Encoder(String),
    Io(std::io::Error),
}

impl ReportError {
    pub(crate) fn config(field: &'static str, message: impl Into<String>) -> Self {
        ReportError::InvalidConfiguration {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn state(phase: Phase, page: Option<usize>, message: impl Into<String>) -> Self {
        ReportError::StateViolation {
            phase,
            page,
            message: message.into(),
        }
    }

    pub fn is_state_violation(&self) -> bool {
        matches!(self, ReportError::StateViolation { .. })
    }
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::InvalidConfiguration { field, message } => {
                write!(f, "invalid configuration ({}): {}", field, message)
            }
            ReportError::Asset(message) => write!(f, "asset error: {}", message),
            ReportError::MissingField { row, field } => {
                write!(f, "row {} has no value for field '{}'", row, field)
            }
            ReportError::StateViolation {
                phase,
                page: Some(page),
                message,
            } => write!(
                f,
                "state violation in {} phase at page {}: {}",
                phase.as_str(),
                page,
                message
            ),
            ReportError::StateViolation {
                phase,
                page: None,
                message,
            } => write!(f, "state violation in {} phase: {}", phase.as_str(), message),
            ReportError::UnplaceableFlowable(message) => {
                write!(f, "flowable cannot fit on any page: {}", message)
            }
            ReportError::Encoder(message) => write!(f, "encoder error: {}", message),
            ReportError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ReportError {
    fn from(value: std::io::Error) -> Self {
        ReportError::Io(value)
    }
}

use thiserror::Error;

use crate::domain::hours::{Hours, ParseHoursError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    InvalidHours(#[from] ParseHoursError),
    #[error("hours value {hours} is outside the accepted range {min}..={max}")]
    HoursOutOfRange { hours: Hours, min: Hours, max: Hours },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
}

impl ApplicationError {
    /// User-caused failures; the user has been told how to correct them and
    /// the unit of work can simply be retried by the user.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Domain(_))
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Domain(_) => "invalid_input",
            Self::Persistence(_) => "store_failure",
            Self::Integration(_) => "transport_failure",
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

/// Failure as shown to a chat user. Internal detail stays in `message` and is
/// only logged.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "That input could not be used. Check it and try again.",
            Self::ServiceUnavailable { .. } => {
                "Something went wrong on my side. Please try again shortly."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::hours::{Hours, ParseHoursError};
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn parse_errors_are_recoverable_domain_errors() {
        let error = ApplicationError::from(DomainError::from(ParseHoursError::Empty));

        assert!(error.is_recoverable());
        assert_eq!(error.error_class(), "invalid_input");
    }

    #[test]
    fn store_and_transport_errors_are_unit_failures() {
        let store = ApplicationError::Persistence("database is locked".to_owned());
        let transport = ApplicationError::Integration("send failed".to_owned());

        assert!(!store.is_recoverable());
        assert_eq!(store.error_class(), "store_failure");
        assert!(!transport.is_recoverable());
        assert_eq!(transport.error_class(), "transport_failure");
    }

    #[test]
    fn out_of_range_message_names_the_bounds() {
        let error = DomainError::HoursOutOfRange {
            hours: Hours::parse("200").expect("hours"),
            min: Hours::parse("0").expect("hours"),
            max: Hours::parse("168").expect("hours"),
        };

        assert_eq!(
            error.to_string(),
            "hours value 200.0 is outside the accepted range 0.0..=168.0"
        );
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable_with_correlation() {
        let interface =
            ApplicationError::Persistence("disk I/O error".to_owned()).into_interface("env-7");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "env-7");
        assert!(!interface.user_message().contains("disk"));
    }
}

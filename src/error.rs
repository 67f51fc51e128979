//! Error taxonomy for the driver.

use std::time::Duration;

/// Errors raised by the driver.
///
/// Library functions return `eyre::Result`; every failure that originates in
/// the driver wraps one of these, so callers can recover the variant with
/// `report.downcast_ref::<DriverError>()`.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverError {
    /// Network or connection failure.
    Transport(String),
    /// The server did not answer within the configured timeout.
    Timeout(Duration),
    /// Connect was answered with something other than 204.
    Credential { status: u16 },
    /// The server answered, but not in a way the driver can use.
    UnexpectedResponse(String),
    /// The server reported `errors[0]` for a command.
    Command {
        command: String,
        reason: String,
        content: String,
    },
    /// The response body matched neither recognised JSON shape.
    Decode { message: String, body: String },
    /// A property exists but holds a value of another shape.
    TypeMismatch { property: String, expected: &'static str },
    /// A property is absent.
    MissingProperty(String),
    /// Bad arguments passed to a setter.
    Argument(String),
    /// The entity has never been persisted.
    MissingRid(String),
}

impl DriverError {
    /// Build a decode error carrying the offending body.
    pub fn decode(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
            body: body.into(),
        }
    }
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverError::Transport(msg) => write!(f, "transport error: {}", msg),
            DriverError::Timeout(after) => write!(f, "request timed out after {:?}", after),
            DriverError::Credential { status } => {
                write!(f, "connect returned HTTP status {}, perhaps wrong credentials", status)
            }
            DriverError::UnexpectedResponse(msg) => write!(f, "unexpected response: {}", msg),
            DriverError::Command {
                command,
                reason,
                content,
            } => write!(
                f,
                "command {:?} failed, server error reason: {}; content: {:?}",
                command, reason, content
            ),
            DriverError::Decode { message, body } => {
                write!(f, "cannot decode response ({}), response body: {}", message, body)
            }
            DriverError::TypeMismatch { property, expected } => {
                write!(f, "property '{}' is not of type {}", property, expected)
            }
            DriverError::MissingProperty(name) => write!(f, "property '{}' is not present", name),
            DriverError::Argument(msg) => write!(f, "invalid arguments: {}", msg),
            DriverError::MissingRid(msg) => write!(f, "missing RID: {}", msg),
        }
    }
}

impl std::error::Error for DriverError {}

/// Recover the driver error carried by a report, if any.
pub fn driver_error(report: &eyre::Report) -> Option<&DriverError> {
    report.downcast_ref::<DriverError>()
}

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Operation codes a notification exists for.
///
/// Parsing is case-insensitive: `"create"`, `"Create"` and `"CREATE"` are
/// all [`Operation::Create`]. The canonical wire form is upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, AsRefStr, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Operation {
    Create,
    Delete,
}

/// A user lifecycle event as carried on the `user-events` stream.
///
/// `operation` stays a plain string on the wire so producers can introduce
/// new operation codes without breaking older consumers; interpreting it is
/// up to the receiver (see [`UserEvent::parse_operation`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEvent {
    pub operation: String,
    pub email: String,
}

impl UserEvent {
    pub fn new(operation: Operation, email: impl Into<String>) -> Self {
        Self {
            operation: operation.to_string(),
            email: email.into(),
        }
    }

    pub fn created(email: impl Into<String>) -> Self {
        Self::new(Operation::Create, email)
    }

    pub fn deleted(email: impl Into<String>) -> Self {
        Self::new(Operation::Delete, email)
    }

    /// The operation as a known code, if it is one.
    pub fn parse_operation(&self) -> Result<Operation, strum::ParseError> {
        self.operation.parse()
    }
}

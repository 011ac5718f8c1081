//! User Events Domain
//!
//! The contract between the user store (producer) and the notification
//! worker (consumer):
//!
//! - [`UserEvent`]: the `{operation, email}` envelope
//! - [`Operation`]: the operation codes notifications are defined for
//! - [`codec`]: wire encoding of events (JSON object)
//! - [`UserEventStream`]: the `user-events` stream and its consumer group

pub mod codec;
pub mod error;
pub mod models;
pub mod streams;

pub use codec::{decode, encode};
pub use error::CodecError;
pub use models::{Operation, UserEvent};
pub use streams::UserEventStream;

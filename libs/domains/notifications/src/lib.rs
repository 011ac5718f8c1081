//! Notifications Domain
//!
//! Turns user lifecycle events into emails.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   Redis Stream  │  ← user-events, notification-group
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │ UserEventProc.  │  ← decode, report and drop bad entries
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │   Dispatcher    │  ← operation → template
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │ Email Provider  │  ← SMTP (lettre), capturing mock
//! └─────────────────┘
//! ```

pub mod dispatcher;
pub mod error;
pub mod processor;
pub mod providers;
pub mod templates;

pub use dispatcher::NotificationDispatcher;
pub use error::{NotificationError, NotificationResult};
pub use processor::UserEventProcessor;
pub use providers::{
    EmailContent, EmailProvider, MockSmtpProvider, SentEmail, SmtpConfig, SmtpProvider,
};
pub use templates::{RenderedEmail, TemplateEngine};

//! Users Domain
//!
//! The user store and the producer side of user lifecycle events.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Service   │  ← Validation, CRUD, publish after commit
//! └──┬───────┬──┘
//!    │       │
//! ┌──▼────┐ ┌▼──────────┐
//! │ Repo  │ │ Publisher │  ← `user-events` stream
//! └──┬────┘ └───────────┘
//!    │
//! ┌──▼──────────┐
//! │   Models    │  ← Entities, input DTO
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_users::{InMemoryUserRepository, StreamEventPublisher, UserInput, UserService};
//!
//! let publisher = Arc::new(StreamEventPublisher::new(broker));
//! let service = UserService::new(InMemoryUserRepository::new(), publisher);
//!
//! let ann = service.create_user(UserInput::new("Ann", "ann@x.com", 30)).await?;
//! ```

pub mod error;
pub mod models;
mod postgres_repository_impl;
pub mod publisher;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use error::{UserError, UserResult};
pub use models::{NewUser, User, UserInput};
pub use postgres_repository_impl::PostgresUserRepository;
pub use publisher::{DeliveryError, EventPublisher, StreamEventPublisher};
pub use repository::{InMemoryUserRepository, UserRepository};
pub use service::UserService;

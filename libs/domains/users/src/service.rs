use metrics::counter;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{UserError, UserResult};
use crate::models::{NewUser, User, UserInput};
use crate::publisher::EventPublisher;
use crate::repository::UserRepository;
use domain_user_events::Operation;

/// Service layer for User business logic
///
/// Create and delete publish a `UserEvent` once the store write has returned.
/// A failed publish is logged and counted; the store result stands.
#[derive(Clone)]
pub struct UserService<R: UserRepository> {
    repository: Arc<R>,
    publisher: Arc<dyn EventPublisher>,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repository: R, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            repository: Arc::new(repository),
            publisher,
        }
    }

    /// Create a new user
    pub async fn create_user(&self, input: UserInput) -> UserResult<User> {
        let new_user = NewUser::try_from(input)?;

        if self.repository.email_exists(&new_user.email, None).await? {
            return Err(UserError::DuplicateEmail(new_user.email));
        }

        let created = self.repository.create(new_user).await?;

        self.publish(Operation::Create, &created.email).await;
        Ok(created)
    }

    /// Get a user by ID
    pub async fn get_user(&self, id: Uuid) -> UserResult<Option<User>> {
        self.repository.get_by_id(id).await
    }

    /// List all users
    pub async fn list_users(&self) -> UserResult<Vec<User>> {
        self.repository.list().await
    }

    /// Update name, email and age. Does not publish.
    pub async fn update_user(&self, id: Uuid, input: UserInput) -> UserResult<User> {
        let changes = NewUser::try_from(input)?;

        let mut user = self
            .repository
            .get_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id))?;

        if self.repository.email_exists(&changes.email, Some(id)).await? {
            return Err(UserError::DuplicateEmail(changes.email));
        }

        user.apply(changes);
        self.repository.update(user).await
    }

    /// Delete a user. Deleting an absent user is a no-op and publishes nothing.
    pub async fn delete_user(&self, id: Uuid) -> UserResult<()> {
        let Some(user) = self.repository.get_by_id(id).await? else {
            tracing::debug!(user_id = %id, "Delete of absent user ignored");
            return Ok(());
        };

        // A concurrent delete may have won; only the one that removed the row publishes
        if self.repository.delete(id).await? {
            self.publish(Operation::Delete, &user.email).await;
        }

        Ok(())
    }

    async fn publish(&self, operation: Operation, email: &str) {
        if let Err(e) = self.publisher.publish(operation, email).await {
            counter!(
                "user_events_publish_failures_total",
                "operation" => operation.to_string()
            )
            .increment(1);
            tracing::warn!(
                operation = %operation,
                email = %email,
                error = %e,
                "User event not published; store change kept"
            );
        }
    }
}

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{UserError, UserResult};
use crate::models::{NewUser, User};

/// Repository trait for User persistence
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a new user, assigning its `id` and `created_at`
    async fn create(&self, user: NewUser) -> UserResult<User>;

    /// Get a user by ID
    async fn get_by_id(&self, id: Uuid) -> UserResult<Option<User>>;

    /// List all users (no particular order)
    async fn list(&self) -> UserResult<Vec<User>>;

    /// Overwrite name, email and age of an existing user
    async fn update(&self, user: User) -> UserResult<User>;

    /// Delete a user by ID. Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> UserResult<bool>;

    /// Check if an email is taken, optionally ignoring one user
    async fn email_exists(&self, email: &str, excluding: Option<Uuid>) -> UserResult<bool>;
}

/// In-memory implementation of UserRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

fn email_taken(users: &HashMap<Uuid, User>, email: &str, excluding: Option<Uuid>) -> bool {
    users
        .values()
        .any(|u| Some(u.id) != excluding && u.email.to_lowercase() == email.to_lowercase())
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: NewUser) -> UserResult<User> {
        let mut users = self.users.write().await;

        if email_taken(&users, &user.email, None) {
            return Err(UserError::DuplicateEmail(user.email));
        }

        let user = User {
            id: Uuid::now_v7(),
            name: user.name,
            email: user.email,
            age: user.age,
            created_at: Utc::now(),
        };
        users.insert(user.id, user.clone());

        tracing::info!(user_id = %user.id, email = %user.email, "Created user");
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn list(&self) -> UserResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(users.values().cloned().collect())
    }

    async fn update(&self, user: User) -> UserResult<User> {
        let mut users = self.users.write().await;

        let Some(existing) = users.get(&user.id) else {
            return Err(UserError::NotFound(user.id));
        };

        if email_taken(&users, &user.email, Some(user.id)) {
            return Err(UserError::DuplicateEmail(user.email));
        }

        // created_at belongs to the stored row, not the caller
        let user = User {
            created_at: existing.created_at,
            ..user
        };
        users.insert(user.id, user.clone());

        tracing::info!(user_id = %user.id, "Updated user");
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> UserResult<bool> {
        let mut users = self.users.write().await;

        if users.remove(&id).is_some() {
            tracing::info!(user_id = %id, "Deleted user");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn email_exists(&self, email: &str, excluding: Option<Uuid>) -> UserResult<bool> {
        let users = self.users.read().await;
        Ok(email_taken(&users, email, excluding))
    }
}

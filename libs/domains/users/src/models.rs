use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// User entity - matches SQL schema
///
/// Only the store constructs these: `id` and `created_at` are assigned once,
/// on first persistence, and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Email address (unique, case-insensitive)
    pub email: String,
    /// Age in years
    pub age: i32,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Overwrite the mutable fields. `id` and `created_at` are kept.
    pub fn apply(&mut self, user: NewUser) {
        self.name = user.name;
        self.email = user.email;
        self.age = user.age;
    }
}

/// A validated user that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub age: i32,
}

/// Create/update input
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserInput {
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    #[validate(contains(pattern = "@", message = "email must contain '@'"))]
    pub email: String,
    #[validate(
        required(message = "age is required"),
        range(min = 0, message = "age must not be negative")
    )]
    pub age: Option<i32>,
}

impl UserInput {
    pub fn new(name: impl Into<String>, email: impl Into<String>, age: i32) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            age: Some(age),
        }
    }
}

impl TryFrom<UserInput> for NewUser {
    type Error = validator::ValidationErrors;

    fn try_from(input: UserInput) -> Result<Self, Self::Error> {
        input.validate()?;

        match input.age {
            Some(age) => Ok(NewUser {
                name: input.name,
                email: input.email,
                age,
            }),
            None => {
                let mut errors = validator::ValidationErrors::new();
                errors.add("age", ValidationError::new("required"));
                Err(errors)
            }
        }
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some("name must not be blank".into());
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_input() {
        let user = NewUser::try_from(UserInput::new("Ann", "ann@x.com", 0)).unwrap();
        assert_eq!(user.name, "Ann");
        assert_eq!(user.age, 0);
    }

    #[test]
    fn test_blank_name_rejected() {
        let errors = NewUser::try_from(UserInput::new("   ", "ann@x.com", 30)).unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }

    #[test]
    fn test_email_without_at_rejected() {
        let errors = NewUser::try_from(UserInput::new("Ann", "ann.x.com", 30)).unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
    }

    #[test]
    fn test_negative_age_rejected() {
        let errors = NewUser::try_from(UserInput::new("Ann", "ann@x.com", -1)).unwrap_err();
        assert!(errors.field_errors().contains_key("age"));
    }

    #[test]
    fn test_missing_age_rejected() {
        let input: UserInput =
            serde_json::from_str(r#"{"name":"Ann","email":"ann@x.com"}"#).unwrap();
        let errors = NewUser::try_from(input).unwrap_err();
        assert!(errors.field_errors().contains_key("age"));
    }

    #[test]
    fn test_apply_keeps_identity() {
        let created_at = Utc::now();
        let id = Uuid::new_v4();
        let mut user = User {
            id,
            name: "Ann".into(),
            email: "ann@x.com".into(),
            age: 30,
            created_at,
        };

        user.apply(NewUser {
            name: "Ann2".into(),
            email: "ann2@x.com".into(),
            age: 31,
        });

        assert_eq!(user.id, id);
        assert_eq!(user.created_at, created_at);
        assert_eq!(user.name, "Ann2");
        assert_eq!(user.age, 31);
    }
}

//! PostgresUserRepository against a real database (requires Docker)

use domain_users::{NewUser, PostgresUserRepository, UserError, UserRepository};
use test_utils::{TestDataBuilder, TestDatabase};

fn new_user(builder: &TestDataBuilder, suffix: &str) -> NewUser {
    NewUser {
        name: builder.name(suffix),
        email: builder.email(suffix),
        age: 30,
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_crud_round() {
    let db = TestDatabase::new().await;
    let repo = PostgresUserRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("test_crud_round");

    let created = repo.create(new_user(&builder, "ann")).await.unwrap();
    assert_eq!(created.email, builder.email("ann"));

    let fetched = repo.get_by_id(created.id).await.unwrap();
    assert_eq!(fetched.as_ref().map(|u| u.id), Some(created.id));

    let mut changed = created.clone();
    changed.name = "Renamed".to_string();
    changed.age = 31;
    let updated = repo.update(changed).await.unwrap();
    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.created_at, created.created_at);

    assert_eq!(repo.list().await.unwrap().len(), 1);

    assert!(repo.delete(created.id).await.unwrap());
    assert!(!repo.delete(created.id).await.unwrap());
    assert!(repo.get_by_id(created.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_email_unique_case_insensitive() {
    let db = TestDatabase::new().await;
    let repo = PostgresUserRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("test_email_unique_case_insensitive");

    let ann = repo.create(new_user(&builder, "ann")).await.unwrap();

    let shouting = NewUser {
        email: ann.email.to_uppercase(),
        ..new_user(&builder, "other")
    };
    let result = repo.create(shouting).await;
    assert!(matches!(result, Err(UserError::DuplicateEmail(_))));

    assert!(repo.email_exists(&ann.email.to_uppercase(), None).await.unwrap());
    assert!(!repo.email_exists(&ann.email, Some(ann.id)).await.unwrap());
}

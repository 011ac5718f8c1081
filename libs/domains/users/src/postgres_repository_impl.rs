use super::{NewUser, User, UserError, UserRepository, UserResult};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ConnectionTrait, DbBackend, DbErr, FromQueryResult, Statement};
use uuid::Uuid;

/// PostgreSQL implementation of UserRepository using SeaORM
///
/// The connection is created once at startup and shared; cloning the
/// repository clones the pool handle, not the pool.
#[derive(Clone)]
pub struct PostgresUserRepository {
    db: sea_orm::DatabaseConnection,
}

impl PostgresUserRepository {
    pub fn new(db: sea_orm::DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Helper struct for deserializing user rows from the database
#[derive(Debug, FromQueryResult)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    age: i32,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            age: row.age,
            created_at: row.created_at,
        }
    }
}

/// Map unique violations on the email index to `DuplicateEmail`
fn map_write_error(e: DbErr, email: &str) -> UserError {
    let err_str = e.to_string();
    if err_str.contains("duplicate key") || err_str.contains("unique constraint") {
        UserError::DuplicateEmail(email.to_string())
    } else {
        UserError::Internal(format!("Database error: {}", e))
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: NewUser) -> UserResult<User> {
        let sql = r#"
            INSERT INTO users (id, name, email, age, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, email, age, created_at
        "#;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [
                Uuid::now_v7().into(),
                user.name.clone().into(),
                user.email.clone().into(),
                user.age.into(),
                Utc::now().into(),
            ],
        );

        let row = UserRow::find_by_statement(stmt)
            .one(&self.db)
            .await
            .map_err(|e| map_write_error(e, &user.email))?
            .ok_or_else(|| UserError::Internal("Failed to create user".to_string()))?;

        tracing::info!(user_id = %row.id, email = %row.email, "Created user");
        Ok(row.into())
    }

    async fn get_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        let sql = "SELECT id, name, email, age, created_at FROM users WHERE id = $1";

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, [id.into()]);

        let row = UserRow::find_by_statement(stmt).one(&self.db).await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list(&self) -> UserResult<Vec<User>> {
        let sql = "SELECT id, name, email, age, created_at FROM users";

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, []);

        let rows = UserRow::find_by_statement(stmt).all(&self.db).await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn update(&self, user: User) -> UserResult<User> {
        // created_at is not in the SET list, so the stored value survives
        let sql = r#"
            UPDATE users
            SET name = $2, email = $3, age = $4
            WHERE id = $1
            RETURNING id, name, email, age, created_at
        "#;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [
                user.id.into(),
                user.name.clone().into(),
                user.email.clone().into(),
                user.age.into(),
            ],
        );

        let row = UserRow::find_by_statement(stmt)
            .one(&self.db)
            .await
            .map_err(|e| map_write_error(e, &user.email))?;

        let updated: User = row.map(|r| r.into()).ok_or(UserError::NotFound(user.id))?;
        tracing::info!(user_id = %updated.id, "Updated user");
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> UserResult<bool> {
        let sql = "DELETE FROM users WHERE id = $1";

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, [id.into()]);

        let result = self.db.execute_raw(stmt).await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(user_id = %id, "Deleted user");
        }
        Ok(deleted)
    }

    async fn email_exists(&self, email: &str, excluding: Option<Uuid>) -> UserResult<bool> {
        let sql = r#"
            SELECT EXISTS(
                SELECT 1 FROM users
                WHERE lower(email) = lower($1) AND ($2::uuid IS NULL OR id <> $2)
            ) AS exists
        "#;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [email.into(), excluding.into()],
        );

        #[derive(FromQueryResult)]
        struct ExistsResult {
            exists: bool,
        }

        let result = ExistsResult::find_by_statement(stmt).one(&self.db).await?;

        Ok(result.map(|r| r.exists).unwrap_or(false))
    }
}

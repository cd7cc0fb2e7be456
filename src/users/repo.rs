use anyhow::Context;
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use ulid::Ulid;
use uuid::Uuid;

use super::model::User;
use crate::portfolios::repo as portfolio_repo;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    roles: Json<Vec<String>>,
    password: String,
    is_verified: bool,
    firstname: Option<String>,
    lastname: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User::restore(
            Ulid::from(r.id),
            r.email,
            r.roles.0,
            r.password,
            r.is_verified,
            r.firstname,
            r.lastname,
            r.created_at,
            r.updated_at,
        )
    }
}

const USER_COLUMNS: &str =
    "id, email, roles, password, is_verified, firstname, lastname, created_at, updated_at";

async fn attach_portfolios(db: &PgPool, mut users: Vec<User>) -> anyhow::Result<Vec<User>> {
    let ids: Vec<Ulid> = users.iter().map(User::id).collect();
    let mut by_owner = portfolio_repo::list_for_users(db, &ids).await?;
    for u in &mut users {
        for p in by_owner.remove(&u.id()).unwrap_or_default() {
            u.add_portfolio(p);
        }
    }
    Ok(users)
}

/// Find a user by email, with portfolios and their transactions.
pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(db)
    .await
    .context("find user by email")?;
    let Some(row) = row else {
        return Ok(None);
    };
    Ok(attach_portfolios(db, vec![row.into()]).await?.pop())
}

/// Find a user by id, with portfolios and their transactions.
pub async fn find_by_id(db: &PgPool, id: Ulid) -> anyhow::Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(Uuid::from(id))
    .fetch_optional(db)
    .await
    .context("find user by id")?;
    let Some(row) = row else {
        return Ok(None);
    };
    Ok(attach_portfolios(db, vec![row.into()]).await?.pop())
}

/// All users ordered by id (ULIDs sort by creation time).
pub async fn list(db: &PgPool) -> anyhow::Result<Vec<User>> {
    let rows = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY id ASC"
    ))
    .fetch_all(db)
    .await
    .context("list users")?;
    attach_portfolios(db, rows.into_iter().map(User::from).collect()).await
}

/// True when another user already holds `email`.
pub async fn email_taken(db: &PgPool, email: &str, except: Option<Ulid>) -> anyhow::Result<bool> {
    let taken: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM users
             WHERE email = $1
               AND ($2::uuid IS NULL OR id <> $2)
        )
        "#,
    )
    .bind(email)
    .bind(except.map(Uuid::from))
    .fetch_one(db)
    .await
    .context("check email uniqueness")?;
    Ok(taken)
}

/// Insert a user together with its portfolios.
pub async fn insert(db: &PgPool, user: &User) -> anyhow::Result<()> {
    let mut tx = db.begin().await.context("begin tx")?;
    sqlx::query(
        r#"
        INSERT INTO users (id, email, roles, password, is_verified, firstname, lastname, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(Uuid::from(user.id()))
    .bind(user.email())
    .bind(Json(user.stored_roles()))
    .bind(user.password())
    .bind(user.is_verified())
    .bind(user.firstname())
    .bind(user.lastname())
    .bind(user.created_at())
    .bind(user.updated_at())
    .execute(&mut *tx)
    .await
    .context("insert user")?;

    for p in user.portfolios() {
        portfolio_repo::insert_tx(&mut tx, p).await?;
    }
    tx.commit().await.context("commit tx")?;
    Ok(())
}

/// Persist scalar fields and bump `updated_at`. New portfolios are inserted.
pub async fn update(db: &PgPool, user: &mut User) -> anyhow::Result<()> {
    user.touch(OffsetDateTime::now_utc());
    let mut tx = db.begin().await.context("begin tx")?;
    sqlx::query(
        r#"
        UPDATE users
           SET email = $2, roles = $3, password = $4, is_verified = $5,
               firstname = $6, lastname = $7, updated_at = $8
         WHERE id = $1
        "#,
    )
    .bind(Uuid::from(user.id()))
    .bind(user.email())
    .bind(Json(user.stored_roles()))
    .bind(user.password())
    .bind(user.is_verified())
    .bind(user.firstname())
    .bind(user.lastname())
    .bind(user.updated_at())
    .execute(&mut *tx)
    .await
    .context("update user")?;

    let existing: Vec<Uuid> =
        sqlx::query_scalar("SELECT id FROM portfolios WHERE user_id = $1")
            .bind(Uuid::from(user.id()))
            .fetch_all(&mut *tx)
            .await
            .context("list portfolio ids")?;
    for p in user.portfolios() {
        if !existing.contains(&Uuid::from(p.id)) {
            portfolio_repo::insert_tx(&mut tx, p).await?;
        }
    }
    tx.commit().await.context("commit tx")?;
    Ok(())
}

/// Delete a user; portfolios and transactions go with it (FK cascade).
pub async fn delete(db: &PgPool, id: Ulid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(Uuid::from(id))
        .execute(db)
        .await
        .context("delete user")?;
    Ok(res.rows_affected() > 0)
}

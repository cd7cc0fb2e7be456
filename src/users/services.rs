use sqlx::PgPool;
use tracing::{info, instrument, warn};
use ulid::Ulid;

use super::{
    model::{User, ROLE_ADMIN},
    repo,
    serialization::UserWrite,
    validation::{validate_user, Group, ValidationErrors, Violation, UNIQUE_EMAIL_MESSAGE},
};
use crate::{
    auth::{
        password::hash_password,
        voter::{deny_access_unless_granted, Attribute, Principal},
    },
    error::AppError,
};

/// Hashes a staged plain password into the credential, if one was staged.
fn hash_staged_password(user: &mut User) -> Result<(), AppError> {
    if let Some(plain) = user.plain_password().filter(|p| !p.trim().is_empty()) {
        let hash = hash_password(plain)?;
        user.set_password(hash);
    }
    Ok(())
}

/// Postgres name of the `users.email` UNIQUE constraint.
const EMAIL_CONSTRAINT: &str = "users_email_key";

fn email_taken_error() -> AppError {
    ValidationErrors::from(vec![Violation {
        field: "email",
        message: UNIQUE_EMAIL_MESSAGE.into(),
    }])
    .into()
}

async fn ensure_unique_email(db: &PgPool, user: &User, except: Option<Ulid>) -> Result<(), AppError> {
    if repo::email_taken(db, user.email(), except).await? {
        return Err(email_taken_error());
    }
    Ok(())
}

/// A concurrent write can claim the email between the check and the write;
/// the constraint violation is then reported like the checked case.
fn map_write_error(err: anyhow::Error) -> AppError {
    let email_conflict = err
        .downcast_ref::<sqlx::Error>()
        .and_then(sqlx::Error::as_database_error)
        .is_some_and(|db| db.is_unique_violation() && db.constraint() == Some(EMAIL_CONSTRAINT));
    if email_conflict {
        warn!("email claimed by a concurrent write");
        email_taken_error()
    } else {
        AppError::Internal(err)
    }
}

/// Registration: anonymous callers may only set `user:write` fields.
#[instrument(skip(db, write))]
pub async fn create_user(db: &PgPool, write: UserWrite) -> Result<User, AppError> {
    let mut user = User::new(String::new(), String::new());
    write.apply(&mut user, false);
    hash_staged_password(&mut user)?;
    validate_user(&user, &[Group::Default, Group::Create])?;
    ensure_unique_email(db, &user, None).await?;
    user.erase_credentials();

    repo::insert(db, &user).await.map_err(map_write_error)?;
    info!(user_id = %user.id(), email = %user.email(), "user registered");
    Ok(user)
}

/// Only the user themself may update their record; admins may also set
/// roles and the verification flag.
#[instrument(skip(db, principal, write), fields(caller = %principal.id))]
pub async fn update_user(
    db: &PgPool,
    principal: &Principal,
    id: Ulid,
    write: UserWrite,
) -> Result<User, AppError> {
    let mut user = repo::find_by_id(db, id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    deny_access_unless_granted(Attribute::OwnerOnly, principal, Some(&user))?;

    write.apply(&mut user, principal.has_role(ROLE_ADMIN));
    hash_staged_password(&mut user)?;
    validate_user(&user, &[Group::Default])?;
    ensure_unique_email(db, &user, Some(user.id())).await?;
    user.erase_credentials();

    repo::update(db, &mut user).await.map_err(map_write_error)?;
    info!(user_id = %user.id(), "user updated");
    Ok(user)
}

#[instrument(skip(db, principal), fields(caller = %principal.id))]
pub async fn delete_user(db: &PgPool, principal: &Principal, id: Ulid) -> Result<(), AppError> {
    deny_access_unless_granted(Attribute::Role(ROLE_ADMIN), principal, None)?;
    if !repo::delete(db, id).await? {
        return Err(AppError::NotFound("User"));
    }
    info!(user_id = %id, "user deleted");
    Ok(())
}

use time::OffsetDateTime;
use ulid::Ulid;

use crate::auth::voter::Principal;
use crate::portfolios::{Portfolio, Transaction};

/// Role every user holds regardless of what is stored.
pub const ROLE_USER: &str = "ROLE_USER";
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";

/// User aggregate. Owns its portfolios and keeps their back-references in
/// sync; everything else is plain state mutated through setters.
#[derive(Debug, Clone)]
pub struct User {
    id: Ulid,
    email: String,
    roles: Vec<String>,
    password: String,
    plain_password: Option<String>,
    is_verified: bool,
    firstname: Option<String>,
    lastname: Option<String>,
    portfolios: Vec<Portfolio>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl User {
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Ulid::new(),
            email: email.into(),
            roles: Vec::new(),
            password: password_hash.into(),
            plain_password: None,
            is_verified: false,
            firstname: None,
            lastname: None,
            portfolios: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a user from stored state. Portfolios are attached afterwards
    /// with [`User::add_portfolio`].
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: Ulid,
        email: String,
        roles: Vec<String>,
        password: String,
        is_verified: bool,
        firstname: Option<String>,
        lastname: Option<String>,
        created_at: OffsetDateTime,
        updated_at: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            email,
            roles,
            password,
            plain_password: None,
            is_verified,
            firstname,
            lastname,
            portfolios: Vec::new(),
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn set_email(&mut self, email: impl Into<String>) -> &mut Self {
        self.email = email.into();
        self
    }

    /// Visual identifier of the user.
    pub fn username(&self) -> &str {
        &self.email
    }

    /// Stored roles plus [`ROLE_USER`], without duplicates.
    pub fn roles(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.roles.len() + 1);
        for role in self.roles.iter().map(String::as_str).chain([ROLE_USER]) {
            if !out.iter().any(|r| r == role) {
                out.push(role.to_string());
            }
        }
        out
    }

    /// Roles exactly as stored, without the implicit base role.
    pub fn stored_roles(&self) -> &[String] {
        &self.roles
    }

    pub fn set_roles(&mut self, roles: Vec<String>) -> &mut Self {
        self.roles = roles;
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        role == ROLE_USER || self.roles.iter().any(|r| r == role)
    }

    /// Hashed password.
    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn set_password(&mut self, hash: impl Into<String>) -> &mut Self {
        self.password = hash.into();
        self
    }

    pub fn plain_password(&self) -> Option<&str> {
        self.plain_password.as_deref()
    }

    pub fn set_plain_password(&mut self, plain: impl Into<String>) -> &mut Self {
        self.plain_password = Some(plain.into());
        self
    }

    /// Drops the transient plain password. The hash is kept.
    pub fn erase_credentials(&mut self) {
        self.plain_password = None;
    }

    pub fn is_verified(&self) -> bool {
        self.is_verified
    }

    pub fn set_is_verified(&mut self, verified: bool) -> &mut Self {
        self.is_verified = verified;
        self
    }

    pub fn firstname(&self) -> Option<&str> {
        self.firstname.as_deref()
    }

    pub fn set_firstname(&mut self, firstname: Option<String>) -> &mut Self {
        self.firstname = firstname;
        self
    }

    pub fn lastname(&self) -> Option<&str> {
        self.lastname.as_deref()
    }

    pub fn set_lastname(&mut self, lastname: Option<String>) -> &mut Self {
        self.lastname = lastname;
        self
    }

    pub fn portfolios(&self) -> &[Portfolio] {
        &self.portfolios
    }

    /// Appends the portfolio unless one with the same id is already held,
    /// and points its owner at this user.
    pub fn add_portfolio(&mut self, mut portfolio: Portfolio) -> &mut Self {
        if !self.portfolios.iter().any(|p| p.id == portfolio.id) {
            portfolio.owner = Some(self.id);
            self.portfolios.push(portfolio);
        }
        self
    }

    /// Detaches the portfolio with the given id. The owner reference is
    /// cleared only if it still points at this user.
    pub fn remove_portfolio(&mut self, portfolio_id: Ulid) -> Option<Portfolio> {
        let idx = self.portfolios.iter().position(|p| p.id == portfolio_id)?;
        let mut removed = self.portfolios.remove(idx);
        if removed.owner == Some(self.id) {
            removed.owner = None;
        }
        Some(removed)
    }

    /// Every transaction of every portfolio, in portfolio then transaction order.
    pub fn all_transactions(&self) -> Vec<&Transaction> {
        self.portfolios
            .iter()
            .flat_map(|p| p.transactions().iter())
            .collect()
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn updated_at(&self) -> OffsetDateTime {
        self.updated_at
    }

    /// Marks the user as modified; called by the repository before an update.
    pub(crate) fn touch(&mut self, now: OffsetDateTime) {
        self.updated_at = now;
    }

    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            roles: self.roles(),
            verified: self.is_verified,
        }
    }
}

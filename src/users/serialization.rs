//! Which user fields each audience may read or write.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;
use ulid::Ulid;

use super::model::{User, ROLE_ADMIN};
use crate::auth::voter::Principal;
use crate::portfolios::Portfolio;

/// Read audience, widest last: public ⊂ owner ⊂ admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Audience {
    Public,
    Owner,
    Admin,
}

impl Audience {
    /// Admins see everything; a user reading themself sees owner fields.
    pub fn resolve(principal: &Principal, subject: &User) -> Self {
        if principal.has_role(ROLE_ADMIN) {
            Audience::Admin
        } else if principal.id == subject.id() {
            Audience::Owner
        } else {
            Audience::Public
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Ulid,
    pub email: String,
    pub portfolios: Vec<Portfolio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firstname: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
}

impl UserView {
    pub fn new(user: &User, audience: Audience) -> Self {
        let owner = audience >= Audience::Owner;
        let admin = audience >= Audience::Admin;
        Self {
            id: user.id(),
            email: user.email().to_string(),
            portfolios: user.portfolios().to_vec(),
            firstname: owner.then(|| user.firstname().map(str::to_string)),
            lastname: owner.then(|| user.lastname().map(str::to_string)),
            roles: admin.then(|| user.roles()),
            is_verified: admin.then(|| user.is_verified()),
        }
    }
}

/// Keeps only the requested top-level properties of a serialized view.
/// An empty filter keeps everything.
pub fn filter_properties(value: serde_json::Value, properties: &[String]) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) if !properties.is_empty() => map
            .into_iter()
            .filter(|(k, _)| properties.iter().any(|p| p == k))
            .collect::<serde_json::Map<_, _>>()
            .into(),
        other => other,
    }
}

/// Portfolio supplied with a new user; persisted along with it.
#[derive(Debug, Deserialize)]
pub struct PortfolioInput {
    pub name: String,
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field (`None`).
fn present<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(de).map(Some)
}

/// Writable user fields. `roles` and `isVerified` are honoured for admins
/// only; everything else belongs to the `user:write` group. Names sent as
/// `null` are cleared.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWrite {
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub firstname: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub lastname: Option<Option<String>>,
    #[serde(default)]
    pub portfolios: Vec<PortfolioInput>,
    pub roles: Option<Vec<String>>,
    pub is_verified: Option<bool>,
}

impl UserWrite {
    /// Copies writable fields onto `user`. The plain password is staged on
    /// the user; hashing is left to the caller.
    pub fn apply(self, user: &mut User, is_admin: bool) {
        if let Some(email) = self.email {
            user.set_email(email.trim().to_lowercase());
        }
        if let Some(plain) = self.password {
            user.set_plain_password(plain);
        }
        if let Some(firstname) = self.firstname {
            user.set_firstname(firstname);
        }
        if let Some(lastname) = self.lastname {
            user.set_lastname(lastname);
        }
        for p in self.portfolios {
            user.add_portfolio(Portfolio::new(p.name));
        }
        if is_admin {
            if let Some(roles) = self.roles {
                user.set_roles(roles);
            }
            if let Some(verified) = self.is_verified {
                user.set_is_verified(verified);
            }
        } else if self.roles.is_some() || self.is_verified.is_some() {
            debug!(user_id = %user.id(), "ignoring admin-only fields from non-admin");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        let mut u = User::new("alice@example.com", "$argon2id$hash");
        u.set_firstname(Some("Alice".into()))
            .set_is_verified(true)
            .set_roles(vec![ROLE_ADMIN.into()]);
        u
    }

    fn keys(v: &serde_json::Value) -> Vec<String> {
        let mut k: Vec<String> = v.as_object().unwrap().keys().cloned().collect();
        k.sort();
        k
    }

    #[test]
    fn public_view_hides_private_fields() {
        let v = serde_json::to_value(UserView::new(&user(), Audience::Public)).unwrap();
        assert_eq!(keys(&v), vec!["email", "id", "portfolios"]);
    }

    #[test]
    fn owner_view_adds_names() {
        let v = serde_json::to_value(UserView::new(&user(), Audience::Owner)).unwrap();
        assert_eq!(keys(&v), vec!["email", "firstname", "id", "lastname", "portfolios"]);
        assert_eq!(v["firstname"], "Alice");
        assert!(v["lastname"].is_null());
    }

    #[test]
    fn admin_view_adds_roles_and_flag() {
        let v = serde_json::to_value(UserView::new(&user(), Audience::Admin)).unwrap();
        assert_eq!(
            keys(&v),
            vec!["email", "firstname", "id", "isVerified", "lastname", "portfolios", "roles"]
        );
        assert_eq!(v["isVerified"], true);
    }

    #[test]
    fn password_never_serialized() {
        let v = serde_json::to_string(&UserView::new(&user(), Audience::Admin)).unwrap();
        assert!(!v.contains("argon2"));
        assert!(!v.contains("password"));
    }

    #[test]
    fn audience_resolution() {
        let alice = User::new("alice@example.com", "h");
        let bob = User::new("bob@example.com", "h");
        let mut root = User::new("root@example.com", "h");
        root.set_roles(vec![ROLE_ADMIN.into()]);

        assert_eq!(Audience::resolve(&alice.principal(), &alice), Audience::Owner);
        assert_eq!(Audience::resolve(&alice.principal(), &bob), Audience::Public);
        assert_eq!(Audience::resolve(&root.principal(), &bob), Audience::Admin);
    }

    #[test]
    fn property_filter_keeps_requested_fields() {
        let v = serde_json::to_value(UserView::new(&user(), Audience::Public)).unwrap();
        let filtered = filter_properties(v.clone(), &["email".into()]);
        assert_eq!(keys(&filtered), vec!["email"]);
        assert_eq!(filter_properties(v.clone(), &[]), v);
    }

    #[test]
    fn non_admin_cannot_write_admin_fields() {
        let mut u = User::new("alice@example.com", "h");
        let write: UserWrite = serde_json::from_value(serde_json::json!({
            "email": " Alice@Example.com ",
            "password": "new-secret",
            "roles": ["ROLE_ADMIN"],
            "isVerified": true,
            "portfolios": [{"name": "Main"}]
        }))
        .unwrap();
        write.apply(&mut u, false);

        assert_eq!(u.email(), "alice@example.com");
        assert_eq!(u.plain_password(), Some("new-secret"));
        assert!(!u.is_verified());
        assert!(!u.has_role(ROLE_ADMIN));
        assert_eq!(u.portfolios().len(), 1);
        assert_eq!(u.portfolios()[0].owner(), Some(u.id()));
    }

    #[test]
    fn admin_can_write_admin_fields() {
        let mut u = User::new("alice@example.com", "h");
        let write = UserWrite {
            roles: Some(vec![ROLE_ADMIN.into()]),
            is_verified: Some(true),
            ..Default::default()
        };
        write.apply(&mut u, true);
        assert!(u.is_verified());
        assert!(u.has_role(ROLE_ADMIN));
    }

    #[test]
    fn null_name_clears_and_absent_name_keeps() {
        let mut u = User::new("alice@example.com", "h");
        u.set_firstname(Some("Alice".into()))
            .set_lastname(Some("Liddell".into()));
        let write: UserWrite =
            serde_json::from_value(serde_json::json!({ "firstname": null })).unwrap();
        assert_eq!(write.firstname, Some(None));
        assert_eq!(write.lastname, None);

        write.apply(&mut u, false);
        assert_eq!(u.firstname(), None);
        assert_eq!(u.lastname(), Some("Liddell"));
    }
}

//! Declarative field constraints for users, checked at the service boundary.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::model::User;

pub const UNIQUE_EMAIL_MESSAGE: &str = "There is already an account with this email";

/// Validation group a rule belongs to. `Create` rules only run when a user
/// is first registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    Default,
    Create,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    NotBlank,
    Email,
    MaxLength(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub constraint: Constraint,
    pub groups: &'static [Group],
}

const DEFAULT: &[Group] = &[Group::Default];
const CREATE: &[Group] = &[Group::Create];

pub const USER_RULES: &[FieldRule] = &[
    FieldRule { field: "email", constraint: Constraint::NotBlank, groups: DEFAULT },
    FieldRule { field: "email", constraint: Constraint::Email, groups: DEFAULT },
    FieldRule { field: "email", constraint: Constraint::MaxLength(180), groups: DEFAULT },
    FieldRule { field: "password", constraint: Constraint::NotBlank, groups: DEFAULT },
    FieldRule { field: "plainPassword", constraint: Constraint::NotBlank, groups: CREATE },
    FieldRule { field: "firstname", constraint: Constraint::MaxLength(100), groups: DEFAULT },
    FieldRule { field: "lastname", constraint: Constraint::MaxLength(100), groups: DEFAULT },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
#[error("{} constraint violation(s)", .0.len())]
pub struct ValidationErrors(Vec<Violation>);

impl ValidationErrors {
    pub fn violations(&self) -> &[Violation] {
        &self.0
    }
}

impl From<Vec<Violation>> for ValidationErrors {
    fn from(v: Vec<Violation>) -> Self {
        Self(v)
    }
}

/// Exposes named string fields to the rule table.
pub trait Validatable {
    fn field_value(&self, field: &str) -> Option<&str>;
}

impl Validatable for User {
    fn field_value(&self, field: &str) -> Option<&str> {
        match field {
            "email" => Some(self.email()),
            "password" => Some(self.password()),
            "plainPassword" => self.plain_password(),
            "firstname" => self.firstname(),
            "lastname" => self.lastname(),
            _ => None,
        }
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

fn check(constraint: Constraint, value: Option<&str>) -> Option<String> {
    match (constraint, value) {
        (Constraint::NotBlank, v) if v.map_or(true, |s| s.trim().is_empty()) => {
            Some("This value should not be blank.".into())
        }
        (Constraint::Email, Some(v)) if !v.is_empty() && !is_valid_email(v) => {
            Some("This value is not a valid email address.".into())
        }
        (Constraint::MaxLength(max), Some(v)) if v.chars().count() > max => Some(format!(
            "This value is too long. It should have {max} characters or less."
        )),
        _ => None,
    }
}

/// Runs every rule belonging to one of `groups`.
pub fn validate<T: Validatable>(
    subject: &T,
    rules: &[FieldRule],
    groups: &[Group],
) -> Result<(), ValidationErrors> {
    let violations: Vec<Violation> = rules
        .iter()
        .filter(|r| r.groups.iter().any(|g| groups.contains(g)))
        .filter_map(|r| {
            check(r.constraint, subject.field_value(r.field)).map(|message| Violation {
                field: r.field,
                message,
            })
        })
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(violations))
    }
}

pub fn validate_user(user: &User, groups: &[Group]) -> Result<(), ValidationErrors> {
    validate(user, USER_RULES, groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(err: &ValidationErrors) -> Vec<&'static str> {
        err.violations().iter().map(|v| v.field).collect()
    }

    #[test]
    fn valid_user_passes_both_groups() {
        let mut u = User::new("alice@example.com", "$argon2id$hash");
        u.set_plain_password("correct-horse");
        assert!(validate_user(&u, &[Group::Default, Group::Create]).is_ok());
    }

    #[test]
    fn blank_email_fails_not_blank_and_format() {
        let u = User::new("   ", "$argon2id$hash");
        let err = validate_user(&u, &[Group::Default]).unwrap_err();
        assert_eq!(fields(&err), vec!["email", "email"]);
        assert_eq!(err.violations()[0].message, "This value should not be blank.");
    }

    #[test]
    fn empty_email_skips_format_check() {
        let u = User::new("", "$argon2id$hash");
        let err = validate_user(&u, &[Group::Default]).unwrap_err();
        assert_eq!(fields(&err), vec!["email"]);
    }

    #[test]
    fn malformed_email_is_rejected() {
        let u = User::new("not-an-email", "$argon2id$hash");
        let err = validate_user(&u, &[Group::Default]).unwrap_err();
        assert_eq!(fields(&err), vec!["email"]);
        assert!(err.violations()[0].message.contains("valid email"));
    }

    #[test]
    fn blank_hash_is_rejected() {
        let u = User::new("alice@example.com", "");
        let err = validate_user(&u, &[Group::Default]).unwrap_err();
        assert_eq!(fields(&err), vec!["password"]);
    }

    #[test]
    fn plain_password_only_required_on_create() {
        let u = User::new("alice@example.com", "$argon2id$hash");
        assert!(validate_user(&u, &[Group::Default]).is_ok());
        let err = validate_user(&u, &[Group::Default, Group::Create]).unwrap_err();
        assert_eq!(fields(&err), vec!["plainPassword"]);
    }

    #[test]
    fn long_names_are_rejected() {
        let mut u = User::new("alice@example.com", "$argon2id$hash");
        u.set_firstname(Some("a".repeat(101)))
            .set_lastname(Some("b".repeat(100)));
        let err = validate_user(&u, &[Group::Default]).unwrap_err();
        assert_eq!(fields(&err), vec!["firstname"]);
    }

    #[test]
    fn email_regex() {
        assert!(is_valid_email("a.b@c.io"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.io"));
    }
}

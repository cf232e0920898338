// User Domain Model

use serde::Deserialize;

/// User ID (UUID v4)
pub type UserId = String;

pub const MAX_ACCOUNT_KEY_LENGTH: usize = 100;
pub const MAX_EMAIL_LENGTH: usize = 200;
pub const MAX_FULL_NAME_LENGTH: usize = 200;
pub const MAX_KEY_LENGTH: usize = 200;
pub const MAX_METADATA_LENGTH: usize = 2000;
pub const MAX_PHONE_NUMBER_LENGTH: usize = 20;

/// Number of trailing account key characters that may appear in logs
const REDACTED_SUFFIX_LEN: usize = 4;

/// User Entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub phone_number: String,
    pub full_name: Option<String>,
    pub password_digest: String,
    pub key: String,
    pub account_key: Option<String>,
    pub metadata: Option<String>,

    pub created_at: i64, // epoch ms
    pub updated_at: i64,
}

impl User {
    /// True once the account key has been acquired (monotonic)
    pub fn has_account_key(&self) -> bool {
        self.account_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

/// Columns carrying a uniqueness constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    PhoneNumber,
    Key,
    AccountKey,
}

impl UniqueField {
    pub fn column(&self) -> &'static str {
        match self {
            UniqueField::Email => "email",
            UniqueField::PhoneNumber => "phone_number",
            UniqueField::Key => "key",
            UniqueField::AccountKey => "account_key",
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        match column {
            "email" => Some(UniqueField::Email),
            "phone_number" => Some(UniqueField::PhoneNumber),
            "key" => Some(UniqueField::Key),
            "account_key" => Some(UniqueField::AccountKey),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UniqueField::Email => "Email",
            UniqueField::PhoneNumber => "Phone number",
            UniqueField::Key => "Key",
            UniqueField::AccountKey => "Account key",
        }
    }

    pub fn taken_message(&self) -> String {
        format!("{} has already been taken", self.label())
    }
}

/// Attributes accepted when registering a user
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserDraft {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Opaque key; generated at registration when blank
    #[serde(skip)]
    pub key: Option<String>,
}

impl UserDraft {
    /// Lowercase the email and drop blank optional attributes
    pub fn normalize(mut self) -> Self {
        self.email = self.email.map(|email| email.to_lowercase());
        self.full_name = self.full_name.filter(|v| !is_blank(v));
        self.metadata = self.metadata.filter(|v| !is_blank(v));
        self.key = self.key.filter(|v| !is_blank(v));
        self
    }

    /// Field-level checks that need no storage access.
    ///
    /// Uniqueness is checked by the registration use case and enforced again
    /// by the store.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        check_required(&mut errors, "Email", self.email.as_deref(), MAX_EMAIL_LENGTH);
        check_optional(&mut errors, "Full name", self.full_name.as_deref(), MAX_FULL_NAME_LENGTH);
        check_optional(&mut errors, "Key", self.key.as_deref(), MAX_KEY_LENGTH);
        check_optional(&mut errors, "Metadata", self.metadata.as_deref(), MAX_METADATA_LENGTH);
        check_required(
            &mut errors,
            "Phone number",
            self.phone_number.as_deref(),
            MAX_PHONE_NUMBER_LENGTH,
        );

        if self.password.as_deref().map_or(true, is_blank) {
            errors.push(blank_message("Password"));
        }

        errors
    }
}

/// Query filters for listing users; blank filters are ignored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub metadata: Option<String>,
}

impl UserFilter {
    pub fn new(email: Option<String>, full_name: Option<String>, metadata: Option<String>) -> Self {
        Self {
            email: email.filter(|v| !is_blank(v)).map(|v| v.to_lowercase()),
            full_name: full_name.filter(|v| !is_blank(v)),
            metadata: metadata.filter(|v| !is_blank(v)),
        }
    }

    /// In-process evaluation of the filter (the SQL adapter builds an equivalent query)
    pub fn matches(&self, user: &User) -> bool {
        if let Some(email) = &self.email {
            if &user.email != email {
                return false;
            }
        }

        if let Some(full_name) = &self.full_name {
            if user.full_name.as_ref() != Some(full_name) {
                return false;
            }
        }

        if let Some(metadata) = &self.metadata {
            let needle = metadata.to_lowercase();
            let found = user
                .metadata
                .as_deref()
                .is_some_and(|m| m.to_lowercase().contains(&needle));
            if !found {
                return false;
            }
        }

        true
    }
}

/// Check an account key before it is persisted
pub fn validate_account_key(account_key: &str) -> super::error::Result<()> {
    if is_blank(account_key) {
        return Err(super::DomainError::InvalidAccountKey(
            "account key can't be blank".to_string(),
        ));
    }

    if account_key.chars().count() > MAX_ACCOUNT_KEY_LENGTH {
        return Err(super::DomainError::InvalidAccountKey(too_long_message(
            "Account key",
            MAX_ACCOUNT_KEY_LENGTH,
        )));
    }

    Ok(())
}

/// Mask an account key for logging, keeping only a short trailing fragment
pub fn redact_account_key(account_key: &str) -> String {
    let chars: Vec<char> = account_key.chars().collect();
    let keep = chars.len().min(REDACTED_SUFFIX_LEN);
    let suffix: String = chars[chars.len() - keep..].iter().collect();
    format!("xxxxxx{}", suffix)
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn blank_message(field: &str) -> String {
    format!("{} can't be blank", field)
}

fn too_long_message(field: &str, max: usize) -> String {
    format!("{} is too long (maximum is {} characters)", field, max)
}

fn check_required(errors: &mut Vec<String>, field: &str, value: Option<&str>, max: usize) {
    match value {
        None => errors.push(blank_message(field)),
        Some(v) if is_blank(v) => errors.push(blank_message(field)),
        Some(v) => check_optional(errors, field, Some(v), max),
    }
}

fn check_optional(errors: &mut Vec<String>, field: &str, value: Option<&str>, max: usize) {
    if let Some(v) = value {
        if v.chars().count() > max {
            errors.push(too_long_message(field, max));
        }
    }
}

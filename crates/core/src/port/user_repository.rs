// User Repository Port (Interface)

use crate::domain::{UniqueField, User, UserFilter, UserId};
use crate::error::Result;
use async_trait::async_trait;

/// Result of a conditional account key write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountKeyAssignment {
    /// Key stored; carries the updated user
    Assigned(User),
    /// User already had a key; nothing written
    AlreadyAssigned,
    /// No such user
    UserMissing,
}

/// Repository interface for User persistence
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user.
    ///
    /// Violating a uniqueness constraint yields `AppError::Conflict`.
    async fn insert(&self, user: &User) -> Result<()>;

    /// Find user by ID
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>>;

    /// Which of the given unique values are already held by some user
    async fn taken_fields(
        &self,
        email: &str,
        phone_number: &str,
        key: &str,
    ) -> Result<Vec<UniqueField>>;

    /// Store the account key only while the user has none.
    ///
    /// A key already held by another user yields `AppError::Conflict`.
    async fn assign_account_key(
        &self,
        id: &UserId,
        account_key: &str,
        now_millis: i64,
    ) -> Result<AccountKeyAssignment>;

    /// Users matching the filter, most recent first
    async fn list(&self, filter: &UserFilter) -> Result<Vec<User>>;

    /// IDs of users still missing an account key, in creation order
    async fn ids_without_account_key(&self, limit: usize) -> Result<Vec<UserId>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// In-memory store enforcing the same uniqueness rules as the SQL schema
    #[derive(Default)]
    pub struct InMemoryUserRepository {
        users: Mutex<Vec<User>>,
    }

    impl InMemoryUserRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn len(&self) -> usize {
            self.users.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    #[async_trait]
    impl UserRepository for InMemoryUserRepository {
        async fn insert(&self, user: &User) -> Result<()> {
            let mut users = self.users.lock().unwrap();

            for existing in users.iter() {
                let clash = if existing.email == user.email {
                    Some(UniqueField::Email)
                } else if existing.phone_number == user.phone_number {
                    Some(UniqueField::PhoneNumber)
                } else if existing.key == user.key {
                    Some(UniqueField::Key)
                } else if user.account_key.is_some() && existing.account_key == user.account_key {
                    Some(UniqueField::AccountKey)
                } else {
                    None
                };

                if let Some(field) = clash {
                    return Err(AppError::Conflict(field.taken_message()));
                }
            }

            users.push(user.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &UserId) -> Result<Option<User>> {
            let users = self.users.lock().unwrap();
            Ok(users.iter().find(|u| &u.id == id).cloned())
        }

        async fn taken_fields(
            &self,
            email: &str,
            phone_number: &str,
            key: &str,
        ) -> Result<Vec<UniqueField>> {
            let users = self.users.lock().unwrap();
            let mut taken = Vec::new();
            if users.iter().any(|u| u.email == email) {
                taken.push(UniqueField::Email);
            }
            if users.iter().any(|u| u.phone_number == phone_number) {
                taken.push(UniqueField::PhoneNumber);
            }
            if users.iter().any(|u| u.key == key) {
                taken.push(UniqueField::Key);
            }
            Ok(taken)
        }

        async fn assign_account_key(
            &self,
            id: &UserId,
            account_key: &str,
            now_millis: i64,
        ) -> Result<AccountKeyAssignment> {
            let mut users = self.users.lock().unwrap();

            if users
                .iter()
                .any(|u| &u.id != id && u.account_key.as_deref() == Some(account_key))
            {
                return Err(AppError::Conflict(UniqueField::AccountKey.taken_message()));
            }

            match users.iter_mut().find(|u| &u.id == id) {
                None => Ok(AccountKeyAssignment::UserMissing),
                Some(user) if user.account_key.is_some() => Ok(AccountKeyAssignment::AlreadyAssigned),
                Some(user) => {
                    user.account_key = Some(account_key.to_string());
                    user.updated_at = now_millis;
                    Ok(AccountKeyAssignment::Assigned(user.clone()))
                }
            }
        }

        async fn list(&self, filter: &UserFilter) -> Result<Vec<User>> {
            let users = self.users.lock().unwrap();
            // Insertion order is creation order; newest first, ties by reverse insertion
            let mut found: Vec<User> = users.iter().rev().filter(|u| filter.matches(u)).cloned().collect();
            found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(found)
        }

        async fn ids_without_account_key(&self, limit: usize) -> Result<Vec<UserId>> {
            let users = self.users.lock().unwrap();
            Ok(users
                .iter()
                .filter(|u| u.account_key.is_none())
                .take(limit)
                .map(|u| u.id.clone())
                .collect())
        }
    }
}

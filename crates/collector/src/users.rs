//! In-memory principal store (spec §3 User, §4.B).
//!
//! The prototype's `fake_users_db` hardcodes a single `admin`/`admin`
//! account. Here the seed username/password are configurable via
//! `SIEM_ADMIN_USERNAME`/`SIEM_ADMIN_PASSWORD` (falling back to the
//! prototype's `admin`/`admin` default) so a deployment can override the
//! bootstrap credential without a code change, while still requiring zero
//! configuration to match the prototype's behavior out of the box.

use async_trait::async_trait;
use siem_core::config::SecurityConfig;
use siem_core::{PasswordHasher, Result, Scope, User, UserStore};
use std::collections::HashMap;

pub struct InMemoryUserStore {
    users: HashMap<String, User>,
}

impl InMemoryUserStore {
    pub fn new(security: &SecurityConfig) -> Result<Self> {
        let hasher = PasswordHasher::new(security)?;

        let username =
            std::env::var("SIEM_ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
        let password = std::env::var("SIEM_ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());

        let admin = User {
            password_hash: hasher.hash_password(&password)?,
            username: username.clone(),
            disabled: false,
            scopes: vec![Scope::LogsWrite, Scope::LogsRead, Scope::Admin],
        };

        let mut users = HashMap::new();
        users.insert(username, admin);

        Ok(Self { users })
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_user(&self, username: &str) -> Result<Option<User>> {
        Ok(self.users.get(username).cloned())
    }
}

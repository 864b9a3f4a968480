use std::sync::Arc;

use crate::{
    db::store::{KeyValueStore, StoreKey},
    error::AppResult,
    models::User,
    services::providers::CloudAccount,
};

const SESSION_PRESENT: &str = "1";

/// Login state on top of the cloud account service
///
/// Keeps a local session-presence flag so a cold start that never signed in
/// skips the current-user network call. The session secret is stored next to
/// it so a restart can resume the session.
pub struct SessionManager {
    account: Arc<dyn CloudAccount>,
    local: Arc<dyn KeyValueStore>,
}

impl SessionManager {
    pub fn new(account: Arc<dyn CloudAccount>, local: Arc<dyn KeyValueStore>) -> Self {
        Self { account, local }
    }

    /// The user of a previously established session, if it is still valid
    pub async fn restore(&self) -> AppResult<Option<User>> {
        if self.local.get(&StoreKey::SessionPresent).await?.is_none() {
            tracing::debug!("No prior session, skipping current-user lookup");
            return Ok(None);
        }

        if let Some(secret) = self.local.get(&StoreKey::SessionSecret).await? {
            self.account.resume_session(secret).await;
        }

        let user = self.account.current_user().await?;
        if user.is_none() {
            tracing::info!("Stored session is no longer valid");
            self.forget().await?;
        }
        Ok(user)
    }

    pub async fn login_with_password(&self, email: &str, password: &str) -> AppResult<User> {
        let user = self.account.login_with_password(email, password).await?;
        self.mark_present().await?;
        Ok(user)
    }

    pub async fn create_account(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
    ) -> AppResult<User> {
        let user = self.account.create_account(email, password, name).await?;
        self.mark_present().await?;
        Ok(user)
    }

    pub async fn send_magic_link(&self, email: &str, redirect_url: &str) -> AppResult<()> {
        self.account.send_magic_link(email, redirect_url).await
    }

    pub async fn verify_magic_link(&self, user_id: &str, secret: &str) -> AppResult<User> {
        let user = self.account.verify_magic_link(user_id, secret).await?;
        self.mark_present().await?;
        Ok(user)
    }

    pub async fn recover_password(&self, email: &str, redirect_url: &str) -> AppResult<()> {
        self.account.recover_password(email, redirect_url).await
    }

    /// Ends the session; the local flag is cleared even if the call fails
    pub async fn logout(&self) -> AppResult<()> {
        let result = self.account.logout().await;
        self.forget().await?;
        result
    }

    async fn mark_present(&self) -> AppResult<()> {
        if let Some(secret) = self.account.session_secret().await {
            self.local.set(&StoreKey::SessionSecret, secret).await?;
        }
        self.local
            .set(&StoreKey::SessionPresent, SESSION_PRESENT.to_string())
            .await
    }

    async fn forget(&self) -> AppResult<()> {
        self.local.remove(&StoreKey::SessionSecret).await?;
        self.local.remove(&StoreKey::SessionPresent).await
    }
}

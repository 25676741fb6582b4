use super::{attributes, Gateway};
use crate::backend::{unique_id, Account, Query, Session, CURRENT_SESSION};
use crate::error::AppResult;
use crate::models::{Credentials, CurrentUser, NewProfile, NewUser, UserProfile};

/// Username derived from a display name: lower-cased, whitespace removed.
pub fn username_from_name(name: &str) -> String {
    let username: String = name
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    if username.is_empty() {
        "unknown".to_string()
    } else {
        username
    }
}

impl Gateway {
    /// Create the account and its profile document.
    pub async fn create_user_account(&self, user: &NewUser) -> AppResult<UserProfile> {
        let account = self
            .backend
            .create_account(&unique_id(), &user.email, &user.password, &user.name)
            .await?;
        tracing::info!("Created account {} for {}", account.id, account.email);

        let avatar = self.backend.avatar_initials(&user.name)?;
        self.save_user_to_db(&NewProfile {
            account_id: account.id,
            name: account.name,
            email: account.email,
            username: user.username.clone(),
            image_url: avatar.to_string(),
        })
        .await
    }

    pub async fn save_user_to_db(&self, profile: &NewProfile) -> AppResult<UserProfile> {
        let document = self
            .backend
            .create_document(&self.collections.users, &unique_id(), attributes(profile)?)
            .await?;
        Ok(document.into_model()?)
    }

    pub async fn sign_in_account(&self, credentials: &Credentials) -> AppResult<Session> {
        let session = self
            .backend
            .create_email_password_session(&credentials.email, &credentials.password)
            .await?;
        tracing::info!("Session {} created", session.id);
        Ok(session)
    }

    /// Account of the current session; `None` when there is no valid session.
    pub async fn get_account(&self) -> AppResult<Option<Account>> {
        match self.backend.get_account().await {
            Ok(account) => Ok(Some(account)),
            Err(e) if e.is_unauthorized() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Profile and saved records of the signed-in user, creating the profile
    /// when the account has none yet.
    pub async fn try_get_current_user(&self) -> AppResult<Option<CurrentUser>> {
        let Some(account) = self.get_account().await? else {
            return Ok(None);
        };

        let existing = self
            .backend
            .list_documents(
                &self.collections.users,
                &[Query::equal("account_id", account.id.as_str()), Query::limit(1)],
            )
            .await?
            .into_models::<UserProfile>()?;

        let profile = match existing.into_iter().next() {
            Some(profile) => profile,
            None => {
                let avatar_name = if account.name.is_empty() {
                    "User"
                } else {
                    account.name.as_str()
                };
                let avatar = self.backend.avatar_initials(avatar_name)?;
                let name = if account.name.is_empty() {
                    "Unknown".to_string()
                } else {
                    account.name.clone()
                };
                let profile = self
                    .save_user_to_db(&NewProfile {
                        account_id: account.id.clone(),
                        username: username_from_name(&name),
                        name,
                        email: account.email.clone(),
                        image_url: avatar.to_string(),
                    })
                    .await?;
                tracing::info!("Created missing profile {} for account {}", profile.id, account.id);
                profile
            }
        };

        let saves = self.list_saved_records(&profile.id).await?;
        Ok(Some(CurrentUser { profile, saves }))
    }

    /// Like [`Gateway::try_get_current_user`], with failures logged and
    /// reported as "no user".
    pub async fn get_current_user(&self) -> Option<CurrentUser> {
        match self.try_get_current_user().await {
            Ok(user) => user,
            Err(e) => {
                tracing::error!("Failed to load current user: {}", e);
                None
            }
        }
    }

    /// End the current session. `Ok(None)` when there was none.
    pub async fn sign_out_account(&self) -> AppResult<Option<()>> {
        if self.get_account().await?.is_none() {
            tracing::debug!("No active session to delete");
            return Ok(None);
        }
        self.backend.delete_session(CURRENT_SESSION).await?;
        tracing::info!("Session deleted");
        Ok(Some(()))
    }
}

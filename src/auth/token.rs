use super::Authorizer;
use crate::credentials::Credential;
use crate::error::Result;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// The bearer token every API request carries, renewed in place when it runs out.
pub struct TokenSource {
    credential: Mutex<Credential>,
    authorizer: Option<Authorizer>,
}

impl TokenSource {
    /// A token that is used as-is and never renewed.
    pub fn fixed(credential: Credential) -> Self {
        Self {
            credential: Mutex::new(credential),
            authorizer: None,
        }
    }

    pub fn refreshing(credential: Credential, authorizer: Authorizer) -> Self {
        Self {
            credential: Mutex::new(credential),
            authorizer: Some(authorizer),
        }
    }

    /// Current access token, renewed first if it is about to expire.
    pub async fn bearer(&self) -> Result<String> {
        let mut credential = self.credential.lock().await;
        if credential.is_expired() && credential.has_refresh_token() {
            if let Some(authorizer) = &self.authorizer {
                match authorizer.renew(&credential).await {
                    Ok(fresh) => *credential = fresh,
                    Err(err) => warn!(%err, "Could not renew expiring access token"),
                }
            }
        }
        Ok(credential.access_token.clone())
    }

    /// Called after the server rejected `rejected`. Returns whether a different token is
    /// now available to resend with.
    pub async fn refresh_rejected(&self, rejected: &str) -> Result<bool> {
        let mut credential = self.credential.lock().await;
        if credential.access_token != rejected {
            return Ok(true);
        }
        let Some(authorizer) = &self.authorizer else {
            return Ok(false);
        };
        if !credential.has_refresh_token() {
            return Ok(false);
        }
        info!("Access token rejected, refreshing");
        *credential = authorizer.renew(&credential).await?;
        Ok(credential.access_token != rejected)
    }
}

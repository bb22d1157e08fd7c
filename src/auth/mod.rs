//! Delegated authorization: cached credentials first, an interactive code flow otherwise.

mod browser;
mod console;
mod token;

pub use browser::{parse_redirect, BrowserRedirect, Redirect};
pub use console::ConsolePrompt;
pub use token::TokenSource;

use crate::credentials::{Credential, CredentialStore};
use crate::error::{Error, Result, TransportKind};
use crate::expand_tilde;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge, RedirectUrl,
    RefreshToken, RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use std::fs;
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;

pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/youtube.upload",
    "https://www.googleapis.com/auth/youtube",
];

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Obtains a verification code for an authorization URL, or nothing if the user gave none.
#[async_trait]
pub trait CodeAcquirer: Send + Sync {
    /// Redirect target the strategy listens on, if it needs a specific one.
    fn redirect_uri(&self) -> Option<String> {
        None
    }

    async fn acquire(&self, authorize_url: &Url) -> Result<Option<String>>;
}

/// Adapts a plain function into a [`CodeAcquirer`].
pub struct CodeCallback<F>(pub F);

#[async_trait]
impl<F> CodeAcquirer for CodeCallback<F>
where
    F: Fn(&Url) -> Option<String> + Send + Sync,
{
    async fn acquire(&self, authorize_url: &Url) -> Result<Option<String>> {
        Ok((self.0)(authorize_url))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    redirect_uri: Option<String>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SecretsFile {
    Installed { installed: ClientSecrets },
    Web { web: ClientSecrets },
    Flat(ClientSecrets),
}

impl ClientSecrets {
    pub fn parse(content: &str) -> Result<Self> {
        let file: SecretsFile = serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse client secrets: {}", e)))?;
        Ok(match file {
            SecretsFile::Installed { installed } => installed,
            SecretsFile::Web { web } => web,
            SecretsFile::Flat(secrets) => secrets,
        })
    }

    pub fn load(config_path: &str) -> Result<Self> {
        let expanded_path = expand_tilde(config_path);
        let content = fs::read_to_string(&expanded_path).map_err(|e| {
            Error::Config(format!(
                "Failed to read client secrets from '{}': {}",
                expanded_path, e
            ))
        })?;
        Self::parse(&content)
    }

    pub fn redirect_uri(&self) -> &str {
        self.redirect_uri
            .as_deref()
            .or(self.redirect_uris.first().map(String::as_str))
            .unwrap_or(OOB_REDIRECT_URI)
    }
}

pub struct Authorizer {
    secrets: ClientSecrets,
    store: CredentialStore,
    /// Held across load, refresh and save so two renewals cannot overwrite each other.
    refreshing: Mutex<()>,
}

impl Authorizer {
    pub fn new(secrets: ClientSecrets, store: CredentialStore) -> Self {
        Self {
            secrets,
            store,
            refreshing: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Returns the stored credential when it is valid, otherwise runs the interactive flow.
    ///
    /// `Ok(None)` means the acquirer produced no code.
    pub async fn credential(&self, acquirer: &dyn CodeAcquirer) -> Result<Option<Credential>> {
        {
            let _refreshing = self.refreshing.lock().await;
            if let Some(cached) = self.store.load().filter(Credential::is_valid) {
                if !cached.is_expired() {
                    info!("Using stored credential");
                    return Ok(Some(cached));
                }
                match self.refresh_and_save(&cached).await {
                    Ok(fresh) => return Ok(Some(fresh)),
                    Err(err) => warn!(%err, "Could not refresh stored credential"),
                }
            }
        }
        self.interactive(acquirer).await
    }

    /// Exchanges the refresh token of `credential` for a new access token and stores it.
    ///
    /// A newer, unexpired token already in the store is returned instead.
    pub async fn renew(&self, credential: &Credential) -> Result<Credential> {
        let _refreshing = self.refreshing.lock().await;
        if let Some(stored) = self.store.load().filter(|stored| {
            stored.access_token != credential.access_token && !stored.is_expired()
        }) {
            return Ok(stored);
        }
        self.refresh_and_save(credential).await
    }

    async fn refresh_and_save(&self, credential: &Credential) -> Result<Credential> {
        let fresh = self.refresh(credential).await?;
        self.store.save(&fresh)?;
        info!("Refreshed access token");
        Ok(fresh)
    }

    async fn interactive(&self, acquirer: &dyn CodeAcquirer) -> Result<Option<Credential>> {
        let redirect = acquirer
            .redirect_uri()
            .unwrap_or_else(|| self.secrets.redirect_uri().to_string());
        let client = self.oauth_client(&redirect)?;
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = client.authorize_url(CsrfToken::new_random);
        for scope in SCOPES {
            request = request.add_scope(Scope::new(scope.to_string()));
        }
        let (authorize_url, _csrf_token) = request
            .add_extra_param("access_type", "offline")
            .set_pkce_challenge(pkce_challenge)
            .url();

        let Some(code) = acquirer.acquire(&authorize_url).await? else {
            return Ok(None);
        };

        let token = client
            .exchange_code(AuthorizationCode::new(code.trim().to_string()))
            .set_pkce_verifier(pkce_verifier)
            .request_async(async_http_client)
            .await
            .map_err(exchange_error)?;

        let credential = credential_from(&token, None);
        self.store.save(&credential)?;
        info!("Authentication successful");
        Ok(Some(credential))
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .clone()
            .ok_or_else(|| Error::Authentication("no refresh token".into()))?;
        let client = self.oauth_client(self.secrets.redirect_uri())?;
        let token = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request_async(async_http_client)
            .await
            .map_err(exchange_error)?;
        Ok(credential_from(&token, Some(&refresh_token)))
    }

    fn oauth_client(&self, redirect: &str) -> Result<BasicClient> {
        let config = |e: url::ParseError| Error::Config(format!("invalid OAuth endpoint: {}", e));
        Ok(BasicClient::new(
            ClientId::new(self.secrets.client_id.clone()),
            Some(ClientSecret::new(self.secrets.client_secret.clone())),
            AuthUrl::new(self.secrets.auth_uri.clone()).map_err(config)?,
            Some(TokenUrl::new(self.secrets.token_uri.clone()).map_err(config)?),
        )
        .set_redirect_uri(RedirectUrl::new(redirect.to_string()).map_err(config)?))
    }
}

fn credential_from(token: &BasicTokenResponse, previous_refresh: Option<&str>) -> Credential {
    let expires_at = token
        .expires_in()
        .map(|duration| Utc::now() + Duration::seconds(duration.as_secs() as i64));
    let scopes = match token.scopes() {
        Some(scopes) => scopes.iter().map(|s| s.to_string()).collect(),
        None => SCOPES.iter().map(|s| s.to_string()).collect(),
    };
    Credential {
        access_token: token.access_token().secret().clone(),
        refresh_token: token
            .refresh_token()
            .map(|t| t.secret().clone())
            .or(previous_refresh.map(str::to_string)),
        expires_at,
        scopes,
    }
}

fn exchange_error(
    err: RequestTokenError<oauth2::reqwest::Error<reqwest::Error>, BasicErrorResponse>,
) -> Error {
    match err {
        RequestTokenError::Request(inner) => Error::Transport {
            kind: TransportKind::Transport,
            message: inner.to_string(),
        },
        other => Error::AuthExchange(other.to_string()),
    }
}

//! API client for the Pawbase pet-registry REST API.
//!
//! One send path serves every data request: the current access token
//! is attached at send time, 429s are retried with backoff, and a 401
//! hands the failure to the refresh coordinator, which refreshes the
//! session at most once per cycle and lets the request replay once
//! with the new credentials. Callers never see a refresh-specific
//! error; a request either succeeds or fails with its own error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::{
    CredentialStore, Recovery, RefreshBackend, RefreshCoordinator, Session, SessionStore,
};
use crate::config::Config;
use crate::models::{
    AuthTokens, FaqEntry, ForgotPasswordRequest, LiabilityForm, LoginRequest, NewPet, Page,
    PageQuery, Pet, RefreshTokenRequest, RegisterRequest, ResetPasswordRequest, SearchRecord,
    User, UserUpdate, VerifyCodeRequest, VerifyEmailRequest,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for Pawbase.
/// Clone is cheap - reqwest::Client uses Arc internally for connection
/// pooling, and clones share the same session store and coordinator.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Create a client with its own fresh session store.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_store(base_url, SessionStore::new())
    }

    /// Create a client sharing an existing session store, so several
    /// clients (or a UI layer watching the logout signal) observe the
    /// same session.
    pub fn with_store(base_url: impl Into<String>, store: SessionStore) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            coordinator: Arc::new(RefreshCoordinator::new(store)),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(config.api_base_url.clone())
    }

    pub fn store(&self) -> &SessionStore {
        self.coordinator.store()
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Session {
        self.store().current()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ========================================================================
    // Auth endpoints
    // ========================================================================
    //
    // These go out without a bearer token and never consult the refresh
    // coordinator: a 401 from login *is* the answer, not a stale session.

    /// Authenticate and install the returned session.
    ///
    /// With `remember` set, the refresh token is also stored in the OS
    /// keychain for [`ApiClient::restore_session`]. Keychain failures
    /// are logged, not fatal; login already succeeded.
    pub async fn login(&self, request: &LoginRequest, remember: bool) -> Result<AuthTokens, ApiError> {
        let url = self.url("/api/v1/auth/login");
        let response = self.http.post(&url).json(request).send().await?;
        let tokens: AuthTokens = Self::read_json(Self::check(response).await?).await?;

        self.install_session(&tokens)?;
        debug!("login succeeded");

        if remember {
            if let Err(error) =
                CredentialStore::store_refresh_token(&request.email, &tokens.refresh_token)
            {
                warn!(%error, "could not store refresh token in keychain");
            }
        }
        Ok(tokens)
    }

    /// Register a new account and install the returned session.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthTokens, ApiError> {
        let url = self.url("/api/v1/auth/register");
        let response = self.http.post(&url).json(request).send().await?;
        let tokens: AuthTokens = Self::read_json(Self::check(response).await?).await?;

        self.install_session(&tokens)?;
        debug!("registration succeeded");
        Ok(tokens)
    }

    /// Restore a session from a keychain-stored refresh token.
    /// Returns false if no token is stored for the account or the
    /// keychain cannot be read.
    pub async fn restore_session(&self, email: &str) -> Result<bool, ApiError> {
        let stored = match CredentialStore::find_refresh_token(email) {
            Ok(Some(token)) => token,
            Ok(None) => return Ok(false),
            Err(error) => {
                warn!(%error, "could not read refresh token from keychain");
                return Ok(false);
            }
        };

        let tokens = RefreshBackend::refresh(self, &stored).await?;
        self.install_session(&tokens)?;

        // The server rotates refresh tokens; keep the keychain current.
        if let Err(error) = CredentialStore::store_refresh_token(email, &tokens.refresh_token) {
            warn!(%error, "could not update refresh token in keychain");
        }
        debug!("session restored from stored refresh token");
        Ok(true)
    }

    /// Clear the session and raise the forced-logout signal.
    pub fn logout(&self) {
        self.store().clear();
    }

    pub async fn forgot_password_request(
        &self,
        request: &ForgotPasswordRequest,
    ) -> Result<(), ApiError> {
        let url = self.url("/api/v1/auth/forgot-password/request");
        let response = self.http.post(&url).json(request).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn forgot_password_verify_code(
        &self,
        request: &VerifyCodeRequest,
    ) -> Result<(), ApiError> {
        let url = self.url("/api/v1/auth/forgot-password/verify-code");
        let response = self.http.post(&url).json(request).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn forgot_password_reset(
        &self,
        request: &ResetPasswordRequest,
    ) -> Result<(), ApiError> {
        let url = self.url("/api/v1/auth/forgot-password/reset-password");
        let response = self.http.post(&url).json(request).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Verify the email address of the logged-in account.
    pub async fn verify_email(&self, request: &VerifyEmailRequest) -> Result<(), ApiError> {
        let url = self.url("/api/v1/auth/email-verification/verify");
        self.dispatch(|http| http.post(&url).json(request)).await?;
        Ok(())
    }

    // ========================================================================
    // User endpoints
    // ========================================================================

    pub async fn get_me(&self) -> Result<User, ApiError> {
        let url = self.url("/api/v1/users/me");
        let response = self.dispatch(|http| http.get(&url)).await?;
        Self::read_json(response).await
    }

    pub async fn update_me(&self, update: &UserUpdate) -> Result<User, ApiError> {
        let url = self.url("/api/v1/users/me");
        let response = self.dispatch(|http| http.put(&url).json(update)).await?;
        Self::read_json(response).await
    }

    // ========================================================================
    // Pet endpoints
    // ========================================================================

    pub async fn list_pets(&self, query: &PageQuery) -> Result<Page<Pet>, ApiError> {
        let url = self.url("/api/v1/user/pets");
        let response = self.dispatch(|http| http.get(&url).query(query)).await?;
        Self::read_json(response).await
    }

    pub async fn get_pet(&self, pet_id: i64) -> Result<Pet, ApiError> {
        let url = self.url(&format!("/api/v1/user/pets/{}", pet_id));
        let response = self.dispatch(|http| http.get(&url)).await?;
        Self::read_json(response).await
    }

    pub async fn create_pet(&self, pet: &NewPet) -> Result<Pet, ApiError> {
        let url = self.url("/api/v1/user/pets");
        let response = self.dispatch(|http| http.post(&url).json(pet)).await?;
        Self::read_json(response).await
    }

    pub async fn update_pet(&self, pet: &Pet) -> Result<Pet, ApiError> {
        let url = self.url("/api/v1/user/pets");
        let response = self.dispatch(|http| http.put(&url).json(pet)).await?;
        Self::read_json(response).await
    }

    pub async fn delete_pet(&self, pet_id: i64) -> Result<(), ApiError> {
        let url = self.url(&format!("/api/v1/user/pets/{}", pet_id));
        self.dispatch(|http| http.delete(&url)).await?;
        Ok(())
    }

    // ========================================================================
    // Content endpoints
    // ========================================================================

    pub async fn list_faqs(&self, query: &PageQuery) -> Result<Page<FaqEntry>, ApiError> {
        let url = self.url("/api/v1/user/faq");
        let response = self.dispatch(|http| http.get(&url).query(query)).await?;
        Self::read_json(response).await
    }

    pub async fn list_liability_forms(&self) -> Result<Vec<LiabilityForm>, ApiError> {
        let url = self.url("/api/v1/user/liabilityform");
        let response = self.dispatch(|http| http.get(&url)).await?;
        Self::read_json(response).await
    }

    pub async fn get_liability_form(&self, form_id: i64) -> Result<LiabilityForm, ApiError> {
        let url = self.url(&format!("/api/v1/user/liabilityform/{}", form_id));
        let response = self.dispatch(|http| http.get(&url)).await?;
        Self::read_json(response).await
    }

    // ========================================================================
    // Organisation endpoints
    // ========================================================================

    /// Search the shared pet/user database.
    pub async fn search(&self, query: &PageQuery) -> Result<Page<SearchRecord>, ApiError> {
        let url = self.url("/api/v1/organisation/search");
        let response = self.dispatch(|http| http.get(&url).query(query)).await?;
        Self::read_json(response).await
    }

    // ========================================================================
    // Send path
    // ========================================================================

    /// Send an authenticated request, transparently refreshing the
    /// session on a 401 and replaying at most once.
    ///
    /// `make` rebuilds the request for each attempt, so a replay picks
    /// up the token the refresh just installed.
    async fn dispatch<F>(&self, make: F) -> Result<reqwest::Response, ApiError>
    where
        F: Fn(&Client) -> reqwest::RequestBuilder,
    {
        let mut replayed = false;
        let mut rate_retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            // Read the session at send time; a replay after a refresh
            // picks up the new token here.
            let session = self.session();
            let mut builder = make(&self.http);
            if let Some(token) = session.access_token() {
                builder = builder.bearer_auth(token);
            }

            // Transport errors pass straight through; only a 401
            // response involves the coordinator.
            let response = builder.send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if status == StatusCode::UNAUTHORIZED && !replayed {
                replayed = true;
                match self.coordinator.recover(self).await {
                    Recovery::Retry => {
                        debug!("replaying request after token refresh");
                        continue;
                    }
                    // The caller gets its own authorization error, not
                    // whatever the refresh call produced.
                    Recovery::GiveUp => return Err(ApiError::Unauthorized),
                }
            }

            if status == StatusCode::TOO_MANY_REQUESTS && rate_retries < MAX_RATE_LIMIT_RETRIES {
                rate_retries += 1;
                warn!(retry = rate_retries, backoff_ms, "rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }
    }

    fn install_session(&self, tokens: &AuthTokens) -> Result<(), ApiError> {
        let session =
            Session::authenticated(tokens.access_token.clone(), tokens.refresh_token.clone())
                .map_err(|e| ApiError::InvalidResponse(format!("undecodable access token: {e}")))?;
        self.store().replace(session);
        Ok(())
    }

    /// Check if response is successful, returning a mapped error if not.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response: {e}")))
    }
}

#[async_trait]
impl RefreshBackend for ApiClient {
    /// The raw refresh call. Exactly-once-per-cycle semantics are the
    /// coordinator's job; this just talks to the endpoint.
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, ApiError> {
        let url = self.url("/api/v1/auth/refresh-token");
        let response = self
            .http
            .post(&url)
            .json(&RefreshTokenRequest {
                refresh_token: refresh_token.to_string(),
            })
            .send()
            .await?;
        Self::read_json(Self::check(response).await?).await
    }
}

//! Google Sheets backend.
//!
//! Each lookup signs a fresh service-account assertion, trades it for an
//! access token, and reads the configured range in full. Nothing is cached
//! between lookups.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use super::{find_first_match, QuestionRecord, QuestionStore};
use crate::error::StoreError;

pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Assertion lifetime in seconds (Google caps this at one hour)
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// The fields of a service-account key file this backend needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        serde_json::from_str(json).map_err(|e| StoreError::Credentials(e.to_string()))
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

pub struct GoogleSheetsStore {
    client: Client,
    api_base: String,
    key: ServiceAccountKey,
    spreadsheet_id: String,
    range: String,
}

impl GoogleSheetsStore {
    pub fn new(
        client: Client,
        api_base: String,
        key: ServiceAccountKey,
        spreadsheet_id: String,
        range: String,
    ) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            key,
            spreadsheet_id,
            range,
        }
    }

    fn values_url(&self) -> String {
        format!(
            "{}/{}/values/{}",
            self.api_base,
            urlencoding::encode(&self.spreadsheet_id),
            urlencoding::encode(&self.range)
        )
    }

    fn signed_assertion(&self) -> Result<String, StoreError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: SHEETS_READONLY_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        Ok(jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }

    async fn access_token(&self) -> Result<String, StoreError> {
        let assertion = self.signed_assertion()?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let token: TokenResponse = ensure_success(response).await?.json().await?;
        Ok(token.access_token)
    }

    #[tracing::instrument(skip(self), fields(spreadsheet = %self.spreadsheet_id, range = %self.range))]
    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, StoreError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(self.values_url())
            .bearer_auth(token)
            .send()
            .await?;
        let range: ValueRange = ensure_success(response).await?.json().await?;
        tracing::debug!(rows = range.values.len(), "Fetched question sheet");
        Ok(range.values)
    }
}

async fn ensure_success(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl QuestionStore for GoogleSheetsStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<QuestionRecord>, StoreError> {
        let rows = self.fetch_rows().await?;
        find_first_match(&rows, code)
    }
}

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{Credentials, WidgetConfig};
use crate::constants::{PUBLIC_MEMBER, TOKEN_RESOURCE};
use crate::error::{Result, WidgetError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires: Duration,
}

#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self, credentials: &Credentials) -> Result<IssuedToken>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MemberTokenRequest<'a> {
    member: &'a str,
    api_key: &'a str,
    is_reference_id: bool,
    expires: u64,
    resource: &'a str,
}

#[derive(Deserialize)]
struct MemberTokenResponse {
    data: Option<MemberTokenData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberTokenData {
    jwt_token: Option<String>,
}

/// Issues member tokens from the HTTP token endpoint. A member token supplied
/// with the credentials is used as-is.
#[derive(Clone)]
pub struct HttpTokenIssuer {
    client: reqwest::Client,
    url: String,
    api_key: String,
    expires: Duration,
}

impl HttpTokenIssuer {
    pub fn new(config: &WidgetConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            url: config.auth_url.clone(),
            api_key: config.api_key.clone(),
            expires: config.token_expires,
        })
    }
}

pub(crate) fn token_request<'a>(
    credentials: &'a Credentials,
    api_key: &'a str,
    expires: Duration,
) -> MemberTokenRequest<'a> {
    let (member, is_reference_id) = match credentials.member_ref_id.as_deref() {
        Some(member_ref_id) if !member_ref_id.is_empty() => (member_ref_id, true),
        _ => (PUBLIC_MEMBER, false),
    };
    MemberTokenRequest {
        member,
        api_key,
        is_reference_id,
        expires: expires.as_millis() as u64,
        resource: TOKEN_RESOURCE,
    }
}

#[async_trait]
impl TokenIssuer for HttpTokenIssuer {
    async fn issue(&self, credentials: &Credentials) -> Result<IssuedToken> {
        if let Some(token) = credentials.member_token.as_deref().filter(|t| !t.is_empty()) {
            debug!("using supplied member token");
            return Ok(IssuedToken {
                token: token.to_string(),
                expires: self.expires,
            });
        }

        let body = token_request(credentials, &self.api_key, self.expires);
        let response = self
            .client
            .post(&self.url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|err| WidgetError::Auth(format!("token request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(WidgetError::Auth(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let payload: MemberTokenResponse = response
            .json()
            .await
            .map_err(|err| WidgetError::Auth(format!("invalid token response: {err}")))?;

        match payload
            .data
            .and_then(|data| data.jwt_token)
            .filter(|token| !token.is_empty())
        {
            Some(token) => Ok(IssuedToken {
                token,
                expires: self.expires,
            }),
            None => {
                warn!("member token response carried no jwtToken");
                Err(WidgetError::Auth("response missing jwtToken".to_string()))
            }
        }
    }
}

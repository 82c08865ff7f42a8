//! GraphQL client
//!
//! Every document aliases its root field to `result`, so one envelope type
//! decodes every response.

use crate::error::{PropelError, Result};
use poolflow_cloud::{ClientError, CreateResponse, FailureDetail};
use poolflow_config::PoolflowConfig;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Refresh a cached token this long before it expires
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone)]
enum Credentials {
    Token(String),
    Client { id: String, secret: String },
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Propel GraphQL API client
pub struct PropelClient {
    http: reqwest::Client,
    api_url: String,
    auth_url: String,
    credentials: Credentials,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for PropelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropelClient")
            .field("api_url", &self.api_url)
            .field("auth_url", &self.auth_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "Option::default")]
    data: Option<ResultField<T>>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct ResultField<T> {
    #[serde(default = "Option::default")]
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default)]
    extensions: Option<Extensions>,
}

#[derive(Debug, Deserialize)]
struct Extensions {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Mutation result: the entity, or a failure response
#[derive(Debug, Deserialize)]
pub(crate) struct Payload<E> {
    #[serde(default = "Option::default")]
    entity: Option<E>,
    #[serde(default)]
    error: Option<FailureDetail>,
}

impl<E> Payload<E> {
    pub(crate) fn into_created(self) -> std::result::Result<CreateResponse<E>, ClientError> {
        match (self.entity, self.error) {
            (_, Some(detail)) => Ok(CreateResponse::Failed(detail)),
            (Some(entity), None) => Ok(CreateResponse::Created(entity)),
            (None, None) => Err(PropelError::MissingData("created entity").into()),
        }
    }

    pub(crate) fn into_entity(self) -> std::result::Result<E, ClientError> {
        match (self.entity, self.error) {
            (_, Some(detail)) => Err(ClientError::Other(detail.to_string())),
            (Some(entity), None) => Ok(entity),
            (None, None) => Err(PropelError::MissingData("modified entity").into()),
        }
    }
}

/// Decode a GraphQL response body into the aliased `result` field
fn decode_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<Option<T>> {
    let envelope: Envelope<T> = serde_json::from_slice(body)?;
    if let Some(error) = envelope.errors.into_iter().next() {
        return Err(PropelError::GraphQl {
            message: error.message,
            code: error.extensions.and_then(|e| e.code),
        });
    }
    Ok(envelope.data.and_then(|d| d.result))
}

impl PropelClient {
    pub fn new(config: &PoolflowConfig) -> Result<Self> {
        let credentials = match (&config.token, &config.client_id, &config.client_secret) {
            (Some(token), _, _) => Credentials::Token(token.clone()),
            (None, Some(id), Some(secret)) => Credentials::Client {
                id: id.clone(),
                secret: secret.clone(),
            },
            _ => return Err(PropelError::MissingCredentials),
        };

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url(),
            auth_url: config.auth_url(),
            credentials,
            cached: Mutex::new(None),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Bearer token, exchanging client credentials when needed
    pub async fn access_token(&self) -> Result<String> {
        let (id, secret) = match &self.credentials {
            Credentials::Token(token) => return Ok(token.clone()),
            Credentials::Client { id, secret } => (id, secret),
        };

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at
        {
            return Ok(token.token.clone());
        }

        tracing::debug!(url = %self.auth_url, "requesting access token");
        let response = self
            .http
            .post(&self.auth_url)
            .basic_auth(id, Some(secret))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(PropelError::Auth(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                String::from_utf8_lossy(&body)
            )));
        }

        let token: TokenResponse = serde_json::from_slice(&body)?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        *cached = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    /// Execute a document and return its `result` field
    ///
    /// `None` means the server answered with a null result.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<Option<T>> {
        let token = self.access_token().await?;

        tracing::debug!(operation, "graphql request");
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            // GraphQL servers often report errors with a 4xx status
            return match decode_envelope::<Value>(&body) {
                Err(error @ PropelError::GraphQl { .. }) => Err(error),
                _ => Err(PropelError::Status {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                }),
            };
        }

        decode_envelope(&body)
    }

    /// Like [`PropelClient::graphql`], but a null result is NotFound
    pub(crate) async fn fetch<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
        id: &str,
    ) -> std::result::Result<T, ClientError> {
        self.graphql(operation, query, variables)
            .await?
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }

    /// Execute a mutation whose result must be present
    pub(crate) async fn mutate<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> std::result::Result<T, ClientError> {
        self.graphql(operation, query, variables)
            .await?
            .ok_or_else(|| PropelError::MissingData("mutation result").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolflow_cloud::ErrorClass;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Thing {
        id: String,
    }

    #[test]
    fn test_client_requires_credentials() {
        let err = PropelClient::new(&PoolflowConfig::default()).unwrap_err();
        assert!(matches!(err, PropelError::MissingCredentials));

        let config = PoolflowConfig {
            token: Some("t".to_string()),
            region: "eu-west-1".to_string(),
            ..PoolflowConfig::default()
        };
        let client = PropelClient::new(&config).unwrap();
        assert_eq!(client.api_url(), "https://api.eu-west-1.propeldata.com/graphql");
    }

    #[test]
    fn test_decode_envelope() {
        let body = br#"{"data":{"result":{"id":"DPO01"}}}"#;
        let thing: Option<Thing> = decode_envelope(body).unwrap();
        assert_eq!(thing, Some(Thing { id: "DPO01".into() }));

        let body = br#"{"data":{"result":null}}"#;
        assert_eq!(decode_envelope::<Thing>(body).unwrap(), None);
    }

    #[test]
    fn test_decode_envelope_not_found() {
        let body = br#"{"data":null,"errors":[{"message":"Data Pool not found","extensions":{"code":"NOT_FOUND"}}]}"#;
        let err = decode_envelope::<Thing>(body).unwrap_err();
        assert_eq!(ClientError::from(err).class(), ErrorClass::NotFound);
    }

    #[test]
    fn test_payload() {
        let created: Payload<Thing> =
            serde_json::from_value(json!({ "entity": { "id": "DSO01" } })).unwrap();
        assert_eq!(
            created.into_created().unwrap(),
            CreateResponse::Created(Thing { id: "DSO01".into() })
        );

        let failed: Payload<Thing> = serde_json::from_value(json!({
            "error": { "code": "CONNECTION_FAILED", "message": "could not reach warehouse" }
        }))
        .unwrap();
        match failed.into_created().unwrap() {
            CreateResponse::Failed(detail) => {
                assert_eq!(detail.message, "could not reach warehouse")
            }
            other => panic!("unexpected {other:?}"),
        }

        let failed: Payload<Thing> =
            serde_json::from_value(json!({ "error": { "message": "nope" } })).unwrap();
        assert_eq!(failed.into_entity(), Err(ClientError::Other("nope".into())));
    }
}

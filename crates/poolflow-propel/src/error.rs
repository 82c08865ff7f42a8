//! Propel transport error types

use poolflow_cloud::ClientError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PropelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("GraphQL error: {message}")]
    GraphQl {
        message: String,
        code: Option<String>,
    },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("no API token or client credentials configured")]
    MissingCredentials,

    #[error("response is missing {0}")]
    MissingData(&'static str),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] poolflow_config::ConfigError),
}

impl PropelError {
    pub fn is_not_found(&self) -> bool {
        match self {
            PropelError::Status { status, .. } => *status == 404,
            PropelError::GraphQl { code, .. } => code.as_deref() == Some("NOT_FOUND"),
            PropelError::Http(e) => e.status().is_some_and(|s| s.as_u16() == 404),
            _ => false,
        }
    }

    /// Rejected credentials, missing credentials or a denied request
    pub fn is_auth_failure(&self) -> bool {
        match self {
            PropelError::Auth(_) | PropelError::MissingCredentials => true,
            PropelError::Status { status, .. } => matches!(status, 401 | 403),
            PropelError::GraphQl { code, .. } => {
                matches!(code.as_deref(), Some("UNAUTHENTICATED" | "FORBIDDEN"))
            }
            PropelError::Http(e) => e.status().is_some_and(|s| matches!(s.as_u16(), 401 | 403)),
            _ => false,
        }
    }
}

impl From<PropelError> for ClientError {
    fn from(error: PropelError) -> Self {
        if error.is_not_found() {
            return ClientError::NotFound(error.to_string());
        }
        if error.is_auth_failure() {
            return ClientError::Transport(error.to_string());
        }
        match &error {
            PropelError::Http(_) => ClientError::Transport(error.to_string()),
            PropelError::Status { status, .. } if *status >= 500 => {
                ClientError::Transport(error.to_string())
            }
            _ => ClientError::Other(error.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PropelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let not_found = PropelError::GraphQl {
            message: "Data Pool not found".to_string(),
            code: Some("NOT_FOUND".to_string()),
        };
        assert!(ClientError::from(not_found).is_not_found());

        let missing = PropelError::Status {
            status: 404,
            body: String::new(),
        };
        assert!(ClientError::from(missing).is_not_found());

        let unavailable = PropelError::Status {
            status: 503,
            body: "upstream".to_string(),
        };
        assert!(matches!(
            ClientError::from(unavailable),
            ClientError::Transport(_)
        ));

        let rejected = PropelError::Auth("token endpoint returned 401: bad creds".to_string());
        assert_eq!(
            ClientError::from(rejected),
            ClientError::Transport(
                "authentication failed: token endpoint returned 401: bad creds".to_string()
            )
        );
        assert!(matches!(
            ClientError::from(PropelError::MissingCredentials),
            ClientError::Transport(_)
        ));

        for status in [401, 403] {
            let denied = PropelError::Status {
                status,
                body: "unauthorized".to_string(),
            };
            assert!(matches!(ClientError::from(denied), ClientError::Transport(_)));
        }

        let unauthenticated = PropelError::GraphQl {
            message: "invalid token".to_string(),
            code: Some("UNAUTHENTICATED".to_string()),
        };
        assert!(matches!(
            ClientError::from(unauthenticated),
            ClientError::Transport(_)
        ));

        let bad_input = PropelError::GraphQl {
            message: "table is required".to_string(),
            code: Some("BAD_USER_INPUT".to_string()),
        };
        assert_eq!(
            ClientError::from(bad_input),
            ClientError::Other("GraphQL error: table is required".to_string())
        );
    }
}

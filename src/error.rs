//! Error types for cluster discovery and individual probes.
//!
//! Discovery errors are fatal and end the run before any probe is sent.
//! Probe errors never escape the scheduler: they are folded into a denied
//! outcome and only survive as diagnostic text.

use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

/// Context used when the resource catalog or client setup fails.
pub const CLUSTER_ACCESS: &str = "Cluster access failed";

/// Context used when listing namespaces fails.
pub const NAMESPACE_LISTING: &str = "Fetching namespaces failed";

/// Fatal failure of a preflight step.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The API server rejected the credential.
    #[error("Unauthorized. Please check your credentials or token.")]
    Unauthorized { detail: String },

    /// The API server could not be reached at all.
    #[error("Cannot connect to server. Details: {detail}")]
    Unreachable { detail: String },

    /// No usable kubeconfig, in-cluster config or credentials.
    #[error("No valid cluster configuration found. Details: {detail}")]
    MisconfiguredEnvironment { detail: String },

    #[error("{context}.\nDetails: {detail}")]
    Unclassified {
        context: &'static str,
        detail: String,
    },
}

impl DiscoveryError {
    /// Classify a client error raised while performing `context`.
    pub fn classify(context: &'static str, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(response) if response.code == StatusCode::UNAUTHORIZED.as_u16() => {
                Self::Unauthorized {
                    detail: response.message,
                }
            }
            kube::Error::InferConfig(e) => Self::MisconfiguredEnvironment {
                detail: e.to_string(),
            },
            kube::Error::Auth(e) => Self::MisconfiguredEnvironment {
                detail: e.to_string(),
            },
            kube::Error::HyperError(e) => Self::Unreachable {
                detail: e.to_string(),
            },
            kube::Error::Service(e) => Self::Unreachable {
                detail: e.to_string(),
            },
            other => Self::from_message(context, other.to_string()),
        }
    }

    /// Classify a free-form error message by the phrases clients print.
    pub fn from_message(context: &'static str, detail: String) -> Self {
        let lowered = detail.to_lowercase();
        if lowered.contains("must be logged in") || lowered.contains("unauthorized") {
            Self::Unauthorized { detail }
        } else if lowered.contains("connection refused")
            || lowered.contains("no route to host")
            || lowered.contains("dns error")
        {
            Self::Unreachable { detail }
        } else if lowered.contains("kubeconfig") && lowered.contains("does not exist") {
            Self::MisconfiguredEnvironment { detail }
        } else {
            Self::Unclassified { context, detail }
        }
    }

    /// Raw detail, for logging.
    pub fn detail(&self) -> &str {
        match self {
            Self::Unauthorized { detail }
            | Self::Unreachable { detail }
            | Self::MisconfiguredEnvironment { detail }
            | Self::Unclassified { detail, .. } => detail,
        }
    }
}

impl From<kube::config::InferConfigError> for DiscoveryError {
    fn from(err: kube::config::InferConfigError) -> Self {
        Self::MisconfiguredEnvironment {
            detail: err.to_string(),
        }
    }
}

/// Failure of a single authorization probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("authorization request failed: {0}")]
    Transport(#[from] kube::Error),

    #[error("unable to build access review: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("access review came back without a status")]
    EmptyStatus,

    #[error("no answer within {0:?}")]
    Timeout(Duration),

    #[error("probe panicked")]
    Panicked,
}

#[cfg(test)]
mod tests {
    use kube::core::ErrorResponse;

    use super::*;

    fn api_error(code: u16, message: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: message.to_string(),
            reason: "".to_string(),
            code,
        })
    }

    #[test]
    fn unauthorized_status_is_classified() {
        let err = DiscoveryError::classify(CLUSTER_ACCESS, api_error(401, "Unauthorized"));
        assert!(matches!(err, DiscoveryError::Unauthorized { .. }));
        assert_eq!(
            err.to_string(),
            "Unauthorized. Please check your credentials or token."
        );
    }

    #[test]
    fn forbidden_status_is_unclassified() {
        let err = DiscoveryError::classify(
            NAMESPACE_LISTING,
            api_error(403, "namespaces is forbidden"),
        );
        match err {
            DiscoveryError::Unclassified { context, detail } => {
                assert_eq!(context, NAMESPACE_LISTING);
                assert!(detail.contains("forbidden"));
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn messages_are_classified_by_phrase() {
        let cases = [
            (
                "error: You must be logged in to the server",
                "Unauthorized",
            ),
            (
                "dial tcp 127.0.0.1:6443: connect: connection refused",
                "Unreachable",
            ),
            ("connect: No route to host", "Unreachable"),
            (
                "kubeconfig file /root/.kube/config does not exist",
                "MisconfiguredEnvironment",
            ),
            ("the server has gone fishing", "Unclassified"),
        ];
        for (message, expected) in cases {
            let err = DiscoveryError::from_message(CLUSTER_ACCESS, message.to_string());
            let actual = match err {
                DiscoveryError::Unauthorized { .. } => "Unauthorized",
                DiscoveryError::Unreachable { .. } => "Unreachable",
                DiscoveryError::MisconfiguredEnvironment { .. } => "MisconfiguredEnvironment",
                DiscoveryError::Unclassified { .. } => "Unclassified",
            };
            assert_eq!(actual, expected, "{message}");
        }
    }

    #[test]
    fn unclassified_message_carries_context_and_detail() {
        let err = DiscoveryError::from_message(CLUSTER_ACCESS, "boom".to_string());
        assert_eq!(err.to_string(), "Cluster access failed.\nDetails: boom");
        assert_eq!(err.detail(), "boom");
    }
}

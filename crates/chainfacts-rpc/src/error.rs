//! Error types for the JSON-RPC client.
//!
//! [`RpcError`] distinguishes failures to reach the node from answers the
//! node gave but that could not be used. It converts into the core's
//! [`RemoteError`] at the collaborator boundary.

use chainfacts_core::RemoteError;

/// Errors that can occur while talking to a JSON-RPC node.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// The HTTP request failed (connection, TLS, timeout).
    #[error("request failed: {0}")]
    Transport(String),

    /// The node answered with a non-success HTTP status.
    #[error("node returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The response body is not a valid JSON-RPC response.
    #[error("invalid response: {0}")]
    Decode(String),

    /// The node answered a request with an error object.
    #[error("{method} failed with code {code}: {message}")]
    Node {
        /// Method that failed.
        method: String,
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },

    /// A batch response had no entry for one of the requests.
    #[error("no response for request id {id}")]
    MissingResponse {
        /// Id of the unanswered request.
        id: u64,
    },
}

impl From<RpcError> for RemoteError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Transport(_) | RpcError::Status { .. } => Self::Transport {
                message: err.to_string(),
            },
            RpcError::Decode(_) | RpcError::MissingResponse { .. } => Self::Decode {
                message: err.to_string(),
            },
            RpcError::Node { code, message, .. } => Self::Rpc { code, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_into_remote_error() {
        let transport = RemoteError::from(RpcError::Transport("connection refused".to_owned()));
        assert!(matches!(transport, RemoteError::Transport { .. }));

        let missing = RemoteError::from(RpcError::MissingResponse { id: 3 });
        assert_eq!(
            missing,
            RemoteError::Decode {
                message: "no response for request id 3".to_owned()
            }
        );

        let node = RemoteError::from(RpcError::Node {
            method: "eth_getCode".to_owned(),
            code: -32000,
            message: "missing trie node".to_owned(),
        });
        assert_eq!(
            node,
            RemoteError::Rpc {
                code: -32000,
                message: "missing trie node".to_owned()
            }
        );
    }
}

//! Error types for the Congress.gov API client.

#[derive(Debug, thiserror::Error)]
pub enum CongressApiError {
    #[error("request to {url} failed")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest_middleware::Error,
    },
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("unreadable response from {url}")]
    ParseFailed {
        status: u16,
        url: String,
        #[source]
        source: super::json::DecodeError,
    },
    #[error("traversal of {url} stopped after {pages} pages")]
    IncompleteWalk { url: String, pages: u32 },
    #[error("invalid endpoint '{path}'")]
    InvalidEndpoint {
        path: String,
        #[source]
        source: url::ParseError,
    },
}

impl CongressApiError {
    /// HTTP status attached to the failure, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } | Self::ParseFailed { status, .. } => Some(*status),
            Self::RequestFailed { .. }
            | Self::IncompleteWalk { .. }
            | Self::InvalidEndpoint { .. } => None,
        }
    }
}

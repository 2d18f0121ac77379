// Error types for copydesk.
//
// Every failure a run can meet maps onto one [`CopydeskError`] variant. The
// variant decides how far the failure reaches: configuration errors stop the
// process before any row is touched, image errors only cost the featured
// image, and everything else fails the current row and lets the run go on.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CopydeskError {
    /// Required settings are missing or unusable. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The spreadsheet could not be read or written (auth, permissions, network).
    #[error("Spreadsheet access failed: {0}")]
    SourceAccess(String),

    /// The spreadsheet does not have the expected column layout.
    #[error("Unexpected spreadsheet layout: {0}")]
    SourceFormat(String),

    /// A linked document could not be fetched or its link is malformed.
    #[error("Document access failed: {0}")]
    DocumentAccess(String),

    /// The featured image could not be resolved, validated or uploaded.
    #[error("Image error: {0}")]
    Image(String),

    /// The publishing target rejected a request or could not be reached.
    ///
    /// `status` is `None` when no HTTP response was received.
    #[error("{}", publish_message(.status, .message))]
    Publish { status: Option<u16>, message: String },

    /// Reading from or drawing on the terminal failed.
    #[error("Terminal error: {0}")]
    Terminal(String),
}

fn publish_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Publishing failed (HTTP {}): {}", code, message),
        None => format!("Publishing failed: {}", message),
    }
}

impl CopydeskError {
    /// Whether a publish failure is worth retrying: no response at all,
    /// rate limiting, or a server-side error.
    pub fn is_transient(&self) -> bool {
        match self {
            CopydeskError::Publish { status: None, .. } => true,
            CopydeskError::Publish { status: Some(code), .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }

    pub(crate) fn publish_network(err: reqwest::Error) -> Self {
        CopydeskError::Publish {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for CopydeskError {
    fn from(err: std::io::Error) -> Self {
        CopydeskError::Terminal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CopydeskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_display_includes_status() {
        let err = CopydeskError::Publish {
            status: Some(400),
            message: "rest_invalid_param".into(),
        };
        assert!(err.to_string().contains("HTTP 400"));
        assert!(err.to_string().contains("rest_invalid_param"));
    }

    #[test]
    fn test_transient_classification() {
        let network = CopydeskError::Publish { status: None, message: "reset".into() };
        let limited = CopydeskError::Publish { status: Some(429), message: String::new() };
        let server = CopydeskError::Publish { status: Some(503), message: String::new() };
        let client = CopydeskError::Publish { status: Some(403), message: String::new() };
        let undecodable = CopydeskError::Publish { status: Some(201), message: "unreadable response".into() };

        assert!(!undecodable.is_transient());
        assert!(network.is_transient());
        assert!(limited.is_transient());
        assert!(server.is_transient());
        assert!(!client.is_transient());
        assert!(!CopydeskError::Image("bad".into()).is_transient());
    }
}

use reqwest::StatusCode;

/// Failure talking to an embedding or chat-completion provider.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Provider returned {status}: {message}")]
    HttpError { status: u16, message: String },
    #[error("Invalid provider response: {0}")]
    ParseError(String),
    #[error("Provider configuration error: {0}")]
    ConfigurationError(String),
}

impl ProviderError {
    /// Timeouts, transport failures, 5xx and 429 are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout(_) | ProviderError::NetworkError(_) => true,
            ProviderError::HttpError { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || (500..600).contains(status)
            }
            ProviderError::ParseError(_) | ProviderError::ConfigurationError(_) => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        // Classify before `without_url` consumes the error.
        let timed_out = error.is_timeout();
        let decode_failed = error.is_decode();
        let status = error.status();
        let message = error.without_url().to_string();

        if timed_out {
            ProviderError::Timeout(message)
        } else if decode_failed {
            ProviderError::ParseError(message)
        } else if let Some(status) = status {
            ProviderError::HttpError {
                status: status.as_u16(),
                message,
            }
        } else {
            ProviderError::NetworkError(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> ProviderError {
        ProviderError::HttpError {
            status,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Timeout("slow".to_string()).is_retryable());
        assert!(ProviderError::NetworkError("reset".to_string()).is_retryable());
        assert!(http(429).is_retryable());
        assert!(http(500).is_retryable());
        assert!(http(503).is_retryable());
    }

    #[test]
    fn test_terminal_classification() {
        assert!(!http(400).is_retryable());
        assert!(!http(401).is_retryable());
        assert!(!http(404).is_retryable());
        assert!(!ProviderError::ParseError("bad json".to_string()).is_retryable());
    }

    fn canned_response(status: u16, body: &'static str) -> reqwest::Response {
        let response = axum::http::Response::builder()
            .status(status)
            .body(body)
            .unwrap();
        reqwest::Response::from(response)
    }

    #[tokio::test]
    async fn test_reqwest_status_error_keeps_status() {
        let error = canned_response(429, "slow down").error_for_status().unwrap_err();

        let mapped = ProviderError::from(error);

        assert!(matches!(mapped, ProviderError::HttpError { status: 429, .. }));
        assert!(mapped.is_retryable());
    }

    #[tokio::test]
    async fn test_reqwest_decode_error_is_parse_error() {
        let error = canned_response(200, "not json")
            .json::<serde_json::Value>()
            .await
            .unwrap_err();

        let mapped = ProviderError::from(error);

        assert!(matches!(mapped, ProviderError::ParseError(_)));
        assert!(!mapped.is_retryable());
    }

    #[tokio::test]
    async fn test_reqwest_timeout_is_retryable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        // Accept the connection and never answer.
        let silent = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            drop(socket);
        });

        let error = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(50))
            .build()
            .unwrap()
            .get(format!("http://{}/v1/embeddings", address))
            .send()
            .await
            .unwrap_err();
        silent.abort();

        let mapped = ProviderError::from(error);

        assert!(matches!(mapped, ProviderError::Timeout(_)));
        assert!(mapped.is_retryable());
    }
}

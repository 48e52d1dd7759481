//! Keeping credentials out of logs
//!
//! The Stacks API key travels in [`Redacted`], and Ethereum RPC URLs, which
//! providers such as Alchemy or Infura key by path, are logged through
//! [`redact_url`].

use std::fmt::{self, Debug, Display};

use url::Url;

const PLACEHOLDER: &str = "<redacted>";

/// Credential that formats and serializes as `<redacted>`.
///
/// ```ignore
/// let key = Redacted("hiro-api-key".to_string());
/// tracing::debug!(api_key = %key, "Querying Stacks API");
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Redacted<T>(pub T);

impl<T> Redacted<T> {
    /// The wrapped value, for the one place it is actually sent
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(PLACEHOLDER)
    }
}

impl<T> Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(PLACEHOLDER)
    }
}

impl<T> serde::Serialize for Redacted<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        PLACEHOLDER.serialize(serializer)
    }
}

/// Scheme, host and port of an RPC URL; path, query and credentials are dropped
pub fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}://{}:{}", url.scheme(), host, port),
            (Some(host), None) => format!("{}://{}", url.scheme(), host),
            _ => PLACEHOLDER.to_string(),
        },
        Err(_) => PLACEHOLDER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_never_prints_value() {
        let secret = Redacted("hiro-secret");
        assert_eq!(format!("{}", secret), "<redacted>");
        assert_eq!(format!("{:?}", secret), "<redacted>");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"<redacted>\"");
        assert_eq!(*secret.expose(), "hiro-secret");
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("https://eth-sepolia.g.alchemy.com/v2/abcdef123"),
            "https://eth-sepolia.g.alchemy.com"
        );
        assert_eq!(
            redact_url("http://localhost:8545/?key=secret"),
            "http://localhost:8545"
        );
        assert_eq!(redact_url("not a url"), "<redacted>");
    }
}

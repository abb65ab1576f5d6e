use thiserror::Error;

/// Error taxonomy surfaced by the data layer. Tool handlers render these as
/// human-readable strings; the MCP envelope itself never fails for them.
///
/// `Clone` is required so coalesced fetches can hand the same failure to
/// every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("unknown symbol: {0}")]
    InvalidSymbol(String),

    #[error("network error: {0}")]
    Network(String),

    /// Upstream 402. The operation needs a higher subscription tier;
    /// never retried and never sent to the fallback source.
    #[error("payment required: {0}")]
    PaymentRequired(String),

    #[error("malformed upstream payload: {0}")]
    Parsing(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("rate limited by upstream")]
    RateLimit,

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("{0}")]
    Unknown(String),
}

impl ProviderError {
    /// Map a non-2xx upstream status to the matching error kind.
    pub fn from_status(status: u16, context: &str) -> Self {
        match status {
            402 => ProviderError::PaymentRequired(format!(
                "{context} is only available on a paid data plan (upstream returned 402)"
            )),
            404 => ProviderError::InvalidSymbol(context.to_string()),
            429 => ProviderError::RateLimit,
            s => ProviderError::Network(format!("{context}: upstream returned HTTP {s}")),
        }
    }

    pub fn from_transport(err: &reqwest::Error, context: &str) -> Self {
        if err.is_timeout() {
            ProviderError::Network(format!("{context}: request timed out"))
        } else {
            ProviderError::Network(format!("{context}: {err}"))
        }
    }
}

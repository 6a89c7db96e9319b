use crate::scraper::Provider;
use thiserror::Error;

/// Failures that end one interaction but never the process.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BotError {
    /// Non-2xx status, transport failure or a body we could not decode.
    #[error("{provider} request failed: {reason}")]
    Upstream { provider: Provider, reason: String },

    #[error("no results for {query:?}")]
    NotFound { query: String },

    /// The callback points at data the chat's session no longer holds.
    #[error("selection does not match the current session")]
    StaleSelection,
}

impl BotError {
    pub fn upstream(provider: Provider, reason: impl ToString) -> Self {
        BotError::Upstream { provider, reason: reason.to_string() }
    }
}

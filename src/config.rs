//! Client configuration.
//!
//! Every component receives an explicit, immutable [`ClientConfig`] at
//! construction time; there is no ambient or process-global state.

use crate::retry::RetryPolicy;
use std::time::Duration;
use url::Url;

/// Hard server-side limit: commands per batch call.
pub const MAX_BATCH_SIZE: usize = 50;

/// Page size used by both paginators.
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration shared by transport, batch assembler, paginators, and the
/// credential guard.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-request timeout. Cancellation is expressed only through this.
    pub timeout: Duration,
    /// Backoff policy for the temporarily-unavailable status.
    pub retry: RetryPolicy,
    /// Maximum commands per single batch call.
    pub max_batch_size: usize,
    /// Page size for offset and cursor pagination.
    pub page_size: u64,
    /// Whether the credential guard may refresh an expired token.
    pub auto_refresh: bool,
    /// The OAuth endpoint used for refresh-token exchanges.
    ///
    /// Required when `auto_refresh` is set for a token credential; unused
    /// for webhook credentials.
    pub token_endpoint: Option<Url>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            max_batch_size: MAX_BATCH_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            auto_refresh: true,
            token_endpoint: None,
        }
    }
}

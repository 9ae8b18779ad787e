//! Remote services: Upwork OAuth and API, and the Notion destination.

pub mod exchange;
pub mod notion;
pub mod oauth;
pub mod token_manager;
pub mod upwork;

#[cfg(test)]
mod token_manager_tests;

pub use exchange::{
    ClientCredentials, ExchangeClient, ExchangeFailure, ExchangeOutcome, Grant,
    HttpTokenTransport, RetryPolicy, TokenTransport, TransportError, TransportReply,
};
pub use notion::{NotionClient, PageProperties};
pub use oauth::{AuthorizationRequest, CallbackParams, TokenPayload};
pub use token_manager::{TokenManager, TokenStatus, REFRESH_SKEW_MS};
pub use upwork::{SourceFetcher, UpstreamReply, UpworkClient};

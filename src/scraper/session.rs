use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::ScrapeResult;
use super::fetcher::PageContext;
use super::fingerprint::Fingerprint;

/// A live, bootstrapped browser session.
///
/// Owned by exactly one job. `teardown` consumes the session, so nothing can
/// fetch through it afterwards.
#[async_trait]
pub trait LiveSession: PageContext {
    /// Cookies captured right after bootstrap, name to value
    fn cookies(&self) -> &BTreeMap<String, String>;

    /// Close the page, context and browser
    async fn teardown(self) -> ScrapeResult<()>;
}

/// Starts browser sessions impersonating the configured device
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    type Session: LiveSession + 'static;

    /// Launch, navigate to the seed page and read the fingerprint.
    ///
    /// Any failure here is fatal to the job and is not retried.
    async fn launch(&self) -> ScrapeResult<(Fingerprint, Self::Session)>;
}

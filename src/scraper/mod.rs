//! Session bootstrap, session-proxied API calls, pagination and embedded
//! state extraction.

pub mod browser;
pub mod endpoints;
pub mod fetcher;
pub mod fingerprint;
pub mod http_client;
pub mod models;
pub mod paginator;
pub mod params;
pub mod rate_limiter;
pub mod session;
pub mod state;

pub use browser::{BrowserSession, PlaywrightLauncher};
pub use endpoints::PlatformApi;
pub use fetcher::{api_headers, AuthenticatedFetcher, FetchResult, HeaderBundle, PageContext};
pub use fingerprint::Fingerprint;
pub use http_client::{HttpClient, PageResponse, PageSource};
pub use models::{CommentThread, PostItem};
pub use paginator::{Page, PageShape, Paginated, Paginator, StatusCheck, StopReason};
pub use params::{build_params, ParamSet};
pub use session::{LiveSession, SessionLauncher};
pub use state::{EmbeddedState, StateExtractor};

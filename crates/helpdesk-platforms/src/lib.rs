//! Clients for the marketplace and messaging platforms a helpdesk channel
//! can be connected to, and the pure transforms from their native records
//! onto the shared ticket model.

pub mod coupang;
pub mod error;
pub mod feed;
pub mod http;
pub mod kakao;
pub mod naver;
pub mod signing;
pub mod transform;

use std::sync::Arc;

use async_trait::async_trait;
use helpdesk_types::ChannelConfig;

pub use coupang::CoupangClient;
pub use error::PlatformError;
pub use feed::{
    ChannelRouting, Delivery, Feed, FeedPage, PageRequest, Platform, ReplyRoute, TransformContext,
    normalize, opening_message,
};
pub use kakao::KakaoClient;
pub use naver::NaverClient;

/// One connected platform account.
///
/// Neither call returns an error: transport and API failures arrive as
/// `success == false` in the result so a caller can keep going.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn platform(&self) -> Platform;

    async fn list(&self, feed: Feed, page: PageRequest) -> FeedPage;

    /// Sends `text` through `route` to `target` (an external id, or the
    /// customer id for TalkTalk).
    async fn deliver(&self, route: ReplyRoute, target: &str, text: &str) -> Delivery;
}

/// Builds the client for a channel config.
pub trait ClientFactory: Send + Sync {
    fn client_for(&self, config: &ChannelConfig) -> Result<Arc<dyn PlatformClient>, PlatformError>;
}

/// Per-platform base URL overrides. `None` uses the production host.
#[derive(Debug, Clone, Default)]
pub struct BaseUrls {
    pub kakao: Option<String>,
    pub naver: Option<String>,
    pub coupang: Option<String>,
}

/// Production factory: one HTTP client shared by every platform client it
/// builds.
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    http: reqwest::Client,
    base_urls: BaseUrls,
}

impl HttpClientFactory {
    pub fn new(base_urls: BaseUrls) -> Result<Self, PlatformError> {
        Ok(Self {
            http: http::build_http()?,
            base_urls,
        })
    }
}

impl ClientFactory for HttpClientFactory {
    fn client_for(&self, config: &ChannelConfig) -> Result<Arc<dyn PlatformClient>, PlatformError> {
        let http = self.http.clone();
        let client: Arc<dyn PlatformClient> = match config.channel_type.platform() {
            Platform::Kakao => {
                let client = KakaoClient::new(config, http)?;
                Arc::new(match &self.base_urls.kakao {
                    Some(url) => client.with_base_url(url),
                    None => client,
                })
            }
            Platform::Naver => {
                let client = NaverClient::new(config, http)?;
                Arc::new(match &self.base_urls.naver {
                    Some(url) => client.with_base_url(url),
                    None => client,
                })
            }
            Platform::Coupang => {
                let client = CoupangClient::new(config, http)?;
                Arc::new(match &self.base_urls.coupang {
                    Some(url) => client.with_base_url(url),
                    None => client,
                })
            }
        };
        Ok(client)
    }
}

//! In-process platform stand-ins for orchestrator and dispatcher tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use helpdesk_db::Database;
use helpdesk_platforms::{
    ChannelRouting, ClientFactory, Delivery, Feed, FeedPage, PageRequest, Platform, PlatformClient,
    PlatformError, ReplyRoute,
};
use helpdesk_types::api::UpsertChannelRequest;
use helpdesk_types::{ChannelConfig, ChannelType};
use serde_json::{Value, json};
use uuid::Uuid;

#[derive(Default)]
struct StubState {
    pages: HashMap<Feed, FeedPage>,
    failing_configs: HashSet<Uuid>,
    failing_delivery: Option<String>,
    list_calls: usize,
    deliveries: Vec<(ReplyRoute, String, String)>,
}

/// Serves canned pages per feed and records every call. Feeds without a
/// canned page list as empty.
#[derive(Default)]
pub struct StubFactory {
    state: Arc<Mutex<StubState>>,
}

impl StubFactory {
    pub fn page(&self, feed: Feed, records: Vec<Value>) {
        let total = records.len() as u64;
        self.state.lock().unwrap().pages.insert(feed, FeedPage::ok(records, total, false));
    }

    pub fn fail_feed(&self, feed: Feed, error: &str) {
        self.state.lock().unwrap().pages.insert(feed, FeedPage::failed(error));
    }

    pub fn fail_config(&self, config_id: Uuid) {
        self.state.lock().unwrap().failing_configs.insert(config_id);
    }

    pub fn fail_delivery(&self, error: &str) {
        self.state.lock().unwrap().failing_delivery = Some(error.to_string());
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn deliveries(&self) -> Vec<(ReplyRoute, String, String)> {
        self.state.lock().unwrap().deliveries.clone()
    }
}

impl ClientFactory for StubFactory {
    fn client_for(&self, config: &ChannelConfig) -> Result<Arc<dyn PlatformClient>, PlatformError> {
        if self.state.lock().unwrap().failing_configs.contains(&config.id) {
            return Err(PlatformError::missing("store_id", config.channel_type.as_str()));
        }
        Ok(Arc::new(StubClient {
            platform: config.channel_type.platform(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct StubClient {
    platform: Platform,
    state: Arc<Mutex<StubState>>,
}

#[async_trait]
impl PlatformClient for StubClient {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn list(&self, feed: Feed, _page: PageRequest) -> FeedPage {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        state
            .pages
            .get(&feed)
            .cloned()
            .unwrap_or_else(|| FeedPage::ok(Vec::new(), 0, false))
    }

    async fn deliver(&self, route: ReplyRoute, target: &str, text: &str) -> Delivery {
        let mut state = self.state.lock().unwrap();
        state.deliveries.push((route, target.to_string(), text.to_string()));
        match &state.failing_delivery {
            Some(error) => Delivery::failed(error.clone()),
            None => Delivery::ok(json!({ "ok": true })),
        }
    }
}

/// A fresh brand with one channel config of the given type.
pub fn seed_channel(
    db: &Database,
    channel_type: ChannelType,
    is_active: bool,
    api_key: Option<&str>,
) -> ChannelConfig {
    let brand = db.create_brand(&format!("{channel_type} brand"), None, None).unwrap();
    db.upsert_channel_config(&UpsertChannelRequest {
        brand_id: Some(brand.id),
        channel_type: Some(channel_type),
        api_key: api_key.map(str::to_string),
        api_secret: Some("secret".into()),
        store_id: Some("store".into()),
        is_active: Some(is_active),
        ..UpsertChannelRequest::default()
    })
    .unwrap()
}

//! Kakao business channel consultations.

use async_trait::async_trait;
use helpdesk_types::{ChannelConfig, ChannelType, Metadata, NewMessage, NewTicket, Priority, SenderType, TicketStatus};
use reqwest::RequestBuilder;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;
use uuid::Uuid;

use crate::error::{PlatformError, credential};
use crate::feed::{Delivery, Feed, FeedPage, PageRequest, Platform, ReplyRoute, TransformContext};
use crate::http::{execute, records};
use crate::transform::{FlexId, parse_platform_time, parse_record, require_id, subject_from};
use crate::PlatformClient;

pub const KAKAO_API_BASE: &str = "https://bizmessage-api.kakao.com";

const NAME: &str = "kakao";

pub struct KakaoClient {
    http: reqwest::Client,
    base_url: String,
    admin_key: String,
    channel_id: String,
}

impl KakaoClient {
    /// Needs the admin key (`api_key`) and the channel id (`store_id`).
    pub fn new(config: &ChannelConfig, http: reqwest::Client) -> Result<Self, PlatformError> {
        Ok(Self {
            http,
            base_url: KAKAO_API_BASE.to_string(),
            admin_key: credential(config.api_key.as_deref(), "api_key", NAME)?,
            channel_id: credential(config.store_id.as_deref(), "store_id (channel id)", NAME)?,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(AUTHORIZATION, format!("KakaoAK {}", self.admin_key))
            .header(CONTENT_TYPE, "application/json")
    }

    fn consultations_url(&self) -> String {
        format!("{}/v1/channels/{}/consultations", self.base_url, self.channel_id)
    }

    /// Consultations are cursor-paged; `None` starts from the newest.
    pub async fn consultations(&self, cursor: Option<&str>, limit: u32) -> Result<FeedPage, PlatformError> {
        let mut request = self
            .http
            .get(self.consultations_url())
            .query(&[("limit", limit.to_string())]);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        let body = execute(self.authorized(request)).await?;
        let data = records(&body, "consultations");
        let total = data.len() as u64;
        let has_more = body.get("has_more").and_then(Value::as_bool).unwrap_or(false);
        Ok(FeedPage::ok(data, total, has_more))
    }

    /// Message history of one consultation, oldest page first.
    pub async fn consultation_messages(
        &self,
        consultation_id: &str,
        cursor: Option<&str>,
    ) -> Result<Vec<Value>, PlatformError> {
        let mut request = self
            .http
            .get(format!("{}/{consultation_id}/messages", self.consultations_url()))
            .query(&[("limit", "100")]);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }
        let body = execute(self.authorized(request)).await?;
        Ok(records(&body, "messages"))
    }

    pub async fn send_message(&self, consultation_id: &str, text: &str) -> Result<Value, PlatformError> {
        let request = self
            .http
            .post(format!("{}/{consultation_id}/messages", self.consultations_url()));
        let payload = json!({ "message_type": "text", "content": { "text": text } });
        execute(self.authorized(request).json(&payload)).await
    }
}

#[async_trait]
impl PlatformClient for KakaoClient {
    fn platform(&self) -> Platform {
        Platform::Kakao
    }

    async fn list(&self, feed: Feed, page: PageRequest) -> FeedPage {
        let result = match feed {
            Feed::KakaoConsultations => self.consultations(None, page.size).await,
            other => Err(PlatformError::UnsupportedFeed { feed: other, platform: NAME }),
        };
        result.unwrap_or_else(|e| {
            warn!(channel_id = %self.channel_id, error = %e, "kakao consultation list failed");
            FeedPage::failed(e.to_string())
        })
    }

    async fn deliver(&self, route: ReplyRoute, target: &str, text: &str) -> Delivery {
        let result = match route {
            ReplyRoute::KakaoConsultationMessage => self.send_message(target, text).await,
            other => Err(PlatformError::UnsupportedRoute { route: other, platform: NAME }),
        };
        match result {
            Ok(data) => Delivery::ok(data),
            Err(e) => {
                warn!(consultation = %target, error = %e, "kakao message send failed");
                Delivery::failed(e.to_string())
            }
        }
    }
}

// -- Transforms --

#[derive(Debug, Deserialize)]
struct KakaoUser {
    id: Option<FlexId>,
    nickname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KakaoContent {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KakaoMessage {
    id: Option<FlexId>,
    sender_type: Option<String>,
    sender: Option<KakaoUser>,
    content: Option<KakaoContent>,
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Consultation {
    id: Option<FlexId>,
    user: Option<KakaoUser>,
    last_message: Option<KakaoMessage>,
    status: Option<String>,
}

pub fn consultation_to_ticket(record: &Value, ctx: &TransformContext) -> Result<NewTicket, PlatformError> {
    let consultation: Consultation = parse_record(record, "kakao consultation")?;
    let external_id = require_id(consultation.id, "kakao consultation")?;

    let (customer_name, customer_id) = match consultation.user {
        Some(user) => (user.nickname, user.id.map(FlexId::into_string)),
        None => (None, None),
    };
    let last_text = consultation
        .last_message
        .and_then(|m| m.content)
        .and_then(|c| c.text);

    let status = if consultation.status.as_deref() == Some("closed") {
        TicketStatus::Resolved
    } else {
        TicketStatus::Pending
    };

    Ok(NewTicket {
        brand_id: ctx.brand_id,
        channel_type: ChannelType::Kakao,
        external_id: Some(external_id),
        customer_name: Some(customer_name.unwrap_or_else(|| "Kakao customer".into())),
        customer_id,
        subject: subject_from(&[last_text.as_deref()], "KakaoTalk inquiry"),
        status,
        priority: Priority::Medium,
        order_number: None,
        product_name: None,
        metadata: Metadata::for_platform(NAME)
            .with("channel_id", ctx.account_id.clone())
            .with_original(record),
    })
}

/// One consultation message; `sender_type == "user"` is the customer.
pub fn message_from_record(record: &Value, ticket_id: Uuid) -> Result<NewMessage, PlatformError> {
    let message: KakaoMessage = parse_record(record, "kakao message")?;
    let sender_type = if message.sender_type.as_deref() == Some("user") {
        SenderType::Customer
    } else {
        SenderType::Agent
    };
    let sender_name = message
        .sender
        .and_then(|s| s.nickname)
        .unwrap_or_else(|| match sender_type {
            SenderType::Customer => "Customer".into(),
            SenderType::Agent => "Agent".into(),
        });

    Ok(NewMessage {
        ticket_id,
        external_id: message.id.map(FlexId::into_string),
        sender_type,
        sender_name: Some(sender_name),
        content: message.content.and_then(|c| c.text).unwrap_or_default(),
        created_at: parse_platform_time(message.created_at.as_deref()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::config;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx() -> TransformContext {
        TransformContext {
            brand_id: Uuid::new_v4(),
            channel_type: ChannelType::Kakao,
            account_id: Some("ch-1".into()),
        }
    }

    fn client(server: &MockServer) -> KakaoClient {
        KakaoClient::new(&config(ChannelType::Kakao), reqwest::Client::new())
            .unwrap()
            .with_base_url(server.uri())
    }

    #[test]
    fn closed_consultations_are_resolved() {
        let record = json!({
            "id": "c-1",
            "user": { "id": 77, "nickname": "Kim" },
            "last_message": { "content": { "text": "Is this in stock?" } },
            "status": "closed"
        });
        let ticket = consultation_to_ticket(&record, &ctx()).unwrap();
        assert_eq!(ticket.external_id.as_deref(), Some("c-1"));
        assert_eq!(ticket.customer_id.as_deref(), Some("77"));
        assert_eq!(ticket.subject, "Is this in stock?");
        assert_eq!(ticket.status, TicketStatus::Resolved);
        assert_eq!(ticket.metadata.platform(), Some("kakao"));
        assert_eq!(ticket.metadata.get("channel_id"), Some(&json!("ch-1")));
        assert_eq!(ticket.metadata.original_data(), Some(&record));
    }

    #[test]
    fn open_consultation_without_user_uses_defaults() {
        let ticket = consultation_to_ticket(&json!({ "id": 5, "status": "open" }), &ctx()).unwrap();
        assert_eq!(ticket.customer_name.as_deref(), Some("Kakao customer"));
        assert_eq!(ticket.subject, "KakaoTalk inquiry");
        assert_eq!(ticket.status, TicketStatus::Pending);
    }

    #[test]
    fn consultation_without_id_is_rejected() {
        let err = consultation_to_ticket(&json!({ "status": "open" }), &ctx()).unwrap_err();
        assert!(matches!(err, PlatformError::Transform(_)));
    }

    #[test]
    fn messages_map_sender_type() {
        let ticket_id = Uuid::new_v4();
        let user = message_from_record(
            &json!({ "id": "m1", "sender_type": "user", "content": { "text": "hi" } }),
            ticket_id,
        )
        .unwrap();
        assert_eq!(user.sender_type, SenderType::Customer);
        assert_eq!(user.sender_name.as_deref(), Some("Customer"));

        let agent = message_from_record(
            &json!({ "id": "m2", "sender_type": "manager", "sender": { "nickname": "Park" } }),
            ticket_id,
        )
        .unwrap();
        assert_eq!(agent.sender_type, SenderType::Agent);
        assert_eq!(agent.sender_name.as_deref(), Some("Park"));
        assert_eq!(agent.content, "");
    }

    #[tokio::test]
    async fn lists_consultations_with_admin_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/channels/store-1/consultations"))
            .and(query_param("limit", "100"))
            .and(header("authorization", "KakaoAK key-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "consultations": [{ "id": "c-1" }, { "id": "c-2" }],
                "has_more": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client(&server)
            .list(Feed::KakaoConsultations, Feed::KakaoConsultations.first_page())
            .await;
        assert!(page.success);
        assert_eq!(page.data.len(), 2);
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn list_failure_carries_platform_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "invalid admin key" })))
            .mount(&server)
            .await;

        let page = client(&server)
            .list(Feed::KakaoConsultations, Feed::KakaoConsultations.first_page())
            .await;
        assert!(!page.success);
        assert!(page.data.is_empty());
        assert!(page.error.unwrap().contains("invalid admin key"));
    }

    #[tokio::test]
    async fn reply_posts_text_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/channels/store-1/consultations/c-9/messages"))
            .and(body_json(json!({ "message_type": "text", "content": { "text": "On its way" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "m-1" })))
            .expect(1)
            .mount(&server)
            .await;

        let delivery = client(&server)
            .deliver(ReplyRoute::KakaoConsultationMessage, "c-9", "On its way")
            .await;
        assert!(delivery.success);
        assert_eq!(delivery.data, Some(json!({ "id": "m-1" })));
    }

    #[tokio::test]
    async fn foreign_routes_fail_without_a_request() {
        let server = MockServer::start().await;
        let delivery = client(&server)
            .deliver(ReplyRoute::CoupangInquiryAnswer, "1", "text")
            .await;
        assert!(!delivery.success);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn consultation_messages_follow_the_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/channels/store-1/consultations/c-9/messages"))
            .and(query_param("limit", "100"))
            .and(query_param("cursor", "next-2"))
            .and(header("authorization", "KakaoAK key-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [
                    { "id": "m1", "sender_type": "user", "content": { "text": "hi" } },
                    { "id": "m2", "sender_type": "manager", "content": { "text": "hello" } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let messages = client(&server)
            .consultation_messages("c-9", Some("next-2"))
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);

        let first = message_from_record(&messages[0], Uuid::new_v4()).unwrap();
        assert_eq!(first.sender_type, SenderType::Customer);
        assert_eq!(first.content, "hi");
    }
}

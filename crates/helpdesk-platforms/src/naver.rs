//! Naver Commerce: SmartStore product Q&A, TalkTalk, and Naver Pay claims
//! and customer inquiries. Every request is signed with the client secret.

use async_trait::async_trait;
use chrono::Utc;
use helpdesk_types::{
    ChannelConfig, ChannelType, Metadata, NewMessage, NewTicket, Priority, SenderType, TicketStatus,
};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;
use uuid::Uuid;

use crate::PlatformClient;
use crate::error::{PlatformError, credential};
use crate::feed::{Delivery, Feed, FeedPage, PageRequest, Platform, ReplyRoute, TransformContext};
use crate::http::{execute, records};
use crate::signing::naver_signature;
use crate::transform::{
    Flag, FlexId, non_blank, parse_platform_time, parse_record, require_id, subject_from,
};

pub const NAVER_API_BASE: &str = "https://api.commerce.naver.com";

const NAME: &str = "naver";

const INQUIRIES_PATH: &str = "/external/v1/seller/inquiries";
const TALK_PATH: &str = "/external/v1/seller/talk/messages";
const CLAIMS_PATH: &str = "/external/v1/seller/claims";
const CUSTOMER_INQUIRIES_PATH: &str = "/external/v1/seller/customer-inquiries";

pub struct NaverClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    access_token: Option<String>,
}

impl NaverClient {
    /// Needs the client id (`api_key`) and client secret (`api_secret`).
    pub fn new(config: &ChannelConfig, http: reqwest::Client) -> Result<Self, PlatformError> {
        Ok(Self {
            http,
            base_url: NAVER_API_BASE.to_string(),
            client_id: credential(config.api_key.as_deref(), "api_key (client id)", NAME)?,
            client_secret: credential(config.api_secret.as_deref(), "api_secret (client secret)", NAME)?,
            access_token: non_blank(config.access_token.clone()),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// The signature covers the path only, never the query string.
    fn signed(&self, method: Method, uri_path: &str) -> Result<RequestBuilder, PlatformError> {
        let timestamp = Utc::now().timestamp_millis();
        let signature = naver_signature(&self.client_secret, timestamp, method.as_str(), uri_path)?;

        let mut request = self
            .http
            .request(method, format!("{}{uri_path}", self.base_url))
            .header("x-ncp-apigw-timestamp", timestamp.to_string())
            .header("x-ncp-iam-access-key", &self.client_id)
            .header("x-ncp-apigw-signature-v2", signature)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        Ok(request)
    }

    async fn list_path(
        &self,
        uri_path: &str,
        page: PageRequest,
        filter: Option<(&str, &str)>,
    ) -> Result<FeedPage, PlatformError> {
        let mut query = vec![
            ("page", page.page.to_string()),
            ("size", page.size.to_string()),
        ];
        if let Some((key, value)) = filter {
            query.push((key, value.to_string()));
        }

        let body = execute(self.signed(Method::GET, uri_path)?.query(&query)).await?;
        let total = body.get("totalElements").and_then(Value::as_u64).unwrap_or(0);
        let has_more = body.get("last").and_then(Value::as_bool) == Some(false);
        Ok(FeedPage::ok(records(&body, "contents"), total, has_more))
    }

    /// Unanswered product Q&A.
    pub async fn product_inquiries(&self, page: PageRequest) -> Result<FeedPage, PlatformError> {
        self.list_path(INQUIRIES_PATH, page, Some(("answered", "false"))).await
    }

    pub async fn talk_messages(&self, page: PageRequest) -> Result<FeedPage, PlatformError> {
        self.list_path(TALK_PATH, page, None).await
    }

    /// Cancel, return and exchange claims still awaiting the seller.
    pub async fn order_claims(&self, page: PageRequest) -> Result<FeedPage, PlatformError> {
        self.list_path(CLAIMS_PATH, page, Some(("claimStatus", "CLAIM_REQUESTED"))).await
    }

    /// Unanswered Naver Pay center inquiries.
    pub async fn customer_inquiries(&self, page: PageRequest) -> Result<FeedPage, PlatformError> {
        self.list_path(CUSTOMER_INQUIRIES_PATH, page, Some(("answered", "false"))).await
    }

    pub async fn answer_inquiry(&self, inquiry_no: &str, answer: &str) -> Result<Value, PlatformError> {
        let uri_path = format!("{INQUIRIES_PATH}/{inquiry_no}/answer");
        let request = self.signed(Method::POST, &uri_path)?;
        execute(request.json(&json!({ "answerContent": answer }))).await
    }

    pub async fn send_talk_message(&self, member_id: &str, text: &str) -> Result<Value, PlatformError> {
        let request = self.signed(Method::POST, TALK_PATH)?;
        let payload = json!({ "memberId": member_id, "messageType": "TEXT", "textContent": text });
        execute(request.json(&payload)).await
    }
}

#[async_trait]
impl PlatformClient for NaverClient {
    fn platform(&self) -> Platform {
        Platform::Naver
    }

    async fn list(&self, feed: Feed, page: PageRequest) -> FeedPage {
        let result = match feed {
            Feed::NaverProductInquiries => self.product_inquiries(page).await,
            Feed::NaverTalkMessages => self.talk_messages(page).await,
            Feed::NaverOrderClaims => self.order_claims(page).await,
            Feed::NaverCustomerInquiries => self.customer_inquiries(page).await,
            other => Err(PlatformError::UnsupportedFeed { feed: other, platform: NAME }),
        };
        result.unwrap_or_else(|e| {
            warn!(?feed, error = %e, "naver list failed");
            FeedPage::failed(e.to_string())
        })
    }

    async fn deliver(&self, route: ReplyRoute, target: &str, text: &str) -> Delivery {
        let result = match route {
            ReplyRoute::NaverInquiryAnswer => self.answer_inquiry(target, text).await,
            ReplyRoute::NaverTalkMessage => self.send_talk_message(target, text).await,
            other => Err(PlatformError::UnsupportedRoute { route: other, platform: NAME }),
        };
        match result {
            Ok(data) => Delivery::ok(data),
            Err(e) => {
                warn!(?route, recipient = %target, error = %e, "naver reply failed");
                Delivery::failed(e.to_string())
            }
        }
    }
}

// -- Transforms --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Inquiry {
    inquiry_no: Option<FlexId>,
    member_id_masked: Option<String>,
    member_id: Option<FlexId>,
    title: Option<String>,
    content: Option<String>,
    #[serde(default)]
    answered: Flag,
    order_no: Option<FlexId>,
    product_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TalkMessage {
    message_no: Option<FlexId>,
    member_id_masked: Option<String>,
    member_id: Option<FlexId>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claim {
    claim_id: Option<FlexId>,
    orderer_name: Option<String>,
    orderer_id: Option<FlexId>,
    claim_type: Option<String>,
    claim_reason: Option<String>,
    order_no: Option<FlexId>,
    product_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConversationEntry {
    message_no: Option<FlexId>,
    inquiry_no: Option<FlexId>,
    member_id_masked: Option<String>,
    content: Option<String>,
    answer_content: Option<String>,
    created_at: Option<String>,
    registered_at: Option<String>,
}

fn metadata(channel_type: ChannelType, ctx: &TransformContext) -> Metadata {
    Metadata::for_platform(NAME)
        .with("channel_type", channel_type.as_str())
        .with("store_id", ctx.account_id.clone())
}

/// Product Q&A and Naver Pay customer inquiries share one record shape;
/// `channel_type` says which inbox the ticket belongs to.
pub fn inquiry_to_ticket(
    record: &Value,
    ctx: &TransformContext,
    channel_type: ChannelType,
) -> Result<NewTicket, PlatformError> {
    let inquiry: Inquiry = parse_record(record, "naver inquiry")?;
    let external_id = require_id(inquiry.inquiry_no, "naver inquiry")?;
    let fallback = match channel_type {
        ChannelType::Naverpay => "Naver Pay inquiry",
        _ => "SmartStore inquiry",
    };

    Ok(NewTicket {
        brand_id: ctx.brand_id,
        channel_type,
        external_id: Some(external_id),
        customer_name: Some(inquiry.member_id_masked.unwrap_or_else(|| "Naver customer".into())),
        customer_id: inquiry.member_id.map(FlexId::into_string),
        subject: subject_from(&[inquiry.title.as_deref(), inquiry.content.as_deref()], fallback),
        status: if inquiry.answered.0 {
            TicketStatus::Resolved
        } else {
            TicketStatus::Pending
        },
        priority: Priority::Medium,
        order_number: inquiry.order_no.map(FlexId::into_string),
        product_name: inquiry.product_name,
        metadata: metadata(channel_type, ctx).with_original(record),
    })
}

pub fn talk_to_ticket(record: &Value, ctx: &TransformContext) -> Result<NewTicket, PlatformError> {
    let talk: TalkMessage = parse_record(record, "naver talk message")?;
    let external_id = require_id(talk.message_no, "naver talk message")?;

    Ok(NewTicket {
        brand_id: ctx.brand_id,
        channel_type: ChannelType::SmartstoreTalk,
        external_id: Some(external_id),
        customer_name: Some(talk.member_id_masked.unwrap_or_else(|| "Naver customer".into())),
        customer_id: talk.member_id.map(FlexId::into_string),
        subject: subject_from(&[talk.content.as_deref()], "TalkTalk inquiry"),
        status: TicketStatus::Pending,
        priority: Priority::Medium,
        order_number: None,
        product_name: None,
        metadata: metadata(ChannelType::SmartstoreTalk, ctx).with_original(record),
    })
}

/// Cancels and returns are urgent; exchanges and unknown types are not.
pub fn claim_to_ticket(record: &Value, ctx: &TransformContext) -> Result<NewTicket, PlatformError> {
    let claim: Claim = parse_record(record, "naver claim")?;
    let external_id = require_id(claim.claim_id, "naver claim")?;
    let claim_type = claim.claim_type.unwrap_or_else(|| "CLAIM".into());
    let priority = match claim_type.as_str() {
        "CANCEL" | "RETURN" => Priority::High,
        _ => Priority::Medium,
    };
    let reason = subject_from(&[claim.claim_reason.as_deref()], "Naver Pay request");

    Ok(NewTicket {
        brand_id: ctx.brand_id,
        channel_type: ChannelType::Naverpay,
        external_id: Some(external_id),
        customer_name: Some(claim.orderer_name.unwrap_or_else(|| "Naver Pay customer".into())),
        customer_id: claim.orderer_id.map(FlexId::into_string),
        subject: format!("[{claim_type}] {reason}"),
        status: TicketStatus::Pending,
        priority,
        order_number: claim.order_no.map(FlexId::into_string),
        product_name: claim.product_name,
        metadata: metadata(ChannelType::Naverpay, ctx)
            .with("claim_type", claim_type.as_str())
            .with_original(record),
    })
}

/// A talk message, inquiry or answer as a conversation entry.
pub fn message_from_record(
    record: &Value,
    ticket_id: Uuid,
    sender_type: SenderType,
) -> Result<NewMessage, PlatformError> {
    let entry: ConversationEntry = parse_record(record, "naver message")?;
    let sender_name = match sender_type {
        SenderType::Customer => entry.member_id_masked.unwrap_or_else(|| "Customer".into()),
        SenderType::Agent => "Agent".into(),
    };

    Ok(NewMessage {
        ticket_id,
        external_id: entry.message_no.or(entry.inquiry_no).map(FlexId::into_string),
        sender_type,
        sender_name: Some(sender_name),
        content: entry.content.or(entry.answer_content).unwrap_or_default(),
        created_at: parse_platform_time(entry.created_at.or(entry.registered_at).as_deref()),
    })
}

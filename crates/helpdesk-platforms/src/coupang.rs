//! Coupang Wing seller API: customer inquiries, return requests and cancel
//! requests for one vendor.

use async_trait::async_trait;
use chrono::Utc;
use helpdesk_types::{
    ChannelConfig, ChannelType, Metadata, NewMessage, NewTicket, Priority, SenderType, TicketStatus,
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;
use uuid::Uuid;

use crate::PlatformClient;
use crate::error::{PlatformError, credential};
use crate::feed::{Delivery, Feed, FeedPage, PageRequest, Platform, ReplyRoute, TransformContext};
use crate::http::{execute, records};
use crate::signing::{coupang_authorization, coupang_datetime, coupang_signature};
use crate::transform::{Flag, FlexId, parse_platform_time, parse_record, require_id, subject_from};

pub const COUPANG_API_BASE: &str = "https://api-gateway.coupang.com";

const NAME: &str = "coupang";

pub struct CoupangClient {
    http: reqwest::Client,
    base_url: String,
    access_key: String,
    secret_key: String,
    vendor_id: String,
}

impl CoupangClient {
    /// Needs the access key (`api_key`), secret key (`api_secret`) and
    /// vendor id (`store_id`).
    pub fn new(config: &ChannelConfig, http: reqwest::Client) -> Result<Self, PlatformError> {
        Ok(Self {
            http,
            base_url: COUPANG_API_BASE.to_string(),
            access_key: credential(config.api_key.as_deref(), "api_key (access key)", NAME)?,
            secret_key: credential(config.api_secret.as_deref(), "api_secret (secret key)", NAME)?,
            vendor_id: credential(config.store_id.as_deref(), "store_id (vendor id)", NAME)?,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn vendor_path(&self, tail: &str) -> String {
        format!("/v2/providers/seller_api/apis/api/v1/vendors/{}/{tail}", self.vendor_id)
    }

    /// Headers go on before any body so `json()` keeps the charset content type.
    fn signed(&self, method: Method, uri_path: &str) -> Result<RequestBuilder, PlatformError> {
        let datetime = coupang_datetime(Utc::now());
        let signature = coupang_signature(&self.secret_key, &datetime, method.as_str(), uri_path)?;

        Ok(self
            .http
            .request(method, format!("{}{uri_path}", self.base_url))
            .header(AUTHORIZATION, coupang_authorization(&self.access_key, &datetime, &signature))
            .header(CONTENT_TYPE, "application/json;charset=UTF-8")
            .header("X-EXTENDED-TIMEOUT", "90000"))
    }

    async fn list_path(
        &self,
        tail: &str,
        page: PageRequest,
        filter: Option<(&str, &str)>,
    ) -> Result<FeedPage, PlatformError> {
        let mut query = vec![
            ("page", page.page.to_string()),
            ("pageSize", page.size.to_string()),
        ];
        if let Some((key, value)) = filter {
            query.push((key, value.to_string()));
        }

        let uri_path = self.vendor_path(tail);
        let body = execute(self.signed(Method::GET, &uri_path)?.query(&query)).await?;
        let pagination = body.get("pagination");
        let total = pagination
            .and_then(|p| p.get("totalElements"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let total_pages = pagination
            .and_then(|p| p.get("totalPages"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Ok(FeedPage::ok(records(&body, "data"), total, total_pages > u64::from(page.page)))
    }

    /// Unanswered inquiries only.
    pub async fn inquiries(&self, page: PageRequest) -> Result<FeedPage, PlatformError> {
        self.list_path("inquiries", page, Some(("answered", "N"))).await
    }

    pub async fn return_requests(&self, page: PageRequest) -> Result<FeedPage, PlatformError> {
        self.list_path("return-requests", page, Some(("status", "REQUESTED"))).await
    }

    pub async fn cancel_requests(&self, page: PageRequest) -> Result<FeedPage, PlatformError> {
        self.list_path("cancel-requests", page, None).await
    }

    /// One inquiry with its full thread; `None` when the platform has no data for it.
    pub async fn inquiry_detail(&self, inquiry_id: &str) -> Result<Option<Value>, PlatformError> {
        let uri_path = self.vendor_path(&format!("inquiries/{inquiry_id}"));
        let body = execute(self.signed(Method::GET, &uri_path)?).await?;
        Ok(body.get("data").filter(|d| !d.is_null()).cloned())
    }

    pub async fn answer_inquiry(&self, inquiry_id: &str, answer: &str) -> Result<Value, PlatformError> {
        let uri_path = self.vendor_path(&format!("inquiries/{inquiry_id}/answers"));
        let request = self.signed(Method::POST, &uri_path)?;
        execute(request.json(&json!({ "content": answer }))).await
    }
}

#[async_trait]
impl PlatformClient for CoupangClient {
    fn platform(&self) -> Platform {
        Platform::Coupang
    }

    async fn list(&self, feed: Feed, page: PageRequest) -> FeedPage {
        let result = match feed {
            Feed::CoupangInquiries => self.inquiries(page).await,
            Feed::CoupangReturnRequests => self.return_requests(page).await,
            Feed::CoupangCancelRequests => self.cancel_requests(page).await,
            other => Err(PlatformError::UnsupportedFeed { feed: other, platform: NAME }),
        };
        result.unwrap_or_else(|e| {
            warn!(vendor_id = %self.vendor_id, ?feed, error = %e, "coupang list failed");
            FeedPage::failed(e.to_string())
        })
    }

    async fn deliver(&self, route: ReplyRoute, target: &str, text: &str) -> Delivery {
        let result = match route {
            ReplyRoute::CoupangInquiryAnswer => self.answer_inquiry(target, text).await,
            other => Err(PlatformError::UnsupportedRoute { route: other, platform: NAME }),
        };
        match result {
            Ok(data) => Delivery::ok(data),
            Err(e) => {
                warn!(inquiry = %target, error = %e, "coupang answer failed");
                Delivery::failed(e.to_string())
            }
        }
    }
}

// -- Transforms --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKind {
    Return,
    Cancel,
}

impl ClaimKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Return => "return",
            Self::Cancel => "cancel",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Return => "Return",
            Self::Cancel => "Cancel",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Inquiry {
    inquiry_id: Option<FlexId>,
    customer_name: Option<String>,
    customer_id: Option<FlexId>,
    title: Option<String>,
    content: Option<String>,
    #[serde(default)]
    answered: Flag,
    inquiry_type: Option<String>,
    order_id: Option<FlexId>,
    product_name: Option<String>,
    product_id: Option<FlexId>,
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimRequest {
    receipt_id: Option<FlexId>,
    cancel_id: Option<FlexId>,
    customer_name: Option<String>,
    customer_id: Option<FlexId>,
    reason: Option<String>,
    order_id: Option<FlexId>,
    product_name: Option<String>,
}

fn metadata(ctx: &TransformContext) -> Metadata {
    Metadata::for_platform(NAME).with("vendor_id", ctx.account_id.clone())
}

/// `CLAIM`-type inquiries are urgent.
pub fn inquiry_to_ticket(record: &Value, ctx: &TransformContext) -> Result<NewTicket, PlatformError> {
    let inquiry: Inquiry = parse_record(record, "coupang inquiry")?;
    let external_id = require_id(inquiry.inquiry_id, "coupang inquiry")?;
    let priority = if inquiry.inquiry_type.as_deref() == Some("CLAIM") {
        Priority::High
    } else {
        Priority::Medium
    };

    Ok(NewTicket {
        brand_id: ctx.brand_id,
        channel_type: ChannelType::Coupang,
        external_id: Some(external_id),
        customer_name: Some(inquiry.customer_name.unwrap_or_else(|| "Coupang customer".into())),
        customer_id: inquiry.customer_id.map(FlexId::into_string),
        subject: subject_from(&[inquiry.title.as_deref(), inquiry.content.as_deref()], "Coupang inquiry"),
        status: if inquiry.answered.0 {
            TicketStatus::Resolved
        } else {
            TicketStatus::Pending
        },
        priority,
        order_number: inquiry.order_id.map(FlexId::into_string),
        product_name: inquiry.product_name,
        metadata: metadata(ctx)
            .with("inquiry_type", inquiry.inquiry_type)
            .with("product_id", inquiry.product_id.map(FlexId::into_string))
            .with_original(record),
    })
}

/// Returns carry `receiptId`, cancellations `cancelId`.
pub fn claim_to_ticket(
    record: &Value,
    ctx: &TransformContext,
    kind: ClaimKind,
) -> Result<NewTicket, PlatformError> {
    let claim: ClaimRequest = parse_record(record, "coupang claim")?;
    let external_id = require_id(claim.receipt_id.or(claim.cancel_id), "coupang claim")?;
    let reason = subject_from(&[claim.reason.as_deref()], "Request");

    Ok(NewTicket {
        brand_id: ctx.brand_id,
        channel_type: ChannelType::Coupang,
        external_id: Some(external_id),
        customer_name: Some(claim.customer_name.unwrap_or_else(|| "Coupang customer".into())),
        customer_id: claim.customer_id.map(FlexId::into_string),
        subject: format!("[{}] {reason}", kind.label()),
        status: TicketStatus::Pending,
        priority: Priority::High,
        order_number: claim.order_id.map(FlexId::into_string),
        product_name: claim.product_name,
        metadata: metadata(ctx)
            .with("claim_type", kind.as_str())
            .with_original(record),
    })
}

/// The customer's question inside an inquiry record.
pub fn message_from_inquiry(record: &Value, ticket_id: Uuid) -> Result<NewMessage, PlatformError> {
    let inquiry: Inquiry = parse_record(record, "coupang inquiry")?;
    Ok(NewMessage {
        ticket_id,
        external_id: inquiry.inquiry_id.map(FlexId::into_string),
        sender_type: SenderType::Customer,
        sender_name: Some(inquiry.customer_name.unwrap_or_else(|| "Customer".into())),
        content: inquiry.content.unwrap_or_default(),
        created_at: parse_platform_time(inquiry.created_at.as_deref()),
    })
}

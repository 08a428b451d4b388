//! The closed tables that tie a channel type to its list endpoints, its
//! reply call and its transforms. Every mapping is an exhaustive match, so
//! adding a channel type fails to compile until each table handles it.

use helpdesk_types::{ChannelConfig, ChannelType, NewMessage, NewTicket, Ticket};
use serde_json::Value;
use uuid::Uuid;

use crate::error::PlatformError;
use crate::{coupang, kakao, naver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Kakao,
    Naver,
    Coupang,
}

impl Platform {
    pub fn name(self) -> &'static str {
        match self {
            Self::Kakao => "kakao",
            Self::Naver => "naver",
            Self::Coupang => "coupang",
        }
    }
}

/// One list endpoint on one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    KakaoConsultations,
    NaverProductInquiries,
    NaverTalkMessages,
    NaverOrderClaims,
    NaverCustomerInquiries,
    CoupangInquiries,
    CoupangReturnRequests,
    CoupangCancelRequests,
}

impl Feed {
    pub fn platform(self) -> Platform {
        match self {
            Self::KakaoConsultations => Platform::Kakao,
            Self::NaverProductInquiries
            | Self::NaverTalkMessages
            | Self::NaverOrderClaims
            | Self::NaverCustomerInquiries => Platform::Naver,
            Self::CoupangInquiries | Self::CoupangReturnRequests | Self::CoupangCancelRequests => {
                Platform::Coupang
            }
        }
    }

    /// First page at the platform's usual page size.
    pub fn first_page(self) -> PageRequest {
        let size = match self.platform() {
            Platform::Kakao | Platform::Naver => 100,
            Platform::Coupang => 50,
        };
        PageRequest { page: 1, size }
    }
}

/// The outbound call used to answer a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyRoute {
    /// Message into a Kakao consultation, addressed by consultation id.
    KakaoConsultationMessage,
    /// Answer to a Naver inquiry, addressed by inquiry number.
    NaverInquiryAnswer,
    /// TalkTalk message, addressed by the customer's member id.
    NaverTalkMessage,
    /// Answer to a Coupang inquiry, addressed by inquiry id.
    CoupangInquiryAnswer,
}

impl ReplyRoute {
    /// The platform identifier the route addresses on this ticket.
    pub fn target<'a>(self, ticket: &'a Ticket) -> Option<&'a str> {
        match self {
            Self::KakaoConsultationMessage | Self::NaverInquiryAnswer | Self::CoupangInquiryAnswer => {
                ticket.external_id.as_deref()
            }
            Self::NaverTalkMessage => ticket.customer_id.as_deref(),
        }
    }
}

/// Channel-type lookups. Implemented on the shared enum so call sites read
/// `config.channel_type.feeds()`.
pub trait ChannelRouting {
    fn platform(self) -> Platform;
    fn feeds(self) -> &'static [Feed];
    fn reply_route(self) -> ReplyRoute;
}

impl ChannelRouting for ChannelType {
    fn platform(self) -> Platform {
        match self {
            ChannelType::Kakao => Platform::Kakao,
            ChannelType::SmartstoreInquiry | ChannelType::SmartstoreTalk | ChannelType::Naverpay => {
                Platform::Naver
            }
            ChannelType::Coupang => Platform::Coupang,
        }
    }

    fn feeds(self) -> &'static [Feed] {
        match self {
            ChannelType::Kakao => &[Feed::KakaoConsultations],
            ChannelType::SmartstoreInquiry => &[Feed::NaverProductInquiries],
            ChannelType::SmartstoreTalk => &[Feed::NaverTalkMessages],
            ChannelType::Naverpay => &[Feed::NaverOrderClaims, Feed::NaverCustomerInquiries],
            ChannelType::Coupang => &[
                Feed::CoupangInquiries,
                Feed::CoupangReturnRequests,
                Feed::CoupangCancelRequests,
            ],
        }
    }

    fn reply_route(self) -> ReplyRoute {
        match self {
            ChannelType::Kakao => ReplyRoute::KakaoConsultationMessage,
            ChannelType::SmartstoreInquiry | ChannelType::Naverpay => ReplyRoute::NaverInquiryAnswer,
            ChannelType::SmartstoreTalk => ReplyRoute::NaverTalkMessage,
            ChannelType::Coupang => ReplyRoute::CoupangInquiryAnswer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

/// Result of one list call. Failures never escape as errors; they arrive
/// here with `success == false` and no data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedPage {
    pub success: bool,
    pub data: Vec<Value>,
    pub total_count: u64,
    pub has_more: bool,
    pub error: Option<String>,
}

impl FeedPage {
    pub fn ok(data: Vec<Value>, total_count: u64, has_more: bool) -> Self {
        Self {
            success: true,
            data,
            total_count,
            has_more,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Result of one outbound reply call.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl Delivery {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// What a transform needs to know about the channel a record came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformContext {
    pub brand_id: Uuid,
    pub channel_type: ChannelType,
    /// Kakao channel id, Naver store id or Coupang vendor id.
    pub account_id: Option<String>,
}

impl TransformContext {
    pub fn from_config(config: &ChannelConfig) -> Self {
        Self {
            brand_id: config.brand_id,
            channel_type: config.channel_type,
            account_id: config.store_id.clone(),
        }
    }
}

/// Maps one native record from `feed` onto the ticket model.
pub fn normalize(feed: Feed, record: &Value, ctx: &TransformContext) -> Result<NewTicket, PlatformError> {
    match feed {
        Feed::KakaoConsultations => kakao::consultation_to_ticket(record, ctx),
        Feed::NaverProductInquiries => {
            naver::inquiry_to_ticket(record, ctx, ChannelType::SmartstoreInquiry)
        }
        Feed::NaverCustomerInquiries => naver::inquiry_to_ticket(record, ctx, ChannelType::Naverpay),
        Feed::NaverTalkMessages => naver::talk_to_ticket(record, ctx),
        Feed::NaverOrderClaims => naver::claim_to_ticket(record, ctx),
        Feed::CoupangInquiries => coupang::inquiry_to_ticket(record, ctx),
        Feed::CoupangReturnRequests => coupang::claim_to_ticket(record, ctx, coupang::ClaimKind::Return),
        Feed::CoupangCancelRequests => coupang::claim_to_ticket(record, ctx, coupang::ClaimKind::Cancel),
    }
}

/// The customer's first message carried by a record, for feeds whose
/// records are conversations. Claim feeds carry none.
pub fn opening_message(feed: Feed, record: &Value, ticket_id: Uuid) -> Option<NewMessage> {
    let message = match feed {
        Feed::KakaoConsultations => {
            let last = record.get("last_message").filter(|v| v.is_object())?;
            kakao::message_from_record(last, ticket_id).ok()?
        }
        Feed::NaverProductInquiries | Feed::NaverCustomerInquiries | Feed::NaverTalkMessages => {
            naver::message_from_record(record, ticket_id, helpdesk_types::SenderType::Customer).ok()?
        }
        Feed::CoupangInquiries => coupang::message_from_inquiry(record, ticket_id).ok()?,
        Feed::NaverOrderClaims | Feed::CoupangReturnRequests | Feed::CoupangCancelRequests => {
            return None;
        }
    };
    (!message.content.trim().is_empty()).then_some(message)
}

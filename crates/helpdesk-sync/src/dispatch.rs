use std::sync::Arc;

use helpdesk_db::Database;
use helpdesk_platforms::{ChannelRouting, ClientFactory, Delivery, ReplyRoute};
use helpdesk_types::api::DeliveryReport;
use helpdesk_types::{ChannelConfig, Message, NewMessage, SenderType, Ticket, TicketStatus};
use tracing::{info, warn};
use uuid::Uuid;

use crate::blocking;
use crate::error::{DispatchError, ReplyError};

#[derive(Debug, Clone, PartialEq)]
pub struct ReplyOutcome {
    /// The stored agent message.
    pub message: Message,
    pub delivery: DeliveryReport,
}

/// Sends agent replies to the platform a ticket came from.
pub struct OutboundDispatcher {
    db: Arc<Database>,
    clients: Arc<dyn ClientFactory>,
}

impl OutboundDispatcher {
    pub fn new(db: Arc<Database>, clients: Arc<dyn ClientFactory>) -> Self {
        Self { db, clients }
    }

    /// Delivers `text` through the channel configured for the ticket's brand
    /// and channel type. Remote failures come back as an unsuccessful
    /// `Delivery`, not as an error.
    pub async fn send_to_platform(&self, ticket: &Ticket, text: &str) -> Result<Delivery, DispatchError> {
        let brand_id = ticket.brand_id;
        let channel_type = ticket.channel_type;
        let config = blocking(&self.db, move |db| db.find_channel_config(brand_id, channel_type))
            .await?
            .filter(ChannelConfig::has_credentials)
            .ok_or_else(|| {
                DispatchError::Configuration(format!(
                    "no {channel_type} channel with credentials for brand {brand_id}"
                ))
            })?;

        let client = self.clients.client_for(&config)?;
        let route = channel_type.reply_route();
        let target = route.target(ticket).ok_or(DispatchError::MissingTarget {
            ticket_id: ticket.id,
            field: match route {
                ReplyRoute::NaverTalkMessage => "customer_id",
                ReplyRoute::KakaoConsultationMessage
                | ReplyRoute::NaverInquiryAnswer
                | ReplyRoute::CoupangInquiryAnswer => "external_id",
            },
        })?;

        Ok(client.deliver(route, target, text).await)
    }

    /// Stores the agent message exactly once, moves a pending ticket to
    /// in_progress, then tries the platform. Delivery problems are reported
    /// in the outcome and never undo the local save.
    pub async fn reply(&self, ticket_id: Uuid, text: &str, sender_name: &str) -> Result<ReplyOutcome, ReplyError> {
        if text.trim().is_empty() {
            return Err(ReplyError::EmptyMessage);
        }

        let ticket = blocking(&self.db, move |db| db.get_ticket(ticket_id))
            .await?
            .ok_or(ReplyError::TicketNotFound(ticket_id))?;

        let new_message = NewMessage {
            ticket_id,
            external_id: None,
            sender_type: SenderType::Agent,
            sender_name: Some(sender_name.to_string()),
            content: text.to_string(),
            created_at: None,
        };
        let was_pending = ticket.status == TicketStatus::Pending;
        let message = blocking(&self.db, move |db| {
            let message = db.create_message(&new_message)?;
            if was_pending {
                db.update_ticket_status(ticket_id, TicketStatus::InProgress, None)?;
            }
            Ok(message)
        })
        .await?;

        let delivery = match self.send_to_platform(&ticket, text).await {
            Ok(delivery) if delivery.success => {
                info!(%ticket_id, channel_type = %ticket.channel_type, "reply delivered");
                DeliveryReport::delivered()
            }
            Ok(delivery) => {
                let warning = delivery
                    .error
                    .unwrap_or_else(|| "platform rejected the reply".to_string());
                warn!(%ticket_id, channel_type = %ticket.channel_type, %warning, "reply saved but not delivered");
                DeliveryReport::failed(warning)
            }
            Err(e) => {
                warn!(%ticket_id, channel_type = %ticket.channel_type, error = %e, "reply saved but not delivered");
                DeliveryReport::failed(e.to_string())
            }
        };

        Ok(ReplyOutcome { message, delivery })
    }
}

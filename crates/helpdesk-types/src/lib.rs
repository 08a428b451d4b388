pub mod api;
pub mod models;

pub use models::{
    Brand, BrandSummary, ChannelConfig, ChannelType, Message, Metadata, NewMessage, NewTicket,
    ParseEnumError, Priority, QuickReply, SenderType, SyncLog, SyncStatus, Ticket, TicketFilter,
    TicketStats, TicketStatus,
};

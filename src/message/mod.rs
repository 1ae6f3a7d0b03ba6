use crate::message::types::MessageType;
use crate::RtmpPacket;

mod types;

pub use types::*;

/// Classify a raw message by its type id, for logging and metrics call sites that want
/// the taxonomy rather than a bare `u8` (the dispatch in `connection::run_session`
/// matches on the constants directly).
pub fn classify_message(packet: &RtmpPacket) -> MessageType {
    MessageType::from_id(packet.message_type())
}
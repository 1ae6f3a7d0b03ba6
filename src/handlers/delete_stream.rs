use std::sync::Arc;
use async_trait::async_trait;
use crate::handlers::CommandHandler;
use crate::{ConnectionContext, Error, Result, RtmpCommand, RtmpPacket};

pub struct DeleteStreamHandler;

impl DeleteStreamHandler {
    pub fn new() -> Self {
        DeleteStreamHandler
    }
}

#[async_trait::async_trait]
impl CommandHandler for DeleteStreamHandler {
    fn command_name(&self) -> &str {
        "deleteStream"
    }

    async fn handle(
        &self,
        command: RtmpCommand,
        context: Arc<ConnectionContext>,
    ) -> Result<Option<RtmpPacket>> {
        // Get stream ID from first argument
        let _stream_id = command.arguments.first()
            .and_then(|v| v.as_number())
            .ok_or_else(|| Error::protocol("Missing stream ID"))?;

        // Get app/stream name from context
        let app = context.get_property("app").await;
        let stream_name = context.get_property("stream_name").await;

        // Check if publishing
        let is_publishing = context.get_property("publishing").await
            .map(|v| v == "true")
            .unwrap_or(false);

        // Check if playing
        let is_playing = context.get_property("playing").await
            .map(|v| v == "true")
            .unwrap_or(false);

        // Cleanup based on state. Unregistering here is belt-and-braces: the fanout
        // task also unregisters once the ingest side drops, but deleteStream can race
        // ahead of that.
        if is_publishing {
            if let (Some(app), Some(stream_name)) = (&app, &stream_name) {
                let key = format!("{}/{}", app, stream_name);
                context.registry().unregister(&key).await;
            }
            context.remove_property("publishing").await;
        }

        if is_playing {
            context.remove_property("playing").await;
            context.remove_property("play_start").await;
            context.remove_property("play_duration").await;
        }

        // Remove stream context
        context.remove_property("stream_name").await;
        context.remove_property("stream_id").await;

        // Send deleteStream success (no response expected by spec)
        Ok(None)
    }
}

mod connect;
mod create_stream;
mod publish;
mod play;
mod delete_stream;

use std::collections::HashMap;
use crate::{Error, Result};
use crate::protocol::{RtmpCommand, RtmpPacket};
use crate::connection::ConnectionContext;
use std::sync::Arc;
use crate::handlers::connect::ConnectHandler;
use crate::handlers::create_stream::CreateStreamHandler;
use crate::handlers::delete_stream::DeleteStreamHandler;
use crate::handlers::play::PlayHandler;
use crate::handlers::publish::PublishHandler;

#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync {
    /// Get command name this handler processes
    fn command_name(&self) -> &str;

    /// Handle the command
    async fn handle(
        &self,
        command: RtmpCommand,
        context: Arc<ConnectionContext>,
    ) -> Result<Option<RtmpPacket>>;

    /// Check if can handle command
    fn can_handle(&self, command_name: &str) -> bool {
        self.command_name() == command_name
    }
}

/// Command handler registry
pub struct CommandHandlerRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandHandlerRegistry {
    pub fn new() -> Self {
        let mut registry = CommandHandlerRegistry {
            handlers: HashMap::new(),
        };

        // Register default handlers
        registry.register(Arc::new(ConnectHandler::new()));
        registry.register(Arc::new(CreateStreamHandler::new()));
        registry.register(Arc::new(PublishHandler::new()));
        registry.register(Arc::new(PlayHandler::new()));
        registry.register(Arc::new(DeleteStreamHandler::new()));

        registry
    }

    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(
            handler.command_name().to_string(),
            handler,
        );
    }

    pub async fn handle(
        &self,
        command: RtmpCommand,
        context: Arc<ConnectionContext>,
    ) -> Result<Option<RtmpPacket>> {
        if let Some(handler) = self.handlers.get(&command.name) {
            handler.handle(command, context).await
        } else {
            Err(Error::protocol(format!("Unknown command: {}", command.name)))
        }
    }
}


use std::future::Future;
use std::pin::Pin;

use framebus_channel::writer::ChannelWriter;
use framebus_proto::message::Message;

use crate::error::StageError;

/// Sink of typed messages for a stage.
pub trait TypedWriter: Send {
    fn start(&mut self) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>>;

    fn stop(&mut self) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>>;

    fn send(
        &mut self,
        message: Message,
    ) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>>;
}

/// Typed writer over a multipart channel: serializes each message into
/// its multipart frame.
pub struct MessageWriter {
    channel: ChannelWriter,
}

impl MessageWriter {
    pub fn new(channel: ChannelWriter) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &ChannelWriter {
        &self.channel
    }
}

impl TypedWriter for MessageWriter {
    fn start(&mut self) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>> {
        Box::pin(async move { Ok(self.channel.start().await?) })
    }

    fn stop(&mut self) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>> {
        Box::pin(async move { Ok(self.channel.stop().await?) })
    }

    fn send(
        &mut self,
        message: Message,
    ) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>> {
        Box::pin(async move {
            let parts = message.encode()?;
            Ok(self.channel.write_multipart(parts).await?)
        })
    }
}

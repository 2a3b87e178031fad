use std::future::Future;
use std::pin::Pin;

use framebus_channel::error::ChannelError;
use framebus_channel::reader::ChannelReader;
use framebus_proto::message::Message;

use crate::error::StageError;

/// Three-valued receive. A timeout is a signaling event the loop uses to
/// stay responsive; only `Closed` means no further messages will come.
#[derive(Debug)]
pub enum Recv {
    Got(Message),
    /// Nothing arrived within the read timeout.
    Empty,
    /// The channel was stopped and drained.
    Closed,
}

/// Source of typed messages for a stage.
pub trait TypedReader: Send {
    fn start(&mut self) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>>;

    fn stop(&mut self) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>>;

    /// A malformed inbound frame is an `Err` distinct from all three
    /// `Recv` values; the caller decides whether to skip it.
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Result<Recv, StageError>> + Send + '_>>;
}

/// Typed reader over a multipart channel: parses each inbound frame into
/// its message variant.
pub struct MessageReader {
    channel: ChannelReader,
}

impl MessageReader {
    pub fn new(channel: ChannelReader) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &ChannelReader {
        &self.channel
    }
}

impl TypedReader for MessageReader {
    fn start(&mut self) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>> {
        Box::pin(async move { Ok(self.channel.start().await?) })
    }

    fn stop(&mut self) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>> {
        Box::pin(async move { Ok(self.channel.stop().await?) })
    }

    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Result<Recv, StageError>> + Send + '_>> {
        Box::pin(async move {
            match self.channel.read_multipart().await {
                Ok(Some(parts)) => Ok(Recv::Got(Message::decode(&parts)?)),
                Ok(None) => Ok(Recv::Empty),
                Err(ChannelError::Closed) => Ok(Recv::Closed),
                Err(e) => Err(StageError::Channel(e)),
            }
        })
    }
}

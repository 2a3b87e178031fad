use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use framebus_channel::error::ChannelError;
use framebus_proto::message::{Buffer, BufferMeta, Caps, CustomMeta, Message};
use framebus_stage::error::StageError;
use framebus_stage::writer::TypedWriter;

use crate::error::BridgeError;

/// One event produced by a media framework source element.
pub enum SourceEvent {
    /// The element negotiated (or renegotiated) stream capabilities.
    Caps(Caps),
    /// One media buffer, mapped read-only out of the element.
    Frame {
        meta: BufferMeta,
        custom: Option<CustomMeta>,
        payload: Bytes,
    },
    /// The element reached end-of-stream.
    Eos,
}

/// The media framework side of an ingest bridge. Implemented by source
/// elements; the core only consumes this contract.
pub trait MediaSource: Send {
    fn next_event(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<SourceEvent, BridgeError>> + Send + '_>>;
}

/// Feed a typed writer from a media source until end-of-stream.
///
/// Each event maps to exactly one wire message. The writer is started
/// here and stopped on every exit path.
pub async fn run_source_bridge(
    source: &mut dyn MediaSource,
    writer: &mut dyn TypedWriter,
) -> Result<(), BridgeError> {
    writer.start().await?;
    let result = pump(source, writer).await;
    if let Err(e) = writer.stop().await {
        tracing::warn!(error = %e, "failed to stop bridge writer");
    }
    result
}

async fn pump(
    source: &mut dyn MediaSource,
    writer: &mut dyn TypedWriter,
) -> Result<(), BridgeError> {
    loop {
        match source.next_event().await? {
            SourceEvent::Caps(caps) => {
                send_best_effort(writer, Message::Caps(caps)).await?;
            }
            SourceEvent::Frame {
                meta,
                custom,
                payload,
            } => {
                let buffer = Buffer {
                    meta: Some(meta),
                    custom,
                    payload,
                };
                send_best_effort(writer, Message::Buffer(buffer)).await?;
            }
            SourceEvent::Eos => {
                send_best_effort(writer, Message::EndOfStream).await?;
                return Ok(());
            }
        }
    }
}

/// Delivery is best-effort: a missing peer or a full queue drops the
/// message and the stream goes on.
async fn send_best_effort(
    writer: &mut dyn TypedWriter,
    message: Message,
) -> Result<(), BridgeError> {
    match writer.send(message).await {
        Ok(()) => Ok(()),
        Err(StageError::Channel(ChannelError::WouldBlock)) => {
            tracing::debug!("no peer ready, message dropped");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

use framebus_channel::error::ChannelError;
use framebus_proto::message::Message;

use crate::error::StageError;
use crate::handler::{StageHandler, StopFlag};
use crate::reader::{Recv, TypedReader};
use crate::writer::TypedWriter;

/// One pipeline stage: pulls typed messages from a reader, dispatches
/// each to the handler's per-variant callback, and forwards whatever the
/// handler returns to the writer, if one is present.
///
/// The loop runs on a single task; the only suspension points are the
/// channel's bounded reads and writes, so `set_stop` is observed within
/// one read timeout.
pub struct Stage<H> {
    reader: Box<dyn TypedReader>,
    writer: Option<Box<dyn TypedWriter>>,
    handler: H,
    stop: StopFlag,
    eos_sent: bool,
}

impl<H: StageHandler> Stage<H> {
    pub fn new(
        reader: Box<dyn TypedReader>,
        writer: Option<Box<dyn TypedWriter>>,
        handler: H,
    ) -> Self {
        Self {
            reader,
            writer,
            handler,
            stop: StopFlag::new(),
            eos_sent: false,
        }
    }

    /// Handle for requesting loop termination from outside the stage,
    /// e.g. from a signal task.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Drive the stage to completion.
    ///
    /// Returns after an end-of-stream, a stop request, a closed reader,
    /// or the first terminal error. The shutdown sequence (final
    /// end-of-stream to the writer, stop writer, stop reader,
    /// `on_shutdown`) runs on every exit path.
    pub async fn run(mut self) -> Result<(), StageError> {
        self.reader.start().await?;
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.start().await {
                let _ = self.reader.stop().await;
                return Err(e);
            }
        }

        let loop_result = match self.handler.on_startup() {
            Ok(()) => self.pump().await,
            Err(e) => Err(e),
        };

        if let Some(writer) = self.writer.as_mut() {
            if !self.eos_sent {
                if let Err(e) = writer.send(Message::EndOfStream).await {
                    tracing::warn!(error = %e, "failed to write final end-of-stream");
                }
            }
            if let Err(e) = writer.stop().await {
                tracing::warn!(error = %e, "failed to stop writer");
            }
        }
        if let Err(e) = self.reader.stop().await {
            tracing::warn!(error = %e, "failed to stop reader");
        }
        let shutdown_result = self.handler.on_shutdown();

        loop_result.and(shutdown_result)
    }

    async fn pump(&mut self) -> Result<(), StageError> {
        loop {
            if self.stop.is_set() {
                return Ok(());
            }
            match self.reader.recv().await {
                Ok(Recv::Empty) => {}
                Ok(Recv::Closed) => {
                    tracing::info!("reader closed, stage finished");
                    return Ok(());
                }
                Ok(Recv::Got(message)) => {
                    let forward = self.dispatch(message)?;
                    if let (Some(message), Some(writer)) = (forward, self.writer.as_mut()) {
                        let is_eos = matches!(message, Message::EndOfStream);
                        match writer.send(message).await {
                            Ok(()) => self.eos_sent |= is_eos,
                            Err(StageError::Channel(ChannelError::WouldBlock)) => {
                                // Best-effort delivery: downstream is not
                                // ready, the message is dropped.
                                tracing::debug!("downstream not ready, message dropped");
                            }
                            Err(e) => return Err(e),
                        }
                    }
                }
                Err(StageError::Malformed(e)) => {
                    tracing::warn!(error = %e, "malformed frame skipped");
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn dispatch(&mut self, message: Message) -> Result<Option<Message>, StageError> {
        match message {
            Message::Caps(caps) => self.handler.handle_caps(caps, &self.stop),
            Message::Buffer(buffer) => self.handler.handle_buffer(buffer, &self.stop),
            Message::BufferMeta(meta) => self.handler.handle_buffer_meta(meta, &self.stop),
            Message::CustomMeta(meta) => self.handler.handle_custom_meta(meta, &self.stop),
            Message::EndOfStream => self.handler.handle_eos(&self.stop),
        }
    }
}

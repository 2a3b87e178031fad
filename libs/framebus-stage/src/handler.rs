use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use framebus_proto::message::{Buffer, BufferMeta, Caps, CustomMeta, Message};

use crate::error::StageError;

/// Clonable stop request.
///
/// The stage loop observes it at iteration boundaries; handlers and
/// signal tasks may set it at any time. Long handler work is not
/// preempted.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the stage loop to exit after the current iteration.
    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-variant callbacks of a pipeline stage.
///
/// Each handler returns the message to forward downstream, or `None` to
/// suppress it. The defaults pass the inbound message through unchanged;
/// `handle_eos` additionally requests stop, so an unmodified stage
/// relays its stream and ends with it.
pub trait StageHandler: Send {
    /// Called once after the transports start, before the first message.
    fn on_startup(&mut self) -> Result<(), StageError> {
        Ok(())
    }

    /// Called once after the loop exits, regardless of cause.
    fn on_shutdown(&mut self) -> Result<(), StageError> {
        Ok(())
    }

    fn handle_caps(&mut self, caps: Caps, _stop: &StopFlag) -> Result<Option<Message>, StageError> {
        Ok(Some(Message::Caps(caps)))
    }

    fn handle_buffer(
        &mut self,
        buffer: Buffer,
        _stop: &StopFlag,
    ) -> Result<Option<Message>, StageError> {
        Ok(Some(Message::Buffer(buffer)))
    }

    fn handle_buffer_meta(
        &mut self,
        meta: BufferMeta,
        _stop: &StopFlag,
    ) -> Result<Option<Message>, StageError> {
        Ok(Some(Message::BufferMeta(meta)))
    }

    fn handle_custom_meta(
        &mut self,
        meta: CustomMeta,
        _stop: &StopFlag,
    ) -> Result<Option<Message>, StageError> {
        Ok(Some(Message::CustomMeta(meta)))
    }

    fn handle_eos(&mut self, stop: &StopFlag) -> Result<Option<Message>, StageError> {
        stop.set();
        Ok(Some(Message::EndOfStream))
    }
}

/// The identity stage: forwards everything, stops on end-of-stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl StageHandler for PassThrough {}

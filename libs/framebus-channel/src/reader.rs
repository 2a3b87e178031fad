use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::endpoint::{self, Endpoint};
use crate::error::ChannelError;
use crate::frame;
use crate::options::{ReaderOptions, ReaderSocketMode};

const RECONNECT_INITIAL: Duration = Duration::from_secs(1);
const RECONNECT_MAX: Duration = Duration::from_secs(15);

/// Receiving end of the multipart channel.
///
/// Connects to the peer writer's address and keeps a bounded inbound
/// queue filled from a background socket task. Reads are bounded by
/// `read_timeout_ms` and return `None` on timeout; the socket task
/// reconnects with backoff when the peer goes away.
pub struct ChannelReader {
    options: ReaderOptions,
    state: State,
}

enum State {
    Idle,
    Running(Running),
    Stopped,
}

struct Running {
    rx: mpsc::Receiver<Vec<Bytes>>,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ChannelReader {
    pub fn new(options: ReaderOptions) -> Self {
        Self {
            options,
            state: State::Idle,
        }
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Validate options and spawn the socket task. Must be called exactly
    /// once before any read.
    pub async fn start(&mut self) -> Result<(), ChannelError> {
        match self.state {
            State::Idle => {}
            State::Running(_) | State::Stopped => {
                return Err(ChannelError::InvalidState("reader already started"));
            }
        }
        let endpoint = self.options.validate()?;

        let filter = match self.options.socket_mode {
            ReaderSocketMode::Subscribe => self.options.topic.clone(),
            ReaderSocketMode::Pull => Vec::new(),
        };
        let (tx, rx) = mpsc::channel(self.options.inbound_queue_depth.max(1));
        let token = CancellationToken::new();
        let task = tokio::spawn(receive_loop(
            endpoint,
            filter,
            self.options.os_recv_buffer_bytes,
            tx,
            token.clone(),
        ));

        self.state = State::Running(Running { rx, token, task });
        Ok(())
    }

    /// Pull one multipart frame off the inbound queue.
    ///
    /// `Ok(None)` means nothing arrived within `read_timeout_ms` (or the
    /// queue was empty, for a nonblocking reader) and is not an error.
    pub async fn read_multipart(&mut self) -> Result<Option<Vec<Bytes>>, ChannelError> {
        let nonblocking = self.options.nonblocking;
        let wait = Duration::from_millis(self.options.read_timeout_ms);
        let running = match &mut self.state {
            State::Running(running) => running,
            State::Idle | State::Stopped => {
                return Err(ChannelError::InvalidState("reader is not started"));
            }
        };

        if nonblocking {
            return match running.rx.try_recv() {
                Ok(parts) => Ok(Some(parts)),
                Err(mpsc::error::TryRecvError::Empty) => Ok(None),
                Err(mpsc::error::TryRecvError::Disconnected) => Err(ChannelError::Closed),
            };
        }

        match tokio::time::timeout(wait, running.rx.recv()).await {
            Err(_) => Ok(None),
            Ok(Some(parts)) => Ok(Some(parts)),
            Ok(None) => Err(ChannelError::Closed),
        }
    }

    /// Cancel the socket task and release the connection. Idempotent.
    pub async fn stop(&mut self) -> Result<(), ChannelError> {
        let running = match std::mem::replace(&mut self.state, State::Stopped) {
            State::Running(running) => running,
            State::Idle | State::Stopped => return Ok(()),
        };
        running.token.cancel();
        let _ = running.task.await;
        Ok(())
    }
}

impl Drop for ChannelReader {
    fn drop(&mut self) {
        if let State::Running(running) = &self.state {
            running.token.cancel();
        }
    }
}

/// Connect, receive frames into the bounded queue, reconnect on loss.
async fn receive_loop(
    endpoint: Endpoint,
    filter: Vec<u8>,
    recv_buffer_bytes: usize,
    tx: mpsc::Sender<Vec<Bytes>>,
    token: CancellationToken,
) {
    let mut backoff = RECONNECT_INITIAL;
    loop {
        let connected = tokio::select! {
            _ = token.cancelled() => return,
            result = endpoint::connect(&endpoint) => result,
        };
        let mut stream = match connected {
            Ok(stream) => {
                backoff = RECONNECT_INITIAL;
                stream
            }
            Err(e) => {
                tracing::warn!(endpoint = %endpoint, error = %e, "connect failed, retrying");
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(RECONNECT_MAX);
                continue;
            }
        };
        endpoint::apply_os_buffers(&stream, Some(recv_buffer_bytes), None);
        tracing::info!(endpoint = %endpoint, "reader connected");

        loop {
            let received = tokio::select! {
                _ = token.cancelled() => return,
                result = frame::read_frame(&mut stream) => result,
            };
            match received {
                Ok(parts) => {
                    if !filter.is_empty() && !parts[0].starts_with(&filter) {
                        continue;
                    }
                    match tx.try_send(parts) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            tracing::warn!(endpoint = %endpoint, "inbound queue full, frame dropped");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => return,
                    }
                }
                Err(e) => {
                    tracing::info!(endpoint = %endpoint, error = %e, "peer lost, reconnecting");
                    break;
                }
            }
        }
    }
}

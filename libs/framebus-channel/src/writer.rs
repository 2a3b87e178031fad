use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::endpoint::{self, Endpoint, IoStream, Listener};
use crate::error::ChannelError;
use crate::frame;
use crate::options::{WriterOptions, WriterSocketMode};

/// Sending end of the multipart channel.
///
/// Binds the address and fans queued frames out to connected peers from
/// background tasks. Publish mode gives every subscriber every frame
/// through its own bounded queue (a slow subscriber drops its oldest);
/// push mode lets peers take frames off one shared bounded queue.
pub struct ChannelWriter {
    options: WriterOptions,
    state: State,
}

enum State {
    Idle,
    Running(Running),
    Stopped,
}

struct Running {
    fanout: Fanout,
    bound_address: String,
    peers: Arc<AtomicUsize>,
    accept_token: CancellationToken,
    conn_token: CancellationToken,
    accept_task: JoinHandle<()>,
    tracker: TaskTracker,
}

enum Fanout {
    Broadcast(broadcast::Sender<Vec<Bytes>>),
    Queue(mpsc::Sender<Vec<Bytes>>),
}

impl ChannelWriter {
    pub fn new(options: WriterOptions) -> Self {
        Self {
            options,
            state: State::Idle,
        }
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// The address actually bound, once started. Resolves an ephemeral
    /// tcp port (`tcp://host:0`) to the real one.
    pub fn bound_address(&self) -> Option<&str> {
        match &self.state {
            State::Running(running) => Some(&running.bound_address),
            State::Idle | State::Stopped => None,
        }
    }

    /// Validate options, bind the address and spawn the accept task.
    /// A writer that cannot bind fails here, fast.
    pub async fn start(&mut self) -> Result<(), ChannelError> {
        match self.state {
            State::Idle => {}
            State::Running(_) | State::Stopped => {
                return Err(ChannelError::InvalidState("writer already started"));
            }
        }
        let endpoint = self.options.validate()?;
        let listener = Listener::bind(&endpoint).await?;
        let bound_address = listener.bound_address(&endpoint);
        tracing::info!(endpoint = %bound_address, mode = ?self.options.socket_mode, "writer listening");

        let accept_token = CancellationToken::new();
        let conn_token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let peers = Arc::new(AtomicUsize::new(0));
        let depth = self.options.outbound_queue_depth.max(1);

        let shared = AcceptShared {
            endpoint,
            send_buffer_bytes: self.options.os_send_buffer_bytes,
            peers: peers.clone(),
            accept_token: accept_token.clone(),
            conn_token: conn_token.clone(),
            tracker: tracker.clone(),
        };
        let (fanout, accept_task) = match self.options.socket_mode {
            WriterSocketMode::Publish => {
                let (tx, _) = broadcast::channel(depth);
                let task = tokio::spawn(accept_loop(listener, shared, Peer::Publish(tx.clone())));
                (Fanout::Broadcast(tx), task)
            }
            WriterSocketMode::Push => {
                let (tx, rx) = mpsc::channel(depth);
                let queue = Arc::new(Mutex::new(rx));
                let task = tokio::spawn(accept_loop(listener, shared, Peer::Push(queue)));
                (Fanout::Queue(tx), task)
            }
        };

        self.state = State::Running(Running {
            fanout,
            bound_address,
            peers,
            accept_token,
            conn_token,
            accept_task,
            tracker,
        });
        Ok(())
    }

    /// Enqueue one multipart frame for delivery.
    ///
    /// `WouldBlock` is the soft failure of a full queue (after
    /// `send_timeout_ms`, or at once when nonblocking) or of `immediate`
    /// with no connected peer; the caller may ignore or log it.
    pub async fn write_multipart(&mut self, parts: Vec<Bytes>) -> Result<(), ChannelError> {
        let immediate = self.options.immediate;
        let nonblocking = self.options.nonblocking;
        let wait = Duration::from_millis(self.options.send_timeout_ms);
        let running = match &self.state {
            State::Running(running) => running,
            State::Idle | State::Stopped => {
                return Err(ChannelError::InvalidState("writer is not started"));
            }
        };
        if parts.is_empty() {
            return Err(ChannelError::Config("a frame needs at least one part".to_string()));
        }

        match &running.fanout {
            Fanout::Broadcast(tx) => {
                if running.peers.load(Ordering::Relaxed) == 0 {
                    if immediate {
                        return Err(ChannelError::WouldBlock);
                    }
                    // Nobody subscribed: pub/sub is best-effort.
                    tracing::trace!("no subscribers, frame dropped");
                    return Ok(());
                }
                let _ = tx.send(parts);
                Ok(())
            }
            Fanout::Queue(tx) => {
                if immediate && running.peers.load(Ordering::Relaxed) == 0 {
                    return Err(ChannelError::WouldBlock);
                }
                if nonblocking {
                    return match tx.try_send(parts) {
                        Ok(()) => Ok(()),
                        Err(mpsc::error::TrySendError::Full(_)) => Err(ChannelError::WouldBlock),
                        Err(mpsc::error::TrySendError::Closed(_)) => Err(ChannelError::Closed),
                    };
                }
                match tokio::time::timeout(wait, tx.send(parts)).await {
                    Err(_) => Err(ChannelError::WouldBlock),
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(_)) => Err(ChannelError::Closed),
                }
            }
        }
    }

    /// Stop accepting, flush pending frames bounded by `linger_ms`, then
    /// tear the connections down. Idempotent.
    pub async fn stop(&mut self) -> Result<(), ChannelError> {
        let running = match std::mem::replace(&mut self.state, State::Stopped) {
            State::Running(running) => running,
            State::Idle | State::Stopped => return Ok(()),
        };

        // Stop accepting first; the accept task owns a fan-out handle and
        // must drop it before the queue can close.
        running.accept_token.cancel();
        let _ = running.accept_task.await;
        drop(running.fanout);
        running.tracker.close();

        let linger = self.options.linger_ms;
        if linger < 0 {
            running.tracker.wait().await;
        } else if linger > 0 {
            let _ = tokio::time::timeout(
                Duration::from_millis(linger as u64),
                running.tracker.wait(),
            )
            .await;
        }
        running.conn_token.cancel();
        running.tracker.wait().await;
        Ok(())
    }
}

impl Drop for ChannelWriter {
    fn drop(&mut self) {
        if let State::Running(running) = &self.state {
            running.accept_token.cancel();
            running.conn_token.cancel();
        }
    }
}

struct AcceptShared {
    endpoint: Endpoint,
    send_buffer_bytes: usize,
    peers: Arc<AtomicUsize>,
    accept_token: CancellationToken,
    conn_token: CancellationToken,
    tracker: TaskTracker,
}

enum Peer {
    Publish(broadcast::Sender<Vec<Bytes>>),
    Push(Arc<Mutex<mpsc::Receiver<Vec<Bytes>>>>),
}

async fn accept_loop(listener: Listener, shared: AcceptShared, peer: Peer) {
    loop {
        let accepted = tokio::select! {
            _ = shared.accept_token.cancelled() => return,
            result = listener.accept() => result,
        };
        let stream = match accepted {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(endpoint = %shared.endpoint, error = %e, "accept failed");
                tokio::select! {
                    _ = shared.accept_token.cancelled() => return,
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                }
                continue;
            }
        };
        endpoint::apply_os_buffers(&stream, None, Some(shared.send_buffer_bytes));
        tracing::info!(endpoint = %shared.endpoint, "peer connected");

        let endpoint = shared.endpoint.clone();
        let peers = shared.peers.clone();
        let token = shared.conn_token.clone();
        match &peer {
            Peer::Publish(tx) => {
                // Subscribe before the peer becomes visible to senders, or
                // a frame sent in between would miss this subscriber.
                let rx = tx.subscribe();
                shared.peers.fetch_add(1, Ordering::Relaxed);
                shared.tracker.spawn(async move {
                    publish_connection(stream, rx, &endpoint, &token).await;
                    peers.fetch_sub(1, Ordering::Relaxed);
                    tracing::info!(endpoint = %endpoint, "peer disconnected");
                });
            }
            Peer::Push(queue) => {
                let queue = queue.clone();
                shared.peers.fetch_add(1, Ordering::Relaxed);
                shared.tracker.spawn(async move {
                    push_connection(stream, queue, &endpoint, &token).await;
                    peers.fetch_sub(1, Ordering::Relaxed);
                    tracing::info!(endpoint = %endpoint, "peer disconnected");
                });
            }
        }
    }
}

/// Feed one subscriber from its broadcast queue until it disconnects,
/// the writer stops, or the fan-out closes (linger drain complete).
async fn publish_connection(
    mut stream: IoStream,
    mut rx: broadcast::Receiver<Vec<Bytes>>,
    endpoint: &Endpoint,
    token: &CancellationToken,
) {
    loop {
        let received = tokio::select! {
            _ = token.cancelled() => return,
            result = rx.recv() => result,
        };
        match received {
            Ok(parts) => {
                let write = tokio::select! {
                    _ = token.cancelled() => return,
                    result = frame::write_frame(&mut stream, &parts) => result,
                };
                if let Err(e) = write {
                    tracing::warn!(endpoint = %endpoint, error = %e, "subscriber write failed");
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(endpoint = %endpoint, skipped, "slow subscriber, oldest frames dropped");
            }
            Err(broadcast::error::RecvError::Closed) => {
                let _ = stream.shutdown().await;
                return;
            }
        }
    }
}

/// Let one pull peer take frames off the shared queue until it
/// disconnects, the writer stops, or the queue closes and drains.
async fn push_connection(
    mut stream: IoStream,
    queue: Arc<Mutex<mpsc::Receiver<Vec<Bytes>>>>,
    endpoint: &Endpoint,
    token: &CancellationToken,
) {
    loop {
        let received = tokio::select! {
            _ = token.cancelled() => return,
            parts = async { queue.lock().await.recv().await } => parts,
        };
        match received {
            Some(parts) => {
                let write = tokio::select! {
                    _ = token.cancelled() => return,
                    result = frame::write_frame(&mut stream, &parts) => result,
                };
                if let Err(e) = write {
                    // The frame was already claimed from the queue; it is
                    // lost with the connection.
                    tracing::warn!(endpoint = %endpoint, error = %e, "push write failed, frame lost");
                    return;
                }
            }
            None => {
                let _ = stream.shutdown().await;
                return;
            }
        }
    }
}

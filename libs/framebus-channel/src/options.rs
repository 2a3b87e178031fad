use crate::endpoint::Endpoint;
use crate::error::ChannelError;

/// How a reader socket receives frames.
///
/// Subscribe pairs with a publish writer (every subscriber sees every
/// frame), pull with a push writer (frames distributed among peers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderSocketMode {
    #[default]
    Subscribe,
    Pull,
}

/// How a writer socket distributes frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriterSocketMode {
    #[default]
    Publish,
    Push,
}

/// Reader socket configuration.
///
/// Readers connect, writers bind; connection loss is retried in the
/// background so the start order of a pipeline's stages doesn't matter.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Socket address: `tcp://host:port` or `ipc:///absolute/path`.
    pub address: String,
    pub socket_mode: ReaderSocketMode,
    /// Exact-prefix filter applied to part 0 of every frame. Subscribe
    /// only; empty subscribes to everything.
    pub topic: Vec<u8>,
    /// High-water mark of the inbound queue, in messages. Overflow drops
    /// the newest frame.
    pub inbound_queue_depth: usize,
    /// OS receive buffer (SO_RCVBUF), in bytes.
    pub os_recv_buffer_bytes: usize,
    /// How long one read waits for a frame before returning none.
    pub read_timeout_ms: u64,
    /// Keep only the latest undelivered message. Always rejected at
    /// start: conflation of multipart frames is undefined at the socket
    /// layer.
    pub conflate: bool,
    /// Never wait in reads.
    pub nonblocking: bool,
}

impl ReaderOptions {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            socket_mode: ReaderSocketMode::Subscribe,
            topic: Vec::new(),
            inbound_queue_depth: 50,
            os_recv_buffer_bytes: 10 * 1024 * 1024,
            read_timeout_ms: 100,
            conflate: false,
            nonblocking: false,
        }
    }

    pub(crate) fn validate(&self) -> Result<Endpoint, ChannelError> {
        let endpoint = Endpoint::parse(&self.address)?;
        if !self.topic.is_empty() && self.socket_mode != ReaderSocketMode::Subscribe {
            return Err(ChannelError::Config(
                "topic is only valid for subscribe sockets".to_string(),
            ));
        }
        if self.conflate {
            return Err(ChannelError::Config(
                "conflate is not supported for multipart frames".to_string(),
            ));
        }
        Ok(endpoint)
    }
}

/// Writer socket configuration.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Socket address: `tcp://host:port` or `ipc:///absolute/path`.
    pub address: String,
    pub socket_mode: WriterSocketMode,
    /// Bound on queued outbound messages: per subscriber for publish,
    /// shared for push.
    pub outbound_queue_depth: usize,
    /// OS send buffer (SO_SNDBUF), in bytes.
    pub os_send_buffer_bytes: usize,
    /// How long a blocked send waits before giving up with WouldBlock.
    pub send_timeout_ms: u64,
    /// Drop sends while no peer is connected instead of queueing them.
    pub immediate: bool,
    /// See [`ReaderOptions::conflate`]; rejected at start.
    pub conflate: bool,
    /// How long `stop` keeps trying to flush pending messages: 0 drops
    /// them at once, negative waits indefinitely.
    pub linger_ms: i64,
    /// Never wait in sends.
    pub nonblocking: bool,
}

impl WriterOptions {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            socket_mode: WriterSocketMode::Publish,
            outbound_queue_depth: 50,
            os_send_buffer_bytes: 10 * 1024 * 1024,
            send_timeout_ms: 100,
            immediate: true,
            conflate: false,
            linger_ms: 500,
            nonblocking: false,
        }
    }

    pub(crate) fn validate(&self) -> Result<Endpoint, ChannelError> {
        let endpoint = Endpoint::parse(&self.address)?;
        if self.conflate {
            return Err(ChannelError::Config(
                "conflate is not supported for multipart frames".to_string(),
            ));
        }
        Ok(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::{ReaderOptions, ReaderSocketMode, WriterOptions};
    use crate::error::ChannelError;

    #[test]
    fn topic_requires_subscribe_mode() {
        let mut options = ReaderOptions::new("tcp://127.0.0.1:5555");
        options.topic = b"cam0".to_vec();
        assert!(options.validate().is_ok());

        options.socket_mode = ReaderSocketMode::Pull;
        assert!(matches!(options.validate(), Err(ChannelError::Config(_))));
    }

    #[test]
    fn conflate_is_rejected() {
        let mut reader = ReaderOptions::new("tcp://127.0.0.1:5555");
        reader.conflate = true;
        assert!(matches!(reader.validate(), Err(ChannelError::Config(_))));

        let mut writer = WriterOptions::new("ipc:///tmp/frames.sock");
        writer.conflate = true;
        assert!(matches!(writer.validate(), Err(ChannelError::Config(_))));
    }
}

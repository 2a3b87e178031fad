use clap::{Args, ValueEnum};

use framebus_channel::options::{ReaderOptions, ReaderSocketMode, WriterOptions, WriterSocketMode};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReaderModeArg {
    Subscribe,
    Pull,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum WriterModeArg {
    Publish,
    Push,
}

/// Reader-side channel options, exposed one-to-one as flags.
#[derive(Debug, Args)]
pub struct ReaderArgs {
    /// Socket address the reader connects to (tcp://host:port or
    /// ipc:///path).
    #[arg(long = "reader-address", env = "FRAMEBUS_READER_ADDRESS")]
    pub reader_address: String,

    #[arg(long = "reader-socket-mode", value_enum, default_value = "subscribe")]
    pub reader_socket_mode: ReaderModeArg,

    /// Subscription topic (prefix filter); subscribe mode only.
    #[arg(long = "reader-topic", default_value = "")]
    pub reader_topic: String,

    /// Inbound queue high-water mark, in messages.
    #[arg(long = "reader-inbound-queue-depth", default_value_t = 50)]
    pub reader_inbound_queue_depth: usize,

    #[arg(long = "reader-os-recv-buffer-bytes", default_value_t = 10 * 1024 * 1024)]
    pub reader_os_recv_buffer_bytes: usize,

    #[arg(long = "reader-read-timeout-ms", default_value_t = 100)]
    pub reader_read_timeout_ms: u64,

    /// Keep only the latest undelivered message.
    #[arg(long = "reader-conflate")]
    pub reader_conflate: bool,

    /// Never wait in reads.
    #[arg(long = "reader-nonblocking")]
    pub reader_nonblocking: bool,
}

impl ReaderArgs {
    pub fn to_options(&self) -> ReaderOptions {
        let mut options = ReaderOptions::new(&self.reader_address);
        options.socket_mode = match self.reader_socket_mode {
            ReaderModeArg::Subscribe => ReaderSocketMode::Subscribe,
            ReaderModeArg::Pull => ReaderSocketMode::Pull,
        };
        options.topic = self.reader_topic.clone().into_bytes();
        options.inbound_queue_depth = self.reader_inbound_queue_depth;
        options.os_recv_buffer_bytes = self.reader_os_recv_buffer_bytes;
        options.read_timeout_ms = self.reader_read_timeout_ms;
        options.conflate = self.reader_conflate;
        options.nonblocking = self.reader_nonblocking;
        options
    }
}

/// Writer-side channel options, exposed one-to-one as flags.
#[derive(Debug, Args)]
pub struct WriterArgs {
    /// Socket address the writer binds (tcp://host:port or ipc:///path).
    #[arg(long = "writer-address", env = "FRAMEBUS_WRITER_ADDRESS")]
    pub writer_address: String,

    #[arg(long = "writer-socket-mode", value_enum, default_value = "publish")]
    pub writer_socket_mode: WriterModeArg,

    /// Outbound queue high-water mark, in messages.
    #[arg(long = "writer-outbound-queue-depth", default_value_t = 50)]
    pub writer_outbound_queue_depth: usize,

    #[arg(long = "writer-os-send-buffer-bytes", default_value_t = 10 * 1024 * 1024)]
    pub writer_os_send_buffer_bytes: usize,

    #[arg(long = "writer-send-timeout-ms", default_value_t = 100)]
    pub writer_send_timeout_ms: u64,

    /// Drop messages while no peer is connected instead of queueing them.
    #[arg(long = "writer-immediate", action = clap::ArgAction::Set, default_value_t = true)]
    pub writer_immediate: bool,

    /// Keep only the latest undelivered message.
    #[arg(long = "writer-conflate")]
    pub writer_conflate: bool,

    /// How long stop drains pending messages (0 drops now, -1 waits
    /// indefinitely).
    #[arg(long = "writer-linger-ms", default_value_t = 500, allow_hyphen_values = true)]
    pub writer_linger_ms: i64,

    /// Never wait in sends.
    #[arg(long = "writer-nonblocking")]
    pub writer_nonblocking: bool,
}

impl WriterArgs {
    pub fn to_options(&self) -> WriterOptions {
        let mut options = WriterOptions::new(&self.writer_address);
        options.socket_mode = match self.writer_socket_mode {
            WriterModeArg::Publish => WriterSocketMode::Publish,
            WriterModeArg::Push => WriterSocketMode::Push,
        };
        options.outbound_queue_depth = self.writer_outbound_queue_depth;
        options.os_send_buffer_bytes = self.writer_os_send_buffer_bytes;
        options.send_timeout_ms = self.writer_send_timeout_ms;
        options.immediate = self.writer_immediate;
        options.conflate = self.writer_conflate;
        options.linger_ms = self.writer_linger_ms;
        options.nonblocking = self.writer_nonblocking;
        options
    }
}

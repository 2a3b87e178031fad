use std::time::Duration;

use bytes::Bytes;
use clap::Args;

use framebus_channel::error::ChannelError;
use framebus_channel::writer::ChannelWriter;
use framebus_proto::message::{Buffer, BufferMeta, Caps, Message};
use framebus_stage::error::StageError;
use framebus_stage::writer::{MessageWriter, TypedWriter};

use crate::cmd::opts::WriterArgs;

#[derive(Debug, Args)]
pub struct PublishArgs {
    #[command(flatten)]
    pub writer: WriterArgs,

    /// Frame width in pixels.
    #[arg(long, default_value_t = 640)]
    pub width: u32,

    /// Frame height in pixels.
    #[arg(long, default_value_t = 480)]
    pub height: u32,

    /// Frame rate of the synthetic stream.
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Stop after this many frames (default: run until Ctrl-C).
    #[arg(long)]
    pub frames: Option<u64>,
}

fn caps(args: &PublishArgs, fps: u32) -> Caps {
    Caps {
        caps_str: format!(
            "video/x-raw,format=RGB,width={},height={},framerate={fps}/1",
            args.width, args.height
        ),
        width: args.width,
        height: args.height,
        format: Some("RGB".to_string()),
        fps_n: Some(fps as f64),
        fps_d: Some(1.0),
        framerate: Some(format!("{fps}/1")),
    }
}

fn synthetic_frame(width: u32, height: u32) -> Bytes {
    let len = width as usize * height as usize * 3;
    let mut payload = vec![0u8; len];
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte = (i % 256) as u8;
    }
    Bytes::from(payload)
}

/// Publish caps and then synthetic RGB buffers at a fixed rate, ending
/// with an end-of-stream on Ctrl-C or after `--frames`.
pub async fn run(args: PublishArgs) -> Result<(), StageError> {
    let mut writer = MessageWriter::new(ChannelWriter::new(args.writer.to_options()));
    writer.start().await?;

    let fps = args.fps.max(1);
    // pts in nanoseconds, the native clock of media buffers.
    let frame_duration_ns = 1_000_000_000u64 / u64::from(fps);
    let mut ticker = tokio::time::interval(Duration::from_nanos(frame_duration_ns));
    let payload = synthetic_frame(args.width, args.height);

    let mut caps_sent = false;
    let mut pts = 0u64;
    let mut sent = 0u64;
    let mut dropped = 0u64;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("stop requested");
                break;
            }
            _ = ticker.tick() => {}
        }

        if !caps_sent {
            match writer.send(Message::Caps(caps(&args, fps))).await {
                Ok(()) => {
                    caps_sent = true;
                    tracing::info!(width = args.width, height = args.height, fps, "caps sent");
                }
                Err(StageError::Channel(ChannelError::WouldBlock)) => continue,
                Err(e) => {
                    let _ = writer.stop().await;
                    return Err(e);
                }
            }
        }

        let buffer = Buffer {
            meta: Some(BufferMeta {
                pts,
                width: args.width,
                height: args.height,
                flags: 0,
                dts: None,
                duration: Some(frame_duration_ns),
                caps_str: None,
            }),
            custom: None,
            payload: payload.clone(),
        };
        match writer.send(Message::Buffer(buffer)).await {
            Ok(()) => sent += 1,
            Err(StageError::Channel(ChannelError::WouldBlock)) => dropped += 1,
            Err(e) => {
                let _ = writer.stop().await;
                return Err(e);
            }
        }
        pts += frame_duration_ns;

        if let Some(limit) = args.frames {
            if sent >= limit {
                break;
            }
        }
    }

    tracing::info!(sent, dropped, "publisher finishing");
    if let Err(e) = writer.send(Message::EndOfStream).await {
        tracing::warn!(error = %e, "failed to send end-of-stream");
    }
    writer.stop().await?;
    Ok(())
}

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use clap::Args;

use framebus_channel::reader::ChannelReader;
use framebus_proto::message::{Buffer, Caps, Message};
use framebus_stage::error::StageError;
use framebus_stage::handler::{StageHandler, StopFlag};
use framebus_stage::reader::MessageReader;
use framebus_stage::stage::Stage;

use crate::cmd::opts::ReaderArgs;

#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub reader: ReaderArgs,

    /// Sliding window of the rate estimate, in frames.
    #[arg(long, default_value_t = 500)]
    pub window: usize,
}

/// Frame-rate estimator over a sliding window of arrival times.
struct FpsCounter {
    window: usize,
    timestamps: VecDeque<Instant>,
    last_report: Instant,
    report_interval: Duration,
}

impl FpsCounter {
    fn new(window: usize) -> Self {
        Self {
            window: window.max(2),
            timestamps: VecDeque::new(),
            last_report: Instant::now(),
            report_interval: Duration::from_secs(1),
        }
    }

    fn update(&mut self) {
        self.timestamps.push_back(Instant::now());
        while self.timestamps.len() > self.window {
            self.timestamps.pop_front();
        }
    }

    fn fps(&self) -> f64 {
        let (Some(first), Some(last)) = (self.timestamps.front(), self.timestamps.back()) else {
            return 0.0;
        };
        let span = last.duration_since(*first).as_secs_f64();
        if self.timestamps.len() < 2 || span <= 0.0 {
            return 0.0;
        }
        (self.timestamps.len() - 1) as f64 / span
    }

    fn report_if_due(&mut self) {
        if self.last_report.elapsed() >= self.report_interval {
            let fps = self.fps();
            tracing::info!(fps, "stream rate");
            self.last_report = Instant::now();
        }
    }
}

/// Terminal probe: counts buffers, reports the rate, forwards nothing.
struct ProbeHandler {
    counter: FpsCounter,
    frames: u64,
}

impl StageHandler for ProbeHandler {
    fn handle_caps(&mut self, caps: Caps, _stop: &StopFlag) -> Result<Option<Message>, StageError> {
        tracing::info!(
            caps = %caps.caps_str,
            width = caps.width,
            height = caps.height,
            "caps received"
        );
        Ok(None)
    }

    fn handle_buffer(
        &mut self,
        _buffer: Buffer,
        _stop: &StopFlag,
    ) -> Result<Option<Message>, StageError> {
        self.frames += 1;
        self.counter.update();
        self.counter.report_if_due();
        Ok(None)
    }

    fn on_shutdown(&mut self) -> Result<(), StageError> {
        let fps = self.counter.fps();
        tracing::info!(frames = self.frames, fps, "probe finished");
        Ok(())
    }
}

pub async fn run(args: ProbeArgs) -> Result<(), StageError> {
    let reader = MessageReader::new(ChannelReader::new(args.reader.to_options()));
    let stage = Stage::new(
        Box::new(reader),
        None,
        ProbeHandler {
            counter: FpsCounter::new(args.window),
            frames: 0,
        },
    );

    let stop = stage.stop_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("stop requested");
            stop.set();
        }
    });

    stage.run().await
}

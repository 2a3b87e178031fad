use clap::Args;

use framebus_channel::reader::ChannelReader;
use framebus_channel::writer::ChannelWriter;
use framebus_stage::error::StageError;
use framebus_stage::handler::PassThrough;
use framebus_stage::reader::MessageReader;
use framebus_stage::stage::Stage;
use framebus_stage::writer::MessageWriter;

use crate::cmd::opts::{ReaderArgs, WriterArgs};

#[derive(Debug, Args)]
pub struct RelayArgs {
    #[command(flatten)]
    pub reader: ReaderArgs,

    #[command(flatten)]
    pub writer: WriterArgs,
}

/// The minimal composition primitive: read, pass through, write, end
/// with the stream.
pub async fn run(args: RelayArgs) -> Result<(), StageError> {
    let reader = MessageReader::new(ChannelReader::new(args.reader.to_options()));
    let writer = MessageWriter::new(ChannelWriter::new(args.writer.to_options()));
    let stage = Stage::new(Box::new(reader), Some(Box::new(writer)), PassThrough);

    let stop = stage.stop_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("stop requested");
            stop.set();
        }
    });

    stage.run().await
}

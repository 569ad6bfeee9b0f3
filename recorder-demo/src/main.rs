mod args;
mod tone;

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;

use recorder_core::{
    CaptureSource, ExportSink, FileSink, Recorder, RecorderConfig, RecorderDelegate, RecorderError,
    RecorderStatus, RecordingState,
};

use args::Cli;
use tone::ToneSource;

struct LogDelegate;

impl RecorderDelegate for LogDelegate {
    fn on_state_changed(&self, state: RecordingState) {
        log::info!("state: {:?}", state);
    }

    fn on_status(&self, status: &RecorderStatus) {
        log::trace!("recorded {:.2}s ({} frames)", status.duration_secs, status.rec_length);
    }

    fn on_error(&self, error: &RecorderError) {
        log::error!("recorder error: {}", error);
    }
}

fn run(cli: &Cli) -> Result<(), RecorderError> {
    let config = RecorderConfig::default()
        .with_frame_buffer_size(cli.frames)
        .with_channels(cli.channels)
        .with_native_sample_rate(cli.native_rate)
        .with_sample_rate(cli.rate)
        .with_renderer(cli.renderer.into());

    let recorder = Recorder::new(config)?;
    recorder.set_delegate(Arc::new(LogDelegate));

    let config = recorder.config();
    let mut source = ToneSource::new(
        config.native_sample_rate,
        config.channels,
        config.frame_buffer_size,
        cli.frequency,
    );
    recorder.record();
    recorder.attach(&mut source)?;
    thread::sleep(Duration::from_secs_f64(cli.seconds.max(0.0)));
    recorder.stop();
    source.stop()?;

    let exported = recorder.export_wav_blocking(Some(&cli.mime_type), Duration::from_secs(60))?;
    log::info!(
        "encoded {} bytes, {:.2}s at {} Hz",
        exported.bytes.len(),
        exported.duration_secs(),
        exported.sample_rate
    );

    let sink = FileSink::new(&cli.output_dir).with_file_name(&cli.file_name);
    let metadata = sink.consume(&exported)?;
    println!("{}", metadata.file_path);
    println!("sha256 {}", metadata.checksum);
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    log::debug!("{:?}", cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let target = cli.output_dir.join(&cli.file_name);
            log::error!("recording to {} failed: {}", target.display(), e);
            ExitCode::FAILURE
        }
    }
}

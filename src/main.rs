//! # Render Benchmark - Main Entry Point
//!
//! 1. **Parse arguments** and initialize logging
//! 2. **Initialize results manager**: final JSON output and optional
//!    per-event streaming
//! 3. **Run modes**: render benchmark runs and/or a stream session
//! 4. **Finalize**: write the consolidated results
//!
//! With `--continue-on-error` a failing mode is logged and the remaining
//! modes still run; otherwise the first failure ends the program.

use anyhow::Result;
use clap::Parser;
use render_benchmark::{
    benchmark::{BenchmarkConfig, BenchmarkRunner, PreviewRenderer},
    cli::{Args, Mode},
    frame::IntervalFrameScheduler,
    logging::init_logging,
    results::{RenderReport, ResultsManager},
    stream::{StreamConfig, StreamSession},
    transport::HttpPayloadSource,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Held until exit so buffered file logs are flushed.
    let _log_guard = init_logging(args.verbose, args.quiet, args.log_file.as_deref())?;

    info!("Starting Render Benchmark v{}", render_benchmark::VERSION);
    info!("Configuration: {:?}", args);

    let mut results_manager = ResultsManager::new(args.output_file.as_deref());
    if let Some(ref streaming_file) = args.streaming_output {
        info!("Streaming processed events to: {:?}", streaming_file);
        results_manager.enable_streaming(streaming_file)?;
    }

    let modes = Mode::expand_all(args.modes.clone());
    for mode in &modes {
        info!("Running mode: {}", mode);

        let outcome = match mode {
            Mode::Render => run_render_mode(&args, &mut results_manager).await,
            Mode::Stream => run_stream_mode(&args, &mut results_manager).await,
            Mode::All => Ok(()),
        };

        match outcome {
            Ok(()) => info!("{} completed successfully", mode),
            Err(e) => {
                error!("{} failed: {:#}", mode, e);
                if !args.continue_on_error {
                    results_manager.finalize()?;
                    return Err(e);
                }
            }
        }
    }

    results_manager.finalize()?;

    info!("Render Benchmark completed");
    Ok(())
}

/// Run every configured render benchmark run and record the outcome.
///
/// Fails when no run completed.
async fn run_render_mode(args: &Args, results_manager: &mut ResultsManager) -> Result<()> {
    let config = BenchmarkConfig::from_args(args)?;
    let source = HttpPayloadSource::new(&config.base_url, config.request_timeout)?;
    let frames = IntervalFrameScheduler::new(config.frame_rate);
    let mut renderer = PreviewRenderer::new(render_benchmark::defaults::PREVIEW_LEN);

    let mut runner = BenchmarkRunner::new(config.clone(), source, frames);
    let records = runner.run_all(&mut renderer).await;

    if let Some(metrics) = runner.state().metrics() {
        info!("Last run:\n{}", metrics);
        info!(
            "Rendered {} records ({} tags, max nesting level {})",
            renderer.rendered_records(),
            renderer.rendered_tags(),
            renderer.max_nesting()
        );
    }

    let report = RenderReport::new(&config, records);
    let completed = report.summary.completed_runs;
    let failed = report.summary.failed_runs;
    results_manager.set_render_report(report);

    if completed == 0 {
        anyhow::bail!("All {} render runs failed", failed);
    }
    Ok(())
}

/// Listen to the event stream and record the aggregated state
async fn run_stream_mode(args: &Args, results_manager: &mut ResultsManager) -> Result<()> {
    let config = StreamConfig::from_args(args)?;
    let report = StreamSession::new(config).run(results_manager).await?;

    if let Some(ref latency) = report.latency {
        info!(
            "Latency: min {} ms, mean {:.2} ms, max {} ms over {} events",
            latency.min_ms, latency.mean_ms, latency.max_ms, latency.total_samples
        );
    }
    info!(
        "Monitor: {} fps, last message processed in {} ms",
        report.monitor.fps, report.monitor.processing_time
    );

    results_manager.set_stream_report(report);
    Ok(())
}

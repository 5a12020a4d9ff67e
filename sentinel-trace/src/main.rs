use std::sync::Arc;

use clap::Parser;
use log::info;
use tokio::signal;

use sentinel_trace::aggregator::Aggregator;
use sentinel_trace::capture::CapturePipeline;
use sentinel_trace::cli::Args;
use sentinel_trace::configuration::Configuration;
use sentinel_trace::protocol::ChannelClient;
use sentinel_trace::report::SessionReport;
use sentinel_trace::service::TelemetryService;
use sentinel_trace::sinks::{IpcSink, LogTraceWriter, SinkFanout, TraceSink};
use sentinel_trace::sources::{EventSource, SyntheticSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let mut builder = Configuration::builder();
    if let Some(path) = &args.config {
        builder = builder.from_config_file(path)?;
    }
    let config = builder.from_args(&args)?.build()?;

    env_logger::Builder::from_default_env()
        .filter_level(if config.is_verbose() {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let pipeline = Arc::new(CapturePipeline::new(
        config.queue_capacity(),
        config.initial_filter(),
    ));

    let mut source = SyntheticSource::new();
    if args.simulate {
        source.attach(&pipeline)?;
        info!("synthetic event source attached");
    }

    let aggregator = Aggregator::new(
        ChannelClient::new(Arc::clone(&pipeline)),
        config.aggregator_capacity(),
        config.drain_batch(),
    );
    let sinks = SinkFanout::new(
        TraceSink::new(LogTraceWriter),
        IpcSink::new(config.socket_path())
            .with_timeouts(config.accept_timeout(), config.write_timeout()),
    );
    let mut service =
        TelemetryService::new(aggregator, sinks).with_poll_interval(config.poll_interval());
    let handle = service.handle();

    let started = std::time::Instant::now();
    let service_task = tokio::spawn(async move {
        let result = service.run().await;
        (service, result)
    });

    match config.duration() {
        Some(duration) => {
            tokio::select! {
                _ = signal::ctrl_c() => info!("interrupt received, shutting down"),
                _ = tokio::time::sleep(duration) => info!("session duration elapsed"),
            }
        }
        None => {
            signal::ctrl_c().await?;
            info!("interrupt received, shutting down");
        }
    }

    handle.stop();
    let (service, run_result) = service_task.await?;
    run_result?;
    source.detach()?;

    let stats = ChannelClient::new(Arc::clone(&pipeline)).statistics()?;
    let (trace_failures, ipc_failures) = service.sink_failures();
    let report = SessionReport::new(&stats, started.elapsed().as_secs())
        .with_aggregator_evictions(service.aggregator().evicted())
        .with_sink_failures(trace_failures, ipc_failures);

    match &args.output {
        Some(path) => {
            let rendered = if path.extension().and_then(|s| s.to_str()) == Some("json") {
                report.to_json()?
            } else {
                report.to_markdown()
            };
            std::fs::write(path, rendered)?;
            info!("session report written to {}", path.display());
        }
        None => println!("{}", report.to_markdown()),
    }

    Ok(())
}

//! Command-line interface for the periodic metrics demo.
//!
//! Runs a handful of worker threads that record into a [`PeriodicRecorder`],
//! rotates it on a schedule and prints every flushed interval.

use crate::core::config::ConfigBuilder;
use crate::core::{Config, ExecutorKind, PeriodicError, Result};
use crate::polling::DispatchPolicy;
use crate::rotation::{PeriodicRecorder, PeriodicRecorderBuilder};
use crate::scheduler::RotationScheduler;
use crate::sink::{GaugeValue, InMemorySinkFactory, IntervalSnapshot, Sink, TimeUnit};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const REQUESTS_COUNTER: &str = "demo.requests";

/// Record metrics from concurrent workers and flush them on a fixed schedule
#[derive(Parser, Debug)]
#[command(name = "periodic-metrics")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/periodic-metrics/config.yaml)
    #[arg(short, long, env = "PERIODIC_METRICS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Rotation period, e.g. "500ms" or "2s"
    #[arg(short, long, env = "PERIODIC_METRICS_PERIOD", value_parser = humantime::parse_duration)]
    pub period: Option<Duration>,

    /// Number of recording worker threads
    #[arg(short, long, env = "PERIODIC_METRICS_WORKERS", default_value_t = 4)]
    pub workers: usize,

    /// Stop after this long (default: run until Ctrl-C)
    #[arg(long, env = "PERIODIC_METRICS_DURATION", value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Run polled callbacks on a rayon pool with this many threads
    #[arg(long, env = "PERIODIC_METRICS_POLL_THREADS")]
    pub poll_threads: Option<usize>,

    /// Do not wait for polled callbacks before closing an interval
    #[arg(long)]
    pub fire_and_forget: bool,

    /// Print each interval as a JSON line
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, env = "PERIODIC_METRICS_DEBUG")]
    pub debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Config file
    /// 3. Defaults (lowest priority)
    pub fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        let config_path = match &self.config {
            Some(path) => Some(path.clone()),
            None => dirs::config_dir()
                .map(|d| d.join("periodic-metrics").join("config.yaml"))
                .filter(|path| path.exists()),
        };

        if let Some(path) = config_path {
            match std::fs::read_to_string(&path) {
                Ok(content) => builder = builder.from_yaml(&content)?,
                Err(e) => {
                    return Err(PeriodicError::config(format!(
                        "Failed to read config file {:?}: {}",
                        path, e
                    )));
                },
            }
        }

        self.apply_overrides(builder).build()
    }

    fn apply_overrides(&self, mut builder: ConfigBuilder) -> ConfigBuilder {
        if let Some(period) = self.period {
            builder = builder.rotation_interval(period);
        }
        if let Some(threads) = self.poll_threads {
            builder = builder.executor(ExecutorKind::Rayon).polling_threads(threads);
        }
        if self.fire_and_forget {
            builder = builder.dispatch_policy(DispatchPolicy::FireAndForget);
        }

        builder.debug(self.debug)
    }

    /// Initialize logging based on configuration.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let log_level = if config.debug {
            config.effective_log_level().as_str().to_string()
        } else {
            std::env::var("PERIODIC_METRICS_LOG_LEVEL")
                .unwrap_or_else(|_| config.effective_log_level().as_str().to_string())
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let fmt_layer = if config.logging.structured {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .compact()
        } else {
            tracing_subscriber::fmt::layer().with_target(false).compact()
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| PeriodicError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Execute the demo.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;
    cli.init_logging(&config)?;

    if cli.check_config {
        println!("Configuration is valid!");
        println!("  Rotation interval: {}", humantime::format_duration(config.rotation.interval));
        println!("  Final flush: {}", config.rotation.final_flush);
        println!("  Polling executor: {:?}", config.polling.executor);
        println!("  Polling threads: {}", config.polling.threads);
        println!("  Dispatch policy: {:?}", config.polling.policy);
        return Ok(());
    }

    if cli.workers == 0 {
        return Err(PeriodicError::config("at least one worker is required"));
    }

    run_demo(&cli, config).await
}

/// What the printer saw over the whole run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushTotals {
    pub intervals: u64,
    pub requests: i64,
}

async fn run_demo(cli: &Cli, config: Config) -> Result<()> {
    let (tx, rx) = crossbeam_channel::unbounded::<IntervalSnapshot>();
    let factory = InMemorySinkFactory::with_listener(move |snapshot: IntervalSnapshot| {
        // Printer gone means we are shutting down
        let _ = tx.send(snapshot);
    });

    let recorder = Arc::new(
        PeriodicRecorderBuilder::from_config(&config)?
            .sink_factory(factory)
            .build(),
    );
    register_polled_gauges(&recorder, cli.workers);

    let json = cli.json;
    let printer = std::thread::Builder::new()
        .name("periodic-printer".to_string())
        .spawn(move || print_intervals(&rx, json))?;

    let stop = Arc::new(AtomicBool::new(false));
    let issued = Arc::new(AtomicU64::new(0));
    let workers = spawn_workers(&recorder, cli.workers, &stop, &issued)?;

    let scheduler = RotationScheduler::new(config.rotation.interval)?
        .final_flush(config.rotation.final_flush)
        .spawn(Arc::clone(&recorder));

    tracing::info!(
        workers = cli.workers,
        period = %humantime::format_duration(config.rotation.interval),
        executor = recorder.executor_name(),
        "Recording started"
    );

    wait_for_stop(cli.duration).await;

    stop.store(true, Ordering::Relaxed);
    tokio::task::spawn_blocking(move || {
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("Worker thread panicked");
            }
        }
    })
    .await?;

    scheduler.shutdown().await?;
    let stats = recorder.stats();

    // The printer exits once the last sink (and its listener) is dropped
    drop(recorder);
    let totals = tokio::task::spawn_blocking(move || printer.join())
        .await?
        .map_err(|_| PeriodicError::executor("Printer thread panicked"))??;

    println!(
        "Flushed {} intervals: {} of {} requests ({} rotations, {} callback failures)",
        totals.intervals,
        totals.requests,
        issued.load(Ordering::Relaxed),
        stats.rotations,
        stats.callback_failures,
    );
    Ok(())
}

async fn wait_for_stop(duration: Option<Duration>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    match duration {
        Some(duration) => {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = ctrl_c => tracing::info!("Received shutdown signal, stopping..."),
            }
        },
        None => {
            ctrl_c.await;
            tracing::info!("Received shutdown signal, stopping...");
        },
    }
}

fn register_polled_gauges(recorder: &PeriodicRecorder, workers: usize) {
    let started = Instant::now();
    recorder.register_polled_metric(move |sink| {
        sink.record_gauge(
            "demo.uptime",
            GaugeValue::Float(started.elapsed().as_secs_f64()),
            Some(TimeUnit::Seconds.into()),
        );
        Ok(())
    });

    let workers = i64::try_from(workers).unwrap_or(i64::MAX);
    recorder.register_polled_metric(move |sink| {
        sink.record_gauge("demo.workers", GaugeValue::Integer(workers), None);
        Ok(())
    });
}

fn spawn_workers(
    recorder: &Arc<PeriodicRecorder>,
    count: usize,
    stop: &Arc<AtomicBool>,
    issued: &Arc<AtomicU64>,
) -> Result<Vec<JoinHandle<()>>> {
    (0..count)
        .map(|index| {
            let recorder = Arc::clone(recorder);
            let stop = Arc::clone(stop);
            let issued = Arc::clone(issued);

            std::thread::Builder::new()
                .name(format!("demo-worker-{}", index))
                .spawn(move || {
                    let mut iteration: i64 = 0;
                    while !stop.load(Ordering::Relaxed) {
                        let started = Instant::now();
                        recorder.record_counter(REQUESTS_COUNTER, 1);
                        issued.fetch_add(1, Ordering::Relaxed);

                        std::thread::sleep(Duration::from_micros(200 + (iteration % 7) as u64 * 100));
                        let elapsed = i64::try_from(started.elapsed().as_micros()).unwrap_or(i64::MAX);
                        recorder.record_timer("demo.latency", elapsed, Some(TimeUnit::Microseconds));
                        iteration += 1;
                    }
                })
                .map_err(PeriodicError::from)
        })
        .collect()
}

fn print_intervals(
    snapshots: &crossbeam_channel::Receiver<IntervalSnapshot>,
    json: bool,
) -> Result<FlushTotals> {
    let mut totals = FlushTotals::default();

    for snapshot in snapshots {
        totals.intervals += 1;
        totals.requests += snapshot.counter(REQUESTS_COUNTER).unwrap_or(0);

        if json {
            println!("{}", serde_json::to_string(&snapshot)?);
        } else {
            println!("{}", format_snapshot(&snapshot));
        }
    }

    Ok(totals)
}

/// One-line human summary of a flushed interval
pub fn format_snapshot(snapshot: &IntervalSnapshot) -> String {
    let span = match snapshot.closed_at {
        Some(closed_at) => {
            let millis = (closed_at - snapshot.opened_at).num_milliseconds();
            format!("{}ms", millis)
        },
        None => "open".to_string(),
    };

    let mut parts = vec![format!("interval #{} ({})", snapshot.sink_id, span)];
    parts.extend(
        snapshot
            .counters
            .iter()
            .map(|(name, value)| format!("{}={}", name, value)),
    );
    parts.extend(snapshot.timers.iter().map(|(name, samples)| {
        let total: i64 = samples.iter().map(|sample| sample.value).sum();
        let mean = if samples.is_empty() {
            0
        } else {
            total / samples.len() as i64
        };
        format!("{}[n={} mean={}]", name, samples.len(), mean)
    }));
    parts.extend(
        snapshot
            .gauges
            .iter()
            .map(|(name, reading)| format!("{}={}", name, reading.value)),
    );

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{GaugeReading, TimerSample};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn cli() -> Cli {
        Cli {
            config: None,
            period: None,
            workers: 4,
            duration: None,
            poll_threads: None,
            fire_and_forget: false,
            json: false,
            debug: false,
            check_config: false,
        }
    }

    #[test]
    fn test_cli_parses_durations() {
        let cli = Cli::try_parse_from([
            "periodic-metrics",
            "--period",
            "250ms",
            "--duration",
            "3s",
            "--workers",
            "2",
            "--fire-and-forget",
        ])
        .unwrap();

        assert_eq!(cli.period, Some(Duration::from_millis(250)));
        assert_eq!(cli.duration, Some(Duration::from_secs(3)));
        assert_eq!(cli.workers, 2);
        assert!(cli.fire_and_forget);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let cli = Cli {
            period: Some(Duration::from_secs(1)),
            poll_threads: Some(3),
            fire_and_forget: true,
            ..cli()
        };

        let builder = ConfigBuilder::new()
            .from_yaml("rotation:\n  interval: 10s\n")
            .unwrap();
        let config = cli.apply_overrides(builder).build().unwrap();

        assert_eq!(config.rotation.interval, Duration::from_secs(1));
        assert_eq!(config.polling.executor, ExecutorKind::Rayon);
        assert_eq!(config.polling.threads, 3);
        assert_eq!(config.polling.policy, DispatchPolicy::FireAndForget);
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/periodic-metrics.yaml")),
            ..cli()
        };

        let err = cli.load_config().unwrap_err();
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_format_snapshot() {
        let opened_at = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let snapshot = IntervalSnapshot {
            sink_id: 7,
            opened_at,
            closed_at: Some(opened_at + chrono::Duration::milliseconds(500)),
            counters: BTreeMap::from([(REQUESTS_COUNTER.to_string(), 42)]),
            timers: BTreeMap::from([(
                "demo.latency".to_string(),
                vec![
                    TimerSample { value: 100, unit: Some(TimeUnit::Microseconds) },
                    TimerSample { value: 300, unit: Some(TimeUnit::Microseconds) },
                ],
            )]),
            gauges: BTreeMap::from([(
                "demo.workers".to_string(),
                GaugeReading { value: GaugeValue::Integer(4), unit: None },
            )]),
            annotations: BTreeMap::new(),
        };

        assert_eq!(
            format_snapshot(&snapshot),
            "interval #7 (500ms) demo.requests=42 demo.latency[n=2 mean=200] demo.workers=4"
        );
    }
}

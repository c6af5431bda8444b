//! Setup routines for logging of the tracing process.
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use tracing::{Level, Metadata, Subscriber};
use tracing_appender::non_blocking;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Prefix of the log targets used by the library and this binary.
pub const LOG_PREFIX: &str = "qtrace";

fn log_filter(metadata: &Metadata<'_>) -> bool {
    metadata.target().starts_with(LOG_PREFIX) && *metadata.level() <= Level::INFO
}

fn verbose_filter(metadata: &Metadata<'_>) -> bool {
    metadata.target().starts_with(LOG_PREFIX)
}

/// Keeps the logging workers alive.
#[derive(Debug, Default)]
pub struct Tracer {
    /// Guard of the log file writer.
    pub logfile: Option<non_blocking::WorkerGuard>,
}

impl Tracer {
    /// Setup tracing subscribers for stdout and file logging.
    pub fn setup_tracing(logfile: Option<PathBuf>, verbose: bool) -> anyhow::Result<Self> {
        let mut tracer = Self::default();
        let file_layer = match logfile {
            Some(f) => Some(tracer.logfile_layer(f)?),
            None => None,
        };
        tracing_subscriber::registry()
            .with(tracer.stdout_layer(verbose))
            .with(file_layer)
            .init();
        Ok(tracer)
    }

    /// Initialize a file logger handle and non-blocking worker.
    fn init_writer(
        &self,
        file: PathBuf,
    ) -> anyhow::Result<(non_blocking::NonBlocking, non_blocking::WorkerGuard)> {
        let writer = BufWriter::new(File::create(file)?);
        Ok(non_blocking(writer))
    }

    /// Clean log with the most important events.
    fn stdout_layer<S>(&mut self, verbose: bool) -> impl Layer<S>
    where
        S: Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
    {
        let filter = if verbose { verbose_filter } else { log_filter };
        tracing_subscriber::fmt::layer()
            .without_time()
            .with_target(verbose)
            .with_level(verbose)
            .with_writer(std::io::stderr)
            .with_filter(filter_fn(filter))
    }

    fn logfile_layer<S>(&mut self, logfile: PathBuf) -> anyhow::Result<impl Layer<S>>
    where
        S: Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
    {
        let (non_blocking, guard) = self.init_writer(logfile)?;
        self.logfile = Some(guard);
        Ok(tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(non_blocking)
            .with_filter(filter_fn(verbose_filter)))
    }
}

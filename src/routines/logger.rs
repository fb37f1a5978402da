use std::time::Instant;

use crate::routines::output::OutputFile;
use crate::routines::settings::Settings;
use eyre::Result;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Setup logging for the library
///
/// Uses `tracing` with a `tracing-subscriber` registry. The level comes from
/// the `[log]` section and accepts any `EnvFilter` directive.
///
/// If `log.file` is set, messages are also written to that file inside the
/// output folder. Stdout logging can be turned off with `log.stdout = false`.
///
/// Installing a subscriber twice in one process is not an error; the first one
/// stays in place.
pub fn setup_log(settings: &Settings) -> Result<()> {
    let env_filter = EnvFilter::try_new(&settings.log.level)?;

    let timestamper = CompactTimestamp {
        start: Instant::now(),
    };

    let subscriber = Registry::default().with(env_filter);

    let file_layer = match &settings.log.file {
        Some(file) => {
            let folder = settings.paths.output.as_deref().unwrap_or(".");
            let outputfile = OutputFile::new(folder, file)?;
            Some(
                fmt::layer()
                    .with_writer(outputfile.file_owned())
                    .with_ansi(false)
                    .with_timer(timestamper.clone()),
            )
        }
        None => None,
    };

    let stdout_layer = if settings.log.stdout {
        Some(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(true)
                .with_target(false)
                .with_timer(timestamper.clone()),
        )
    } else {
        None
    };

    // A subscriber installed earlier in the process keeps receiving events
    let _ = subscriber.with(file_layer).with(stdout_layer).try_init();
    tracing::debug!("Logging is configured with level: {}", settings.log.level);

    Ok(())
}

#[derive(Clone)]
struct CompactTimestamp {
    start: Instant,
}

impl FormatTime for CompactTimestamp {
    fn format_time(
        &self,
        w: &mut tracing_subscriber::fmt::format::Writer<'_>,
    ) -> Result<(), std::fmt::Error> {
        let elapsed = self.start.elapsed();
        let hours = elapsed.as_secs() / 3600;
        let minutes = (elapsed.as_secs() % 3600) / 60;
        let seconds = elapsed.as_secs() % 60;

        write!(w, "{:02}h {:02}m {:02}s", hours, minutes, seconds)
    }
}

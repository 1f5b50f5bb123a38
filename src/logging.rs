use miette::{IntoDiagnostic, Result, WrapErr};
use owo_colors::OwoColorize;
use time::{
    format_description::{self, FormatItem},
    OffsetDateTime, UtcOffset,
};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{format, FmtContext, FormatEvent, FormatFields},
    registry::LookupSpan,
    FmtSubscriber,
};

/// Initialize the logging system.
///
/// The local offset must be resolved before other threads are spawned.
pub fn init_logging(level: Level, local_offset: UtcOffset) -> Result<()> {
    let console_logger = ConsoleLogger::new(local_offset)?;

    let subscriber = FmtSubscriber::builder()
        .event_format(console_logger)
        .with_max_level(level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .into_diagnostic()
        .wrap_err("Setting default subscriber failed")
}

/// Compact console format: "HH:MM:SS LEVEL message".
///
/// Events from helper threads also show the thread name.
struct ConsoleLogger {
    offset: UtcOffset,
    time_format: Vec<FormatItem<'static>>,
}

impl ConsoleLogger {
    fn new(offset: UtcOffset) -> Result<Self> {
        Ok(Self {
            offset,
            time_format: format_description::parse("[hour]:[minute]:[second]")
                .into_diagnostic()
                .wrap_err("Invalid log time format")?,
        })
    }
}

impl<S, N> FormatEvent<S, N> for ConsoleLogger
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();

        let now = OffsetDateTime::now_utc().to_offset(self.offset).time();
        let now = now.format(&self.time_format).map_err(|_| std::fmt::Error)?;

        let thread = std::thread::current();
        let thread_name = thread.name().filter(|&name| name != "main");

        if writer.has_ansi_escapes() {
            let level = match *metadata.level() {
                Level::ERROR => metadata.level().red().to_string(),
                Level::WARN => metadata.level().yellow().to_string(),
                Level::DEBUG | Level::TRACE => metadata.level().blue().to_string(),
                _ => metadata.level().green().to_string(),
            };

            write!(&mut writer, "{} {:>5} ", now.dimmed(), level)?;
            if let Some(name) = thread_name {
                write!(&mut writer, "{} ", name.yellow())?;
            }
        } else {
            write!(&mut writer, "{} {:>5} ", now, metadata.level())?;
            if let Some(name) = thread_name {
                write!(&mut writer, "{name} ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

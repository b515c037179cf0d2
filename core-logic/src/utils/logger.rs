use chrono::Local;
use nu_ansi_term::{Color, Style};
use std::fmt;
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    EnvFilter, Layer,
};

/// Console verbosity when `RUST_LOG` is not set.
const DEFAULT_CONSOLE_DIRECTIVES: &str = "warn,task_result=info,relay=info";

/// Installs the console + hourly rolling file subscriber.
///
/// The returned guard flushes the file writer on drop and must be kept alive
/// for the lifetime of the process.
pub fn setup_logger(log_dir: &str, file_prefix: &str) -> WorkerGuard {
    std::fs::create_dir_all(log_dir).ok();

    let file_appender = tracing_appender::rolling::hourly(log_dir, file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // File layer keeps the full step history plus warnings
    let file_filter = tracing_subscriber::filter::Targets::new()
        .with_target("task_result", tracing::Level::INFO)
        .with_target("relay", tracing::Level::INFO)
        .with_default(tracing::Level::WARN);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_CONSOLE_DIRECTIVES));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(TerminalFormatter)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    guard
}

// --- Formatters ---

struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn level_tag(level: &tracing::Level) -> String {
    match *level {
        tracing::Level::ERROR => Color::LightRed.bold().paint("[ERROR]").to_string(),
        tracing::Level::WARN => Color::Yellow.bold().paint("[WARN] ").to_string(),
        tracing::Level::INFO => Color::Green.paint("[INFO] ").to_string(),
        _ => Color::DarkGray.paint("[DEBUG]").to_string(),
    }
}

pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut msg_visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut msg_visitor);
        let msg = msg_visitor.message;

        // Colorization for Success and Failed
        let colored_msg = if msg.contains("Success") {
            let green_text = Style::new().fg(Color::LightGreen).bold();
            msg.replace("Success", &format!("{}", green_text.paint("Success")))
        } else if msg.contains("Failed") {
            let red_text = Style::new().fg(Color::LightRed).bold();
            msg.replace("Failed", &format!("{}", red_text.paint("Failed")))
        } else {
            msg
        };

        let time = Local::now().format("%H:%M:%S");
        write!(
            writer,
            "{} {} {}",
            Color::DarkGray.paint(time.to_string()),
            level_tag(event.metadata().level()),
            colored_msg
        )?;
        writeln!(writer)
    }
}

pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let level = event.metadata().level();

        write!(writer, "{} [{}] ", timestamp, level)?;

        let mut msg_visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut msg_visitor);
        writeln!(writer, "{}", msg_visitor.message)
    }
}

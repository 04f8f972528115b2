//! Console log format for the pairing service.
//!
//! Lines go to stderr as
//! `[timestamp] [service-component] LEVEL [device] message key=value ...`.
//! The `component` and `device` fields get their own columns; any other
//! structured field is appended after the message.

use std::fmt::{self, Write as _};
use std::io::IsTerminal;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_DIM: &str = "\x1b[2m";
const COLOR_BLUE: &str = "\x1b[34m";
const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_YELLOW: &str = "\x1b[33m";
const COLOR_RED: &str = "\x1b[31m";

const SERVICE_NAME_WIDTH: usize = 20;

/// Emit an event tagged with a component, e.g.
/// `component_event!(WARN, "bridge", "Skipping input line: {}", e)`
#[macro_export]
macro_rules! component_event {
    ($level:ident, $component:expr, $($arg:tt)*) => {
        tracing::event!(tracing::Level::$level, component = $component, $($arg)*)
    };
}

pub struct PairingLogFormatter {
    service_name: String,
    color_enabled: bool,
}

impl PairingLogFormatter {
    pub fn new(service_name: String) -> Self {
        Self {
            service_name,
            color_enabled: color_supported(),
        }
    }

    fn service_column(&self, component: Option<&str>) -> String {
        let name = match component {
            Some(comp) => format!("{}-{}", self.service_name, comp),
            None => self.service_name.clone(),
        };

        if name.chars().count() > SERVICE_NAME_WIDTH {
            let truncated: String = name.chars().take(SERVICE_NAME_WIDTH - 1).collect();
            format!("{truncated}…")
        } else {
            format!("{name:<SERVICE_NAME_WIDTH$}")
        }
    }

    fn paint(&self, level: &Level) -> (&'static str, &'static str) {
        if !self.color_enabled {
            return ("", "");
        }
        let color = match *level {
            Level::ERROR => COLOR_RED,
            Level::WARN => COLOR_YELLOW,
            Level::INFO => COLOR_GREEN,
            Level::DEBUG => COLOR_BLUE,
            Level::TRACE => COLOR_DIM,
        };
        (color, COLOR_RESET)
    }
}

impl<S, N> FormatEvent<S, N> for PairingLogFormatter
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
        let level = event.metadata().level();
        let mut fields = EventFields::default();
        event.record(&mut fields);

        let (color, reset) = self.paint(level);
        let dim = if self.color_enabled { COLOR_DIM } else { "" };

        write!(
            writer,
            "{dim}[{}]{reset} [{}] {color}{:<5}{reset} ",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            self.service_column(fields.component.as_deref()),
            level.as_str(),
        )?;
        if let Some(device) = &fields.device {
            write!(writer, "[{device}] ")?;
        }
        writeln!(writer, "{}{}", fields.message, fields.rest)
    }
}

/// Splits an event into its columns and trailing `key=value` pairs
#[derive(Default)]
struct EventFields {
    message: String,
    component: Option<String>,
    device: Option<String>,
    rest: String,
}

impl EventFields {
    fn put(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            "component" => self.component = Some(value),
            "device" => self.device = Some(value),
            name => {
                let _ = write!(self.rest, " {name}={value}");
            }
        }
    }
}

impl Visit for EventFields {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }
}

/// Colour only when stderr is a terminal that is not `dumb`
fn color_supported() -> bool {
    match std::env::var("TERM") {
        Ok(term) if term != "dumb" => std::io::stderr().is_terminal(),
        _ => false,
    }
}

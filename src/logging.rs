//! Console logging plus forwarding of the bot's own records to observers,
//! such as a Telegram chat watched by the operators.

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Records from other crates (HTTP clients, the Telegram library) are never
/// forwarded, so a sink that talks to a chat cannot feed on its own traffic.
const FORWARDED_TARGET: &str = "quiz_bot";

/// Receives formatted log lines. `emit` is called on the logging thread and
/// must not block.
pub trait LogSink: Send + Sync {
    fn emit(&self, line: &str);
}

pub struct QuizLogger {
    console: Box<dyn Log>,
    console_level: LevelFilter,
    sinks: Vec<Box<dyn LogSink>>,
    sink_level: LevelFilter,
}

impl QuizLogger {
    pub fn new(
        console: Box<dyn Log>,
        console_level: LevelFilter,
        sink_level: LevelFilter,
        sinks: Vec<Box<dyn LogSink>>,
    ) -> Self {
        Self {
            console,
            console_level,
            sinks,
            sink_level,
        }
    }

    fn max_level(&self) -> LevelFilter {
        if self.sinks.is_empty() {
            self.console_level
        } else {
            self.console_level.max(self.sink_level)
        }
    }

    fn forwards(&self, metadata: &Metadata) -> bool {
        !self.sinks.is_empty()
            && metadata.level() <= self.sink_level
            && metadata.target().starts_with(FORWARDED_TARGET)
    }
}

impl Log for QuizLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata) || self.forwards(metadata)
    }

    fn log(&self, record: &Record) {
        if self.console.enabled(record.metadata()) {
            self.console.log(record);
        }
        if self.forwards(record.metadata()) {
            let line = format!("{} - {} - {}", record.level(), record.target(), record.args());
            for sink in &self.sinks {
                sink.emit(&line);
            }
        }
    }

    fn flush(&self) {
        self.console.flush();
    }
}

/// Installs the global logger: pretty console output filtered by `RUST_LOG`
/// (this crate at `info` when unset) and `sinks` receiving this crate's
/// records at `sink_level` and above.
pub fn init(sink_level: LevelFilter, sinks: Vec<Box<dyn LogSink>>) -> Result<(), SetLoggerError> {
    let mut builder = pretty_env_logger::formatted_builder();
    match std::env::var("RUST_LOG") {
        Ok(filters) => {
            builder.parse_filters(&filters);
        }
        Err(_) => {
            builder.filter_module(FORWARDED_TARGET, LevelFilter::Info);
        }
    }
    let console = builder.build();
    let console_level = console.filter();

    let logger = QuizLogger::new(Box::new(console), console_level, sink_level, sinks);
    log::set_max_level(logger.max_level());
    log::set_boxed_logger(Box::new(logger))
}

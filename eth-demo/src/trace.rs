use clap::ValueEnum;
use eyre::Result;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    fmt,
    prelude::*,
    Layer, Registry,
};

/// Logging level. A "higher level" means more will be logged.
#[derive(Default, Debug, Clone, Copy, ValueEnum, PartialOrd, Ord, PartialEq, Eq)]
pub enum Level {
    Off = 0,
    Error = 1,
    Warn = 2,
    #[default]
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl From<Level> for LevelFilter {
    fn from(level: Level) -> LevelFilter {
        match level {
            Level::Off => LevelFilter::OFF,
            Level::Error => LevelFilter::ERROR,
            Level::Warn => LevelFilter::WARN,
            Level::Info => LevelFilter::INFO,
            Level::Debug => LevelFilter::DEBUG,
            Level::Trace => LevelFilter::TRACE,
        }
    }
}

/// Log output format
#[derive(Default, Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum Style {
    Pretty,
    Json,
    Compact,
    #[default]
    Full,
}

impl Style {
    fn layer(self) -> Box<dyn Layer<Registry> + Send + Sync> {
        // stdout carries the report
        let layer = fmt::layer().with_writer(std::io::stderr);
        match self {
            Style::Pretty => layer.pretty().boxed(),
            Style::Json => layer.json().boxed(),
            Style::Compact => layer.compact().boxed(),
            Style::Full => layer.boxed(),
        }
    }
}

/// Install the global subscriber.
pub fn start_tracing(level: Level, style: Style) -> Result<()> {
    let mut target_layer = Targets::new().with_default(level);
    if level < Level::Trace {
        // only show these debug and trace logs at trace level
        target_layer = target_layer.with_target("hyper", Level::Info);
        target_layer = target_layer.with_target("reqwest", Level::Info);
        target_layer = target_layer.with_target("rustls", Level::Info);
    }

    tracing_subscriber::registry()
        .with(style.layer())
        .with(target_layer)
        .try_init()?;
    Ok(())
}

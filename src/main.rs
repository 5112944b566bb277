mod app;

use std::io::stdout;

use anyhow::Result;
use chattree::color::supports_colors;
use chattree::config::Config;
use crossterm::{
    ExecutableCommand,
    event::{DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture},
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::App;

fn main() -> Result<()> {
    // Set up file logging (logs to chattree.log), the guard flushes on exit
    let appender = tracing_appender::rolling::never(".", "chattree.log");
    let (writer, _guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    info!("chattree starting");
    let config = Config::from_env();
    info!("colors supported: {}", supports_colors());

    // Enter alternate screen buffer and enable raw mode
    terminal::enable_raw_mode()?;
    stdout()
        .execute(EnterAlternateScreen)?
        .execute(EnableMouseCapture)?
        .execute(EnableBracketedPaste)?;

    let result = App::new(&config).run();

    // Always restore terminal state, even if run() fails
    stdout()
        .execute(DisableBracketedPaste)?
        .execute(DisableMouseCapture)?
        .execute(LeaveAlternateScreen)?;
    terminal::disable_raw_mode()?;

    info!("chattree shutting down");
    result
}

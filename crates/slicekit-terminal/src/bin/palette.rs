//! Console Palette
//!
//! Prints the 16-colour palette as ANSI text routed through the attribute
//! cache.
//!
//! Run: cargo run --bin palette --features palette -- --help

use std::io::{self, Write};

use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

use slicekit_terminal::{
    AnsiToConsole, ConsoleApi, Coord, RecordingConsole, Stream, WinTerm,
};

/// Print every foreground on every background through the attribute cache
#[derive(Parser)]
#[command(name = "palette", version, about, long_about = None)]
struct Cli {
    /// Colour standard error instead of standard output
    #[arg(long)]
    stderr: bool,

    /// Clear the screen first
    #[arg(long)]
    clear: bool,

    /// Record console calls instead of making them, then print the log
    #[arg(long)]
    dry_run: bool,

    /// Buffer width reported in dry-run mode
    #[arg(long, default_value = "80")]
    columns: u16,

    /// Buffer height reported in dry-run mode
    #[arg(long, default_value = "25")]
    rows: u16,
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::WARN.into()))
        .with_writer(io::stderr)
        .init();

    let stream = Stream::select(cli.stderr);

    if cli.dry_run {
        let console = RecordingConsole::new(0x07, Coord::new(cli.columns, cli.rows));
        let term = render(WinTerm::new(console)?, io::sink(), stream, cli.clear)?;
        let mut out = io::stdout().lock();
        for call in term.console().calls() {
            writeln!(out, "{call:?}")?;
        }
        return Ok(());
    }

    let text: Box<dyn Write> = match stream {
        Stream::Stdout => Box::new(io::stdout()),
        Stream::Stderr => Box::new(io::stderr()),
    };

    #[cfg(windows)]
    let console = slicekit_terminal::Win32Console::new();
    #[cfg(not(windows))]
    let console = slicekit_terminal::CrosstermConsole::stdio();

    render(WinTerm::new(console)?, text, stream, cli.clear)?;
    Ok(())
}

/// Write the palette grid and hand back the attribute cache.
fn render<C: ConsoleApi, W: Write>(
    term: WinTerm<C>,
    text: W,
    stream: Stream,
    clear: bool,
) -> io::Result<WinTerm<C>> {
    debug!(defaults = term.defaults().word, ?stream, "rendering palette");
    let mut out = AnsiToConsole::new(text, term, stream);
    if clear {
        write!(out, "\x1b[2J")?;
    }
    for back in 0..8 {
        for fore in 0..16 {
            let fore_code = if fore < 8 { 30 + fore } else { 90 + fore - 8 };
            write!(out, "\x1b[{};{}m {:X}{} ", 40 + back, fore_code, fore, back)?;
        }
        writeln!(out, "\x1b[0m")?;
    }
    out.flush()?;
    let (_, term) = out.into_inner();
    Ok(term)
}

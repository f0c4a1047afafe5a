//! tiny-highlight - highlight a source file in the terminal
//!
//! Highlights the file, comments out the first line of its body to exercise
//! incremental re-highlighting, and prints both versions with ANSI colors.

use clap::Parser;
use crossbeam::channel::{unbounded, RecvTimeoutError};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tiny_highlight::{
    BufferHighlighter, HighlightError, HighlighterConfig, Languages, SharedBuffer, StyleResolver,
    StyledBuffer, ThemeResolver, Themes, TreeSitterClient, UnderlineStyle,
};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "tiny-highlight", about = "Highlight a source file in the terminal", version)]
struct Args {
    /// Source file to highlight
    path: PathBuf,

    /// Highlighter settings (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Color theme
    #[arg(short, long)]
    theme: Option<String>,

    /// Query on a background thread
    #[arg(long = "async")]
    asynchronous: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("tiny-highlight: {err}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), HighlightError> {
    let mut config = match &args.config {
        Some(path) => HighlighterConfig::load(path)?,
        None => HighlighterConfig::synchronous(),
    };
    if args.asynchronous {
        config.mode = HighlighterConfig::asynchronous(true).mode;
    }

    let theme = match args.theme.as_deref() {
        Some(name) => Themes::by_name(name).ok_or_else(|| HighlightError::UnknownTheme(name.to_string()))?,
        None => Themes::one_dark(),
    };
    let resolver = Rc::new(ThemeResolver::new(theme));

    let language = Languages::for_path(&args.path)?;
    let bytes = std::fs::read(&args.path)?;
    let buffer = SharedBuffer::with_resolver(StyledBuffer::from_bytes(&bytes)?, resolver.clone());

    let (wake_tx, wake_rx) = unbounded::<()>();
    let waker = Arc::new(move || {
        let _ = wake_tx.send(());
    });
    let client = TreeSitterClient::new(language)?.with_config(&config);
    let highlighter = BufferHighlighter::with_waker(buffer.clone(), client, config, waker)?;

    settle(&highlighter, &wake_rx);
    print_buffer(&buffer, resolver.as_ref());

    if let Some(pos) = first_body_line(&buffer.text()) {
        println!("\n--- after commenting out line at byte {pos} ---\n");
        buffer.insert(pos, "// ");
        settle(&highlighter, &wake_rx);
        print_buffer(&buffer, resolver.as_ref());
    }

    let stats = highlighter.highlighter().stats();
    tracing::info!(?stats, "done");
    Ok(())
}

/// Drain asynchronous deliveries until nothing is stale
fn settle(highlighter: &BufferHighlighter<TreeSitterClient>, wake_rx: &crossbeam::channel::Receiver<()>) {
    while !highlighter.highlighter().is_idle() {
        match wake_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(()) => {
                highlighter.process_events();
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!("timed out waiting for tokens");
                return;
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// Start of the line after the first `{` line, if any
fn first_body_line(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let brace = memchr::memchr(b'{', bytes)?;
    let newline = memchr::memchr(b'\n', &bytes[brace..])? + brace;
    let start = newline + 1;
    let indent = bytes[start..].iter().take_while(|b| **b == b' ' || **b == b'\t').count();
    (start + indent < bytes.len()).then_some(start + indent)
}

fn print_buffer(buffer: &SharedBuffer, resolver: &dyn StyleResolver) {
    let text = buffer.text();
    let mut out = String::with_capacity(text.len() * 2);
    let mut pos = 0;

    for run in buffer.runs() {
        let (Some(gap), Some(styled)) = (text.get(pos..run.range.start), text.get(run.range.clone())) else {
            continue;
        };
        out.push_str(gap);
        let style = resolver.resolve(&run.token);
        out.push_str(&ansi_prefix(&style));
        out.push_str(styled);
        out.push_str("\x1b[0m");
        pos = run.range.end;
    }
    out.push_str(text.get(pos..).unwrap_or_default());
    println!("{out}");
}

fn ansi_prefix(style: &tiny_highlight::StyleAttributes) -> String {
    let (r, g, b) = style.rgb();
    let mut codes = format!("\x1b[38;2;{r};{g};{b}");
    if style.weight == tiny_highlight::FontWeight::Bold {
        codes.push_str(";1");
    }
    if style.italic {
        codes.push_str(";3");
    }
    match style.underline {
        Some(UnderlineStyle::Wavy) => codes.push_str(";4:3"),
        Some(_) => codes.push_str(";4"),
        None => {}
    }
    codes.push('m');
    codes
}

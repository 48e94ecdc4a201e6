//! Command-line element scanner.
//!
//! Streams each input through an [`ElementScanner`] and prints every element
//! matching one of the given patterns, or just how many matched.

use std::cell::Cell;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xmlscan::serial::{serialize_node_with_options, SerializeOptions};
use xmlscan::{ElementScanner, ParseOptions, ScanError, ScanStats};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// xmlscan -- print the elements of XML documents that match path patterns.
///
/// Patterns use a small XPath-like syntax: `item`, `channel/item`,
/// `/feed/entry`, `rss//link`, `entry[@lang = 'en']`.
#[derive(Parser, Debug)]
#[command(name = "xmlscan", version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// XML files to scan (use `-` for stdin).
    #[arg(required = true)]
    files: Vec<String>,

    /// Pattern selecting the elements to print. May be repeated.
    #[arg(short, long = "pattern", value_name = "PATTERN", required = true)]
    patterns: Vec<String>,

    /// Leave whitespace-only text out of matched elements.
    #[arg(long)]
    strip_whitespace: bool,

    /// Report entity references instead of expanding internal entities.
    #[arg(long)]
    no_expand_entities: bool,

    /// Pretty-print (indent) matched elements.
    #[arg(long)]
    format: bool,

    /// Print the number of matches per pattern instead of the elements.
    #[arg(long)]
    count: bool,

    /// Log scan progress to stderr (overridden by `RUST_LOG`).
    #[arg(short, long)]
    verbose: bool,
}

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

const EXIT_SUCCESS: u8 = 0;
const EXIT_PARSE_ERROR: u8 = 1;
const EXIT_PATTERN_ERROR: u8 = 2;

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = ParseOptions::default()
        .strip_whitespace(cli.strip_whitespace)
        .expand_entities(!cli.no_expand_entities);
    let mut scanner = ElementScanner::with_options(options);

    let counts = match register_patterns(&cli, &mut scanner) {
        Ok(counts) => counts,
        Err(msg) => {
            eprintln!("xmlscan: {msg}");
            return ExitCode::from(EXIT_PATTERN_ERROR);
        }
    };

    let mut worst_exit = EXIT_SUCCESS;
    for file in &cli.files {
        match scan_file(&mut scanner, file) {
            Ok(stats) => tracing::info!(
                file = file.as_str(),
                elements = stats.elements,
                materialized = stats.materialized,
                matches = stats.notifications,
                "scanned"
            ),
            Err(err) => {
                eprintln!("{file}: {err}");
                worst_exit = EXIT_PARSE_ERROR;
            }
        }
    }

    if cli.count {
        for (pattern, count) in cli.patterns.iter().zip(&counts) {
            println!("{}\t{pattern}", count.get());
        }
    }

    ExitCode::from(worst_exit)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "xmlscan=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Registers one listener per pattern and returns their match counters.
fn register_patterns(
    cli: &Cli,
    scanner: &mut ElementScanner,
) -> Result<Vec<Rc<Cell<u64>>>, String> {
    let serialize_options = SerializeOptions::default().indent(cli.format);
    let mut counts = Vec::with_capacity(cli.patterns.len());

    for pattern in &cli.patterns {
        let count = Rc::new(Cell::new(0u64));
        let counter = Rc::clone(&count);
        let print = !cli.count;
        let serialize_options = serialize_options.clone();

        scanner
            .listen(pattern, move |path, doc, node| {
                counter.set(counter.get() + 1);
                if print {
                    let xml = serialize_node_with_options(doc, node, &serialize_options);
                    writeln!(io::stdout().lock(), "{path}\t{xml}")?;
                }
                Ok(())
            })
            .map_err(|err| format!("invalid pattern '{pattern}': {err}"))?;
        counts.push(count);
    }
    Ok(counts)
}

fn scan_file(scanner: &mut ElementScanner, filename: &str) -> Result<ScanStats, ScanError> {
    if filename == "-" {
        scanner.parse_reader(io::stdin().lock())
    } else {
        scanner.parse_reader(BufReader::new(File::open(filename)?))
    }
}

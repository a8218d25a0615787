//! bible-epub - MySword Bible to EPUB converter

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bible_epub::source::sqlite::{self, SourcePaths};
use bible_epub::{ConvertOptions, convert_to_path, default_title};

#[derive(Parser)]
#[command(name = "bible-epub")]
#[command(version, about = "Convert MySword Bible databases to EPUB", long_about = None)]
#[command(after_help = "EXAMPLES:
    bible-epub --bbl KJV.bbl.mybible --lang en.lang.mybible
    bible-epub --bbl KJV.bbl.mybible --lang en.lang.mybible --xrefs tsk.xrefs.twm -o kjv.epub")]
struct Cli {
    /// Bible text database (.bbl.mybible)
    #[arg(long, value_name = "PATH")]
    bbl: PathBuf,

    /// Book names database (.lang.mybible)
    #[arg(long, value_name = "PATH")]
    lang: PathBuf,

    /// Cross-reference database (.xrefs.twm)
    #[arg(long, value_name = "PATH")]
    xrefs: Option<PathBuf>,

    /// Book title [default: --bbl file name without .bbl.mybible]
    #[arg(long)]
    title: Option<String>,

    /// Output file [default: <title>.epub]
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Language code, overriding the one in the databases
    #[arg(long)]
    language: Option<String>,

    /// Deflate compression level
    #[arg(long, value_name = "0-9", default_value_t = 6, value_parser = clap::value_parser!(u32).range(0..=9))]
    compression: u32,

    /// Only print warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Print debug output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}: {e}", e.stage());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> bible_epub::Result<()> {
    let title = cli.title.unwrap_or_else(|| default_title(&cli.bbl));
    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{title}.epub")));

    let paths = SourcePaths {
        bible: cli.bbl,
        books: cli.lang,
        cross_references: cli.xrefs,
    };
    let data = sqlite::load(&paths).await?;

    let mut options = ConvertOptions::new(title).with_compression_level(cli.compression);
    if let Some(language) = cli.language {
        options = options.with_language(language);
    }

    let report = convert_to_path(data, &options, &output)?;
    info!(
        books = report.books,
        chapters = report.chapters,
        verses = report.verses,
        cross_references = report.cross_reference_links,
        "done"
    );
    if !report.diagnostics.is_clean() {
        warn!("{}", report.diagnostics);
    }
    Ok(())
}

fn init_logging(cli: &Cli) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("bible_epub=debug,info")
    } else {
        EnvFilter::new("info")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

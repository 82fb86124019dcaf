use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use triangle::config::CompileOptions;
use triangle::emitter::ObjectProgram;
use triangle::Compiler;

const EXIT_COMPILE_ERRORS: i32 = 1;
const EXIT_IO: i32 = 2;

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "tc", about = "Triangle to TAM compiler", version)]
struct Cli {
    /// Triangle source file
    source: PathBuf,

    /// Object file to write
    #[arg(short, long, default_value = "obj.tam")]
    output: PathBuf,

    /// Fold integer-constant arithmetic before code generation
    #[arg(long)]
    folding: bool,

    /// Print the decorated tree after checking
    #[arg(long)]
    show_tree: bool,

    /// Print the tree after constant folding
    #[arg(long)]
    show_tree_after: bool,

    /// Log every run-time entity the encoder lays out (needs -v)
    #[arg(long)]
    show_table: bool,

    /// Print node counts for the parsed program
    #[arg(long)]
    show_stats: bool,

    /// Print the generated instructions
    #[arg(long)]
    listing: bool,

    #[arg(long, value_enum, default_value_t = ListingFormat::Text)]
    listing_format: ListingFormat,

    /// JSON options file; command-line flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum ListingFormat {
    Text,
    Json,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .try_init();
}

fn options(cli: &Cli) -> CompileOptions {
    let mut options = match &cli.config {
        Some(path) => match CompileOptions::load(path) {
            Ok(options) => options,
            Err(e) => {
                eprintln!("tc: {e}");
                process::exit(EXIT_IO);
            }
        },
        None => CompileOptions::default(),
    };
    options.folding |= cli.folding;
    options.show_table |= cli.show_table;
    options
}

fn print_listing(object: &ObjectProgram, format: ListingFormat) {
    let text = match format {
        ListingFormat::Text => object.listing(),
        ListingFormat::Json => match object.listing_json() {
            Ok(json) => json + "\n",
            Err(e) => {
                eprintln!("tc: {e}");
                process::exit(EXIT_IO);
            }
        },
    };
    let _ = io::stdout().write_all(text.as_bytes());
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let source = match std::fs::read_to_string(&cli.source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("tc: cannot read {}: {e}", cli.source.display());
            process::exit(EXIT_IO);
        }
    };

    eprintln!("********** Triangle Compiler **********");
    let mut compiler = Compiler::new(options(&cli));
    let program = compiler.parse(&source).and_then(|mut program| {
        if cli.show_stats {
            println!("{}", program.stats());
        }
        let checked = compiler.check(&mut program);
        if cli.show_tree {
            println!("{program:#?}");
        }
        checked.then_some(program)
    });

    let object = program.map(|mut program| {
        if compiler.options().folding {
            let folds = compiler.fold(&mut program);
            tracing::info!(folds, "folded constant expressions");
            if cli.show_tree_after {
                println!("{program:#?}");
            }
        }
        compiler.encode(&program)
    });

    let errors = compiler.into_errors();
    for error in &errors {
        eprintln!("{}", error.format_with_source(&source));
    }

    match object {
        Some(object) if errors.is_empty() => {
            if cli.listing {
                print_listing(&object, cli.listing_format);
            }
            if let Err(e) = object.save(&cli.output) {
                eprintln!("tc: {e}");
                process::exit(EXIT_IO);
            }
            eprintln!("Compilation was successful.");
        }
        _ => {
            eprintln!("Compilation was unsuccessful.");
            process::exit(EXIT_COMPILE_ERRORS);
        }
    }
}

use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use checkin_report::{Config, Record, ReportError, SqliteRecordStore};
use clap::{Parser, Subcommand};
use log::info;

/// Serves and renders driver registration reports.
///
/// Settings come from `checkin.toml` (or `--config`) and `CHECKIN_` environment
/// variables.  Fonts are looked up under `assets/fonts` or the directory named
/// by `CHECKIN_REPORT_FONTS_DIR`, falling back to installed system fonts.
#[derive(Parser)]
#[command(author, version, about = "Driver registration PDF reports")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service.
    Serve,

    /// Render the report of one registration into a file.
    Render {
        /// Registration identifier.
        #[arg(long)]
        id: i64,

        /// Destination PDF file.
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Insert registrations from a JSON array into the database.
    Seed {
        /// JSON file holding an array of registrations.
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {}", err);
        print_error_sources(err.as_ref());
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = Config::load_from(cli.config)?;

    match cli.command {
        Commands::Serve => checkin_report::server::serve(&config).await?,
        Commands::Render { id, output } => render(&config, id, output).await?,
        Commands::Seed { file } => seed(&config, &file)?,
    }
    Ok(())
}

async fn render(config: &Config, id: i64, output: PathBuf) -> Result<(), Box<dyn Error>> {
    let renderer = checkin_report::server::build_renderer(config)?;
    let prepared = renderer.prepare(id).await?;

    let file = File::create(&output).map_err(ReportError::Sink)?;
    let summary = tokio::task::spawn_blocking(move || prepared.write_to(BufWriter::new(file)))
        .await??;

    info!(
        "wrote {} ({} page(s), {} photo(s))",
        output.display(),
        summary.page_count,
        summary.placements.len()
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn seed(config: &Config, file: &Path) -> Result<(), Box<dyn Error>> {
    let records: Vec<Record> = serde_json::from_reader(File::open(file)?)?;
    let store = SqliteRecordStore::open(&config.store.database_path)?;
    for record in &records {
        let id = store.insert(record)?;
        println!("{}\t{}", id, record.name());
    }
    info!(
        "seeded {} registration(s) into {}",
        records.len(),
        store.path().display()
    );
    Ok(())
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}

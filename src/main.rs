//! xmi-split CLI: split an XMI document into annotation modules.

use std::path::PathBuf;

use clap::Parser;
use miette::{IntoDiagnostic, Result};

use xmi_splitter::catalog::StaticTypeCatalog;
use xmi_splitter::config::SplitterConfig;
use xmi_splitter::splitter::{SplitState, XmiSplitter};

#[derive(Parser)]
#[command(
    name = "xmi-split",
    version,
    about = "Split an XMI document into annotation modules"
)]
struct Cli {
    /// Splitter configuration (TOML).
    #[arg(long)]
    config: PathBuf,

    /// Type catalog (TOML).
    #[arg(long)]
    types: PathBuf,

    /// State file from a previous split of the same document (JSON).
    #[arg(long)]
    state: Option<PathBuf>,

    /// First identifier to allocate; overrides the state file.
    #[arg(long)]
    next_id: Option<u64>,

    /// Output directory for module files and the updated state.
    #[arg(long)]
    out: PathBuf,

    /// XMI document to split.
    document: PathBuf,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = SplitterConfig::load(&cli.config)?;
    let catalog = StaticTypeCatalog::load(&cli.types)?;
    let splitter = XmiSplitter::new(config)?;

    let mut state = match &cli.state {
        Some(path) => {
            let content = std::fs::read_to_string(path).into_diagnostic()?;
            serde_json::from_str::<SplitState>(&content).into_diagnostic()?
        }
        None => SplitState::default(),
    };
    if let Some(next_id) = cli.next_id {
        state.next_free_id = next_id;
    }

    let xmi = std::fs::read(&cli.document).into_diagnostic()?;
    let result = splitter.process_with_state(&xmi, &catalog, &state)?;

    std::fs::create_dir_all(&cli.out).into_diagnostic()?;
    for module in &result.modules {
        let path = cli.out.join(format!("{}.xmi", module.name));
        std::fs::write(&path, &module.data).into_diagnostic()?;
        println!(
            "  {:<40} {:>6} records  {:>9} bytes",
            module.name,
            module.records,
            module.data.len()
        );
    }

    let state_path = cli.out.join("state.json");
    let state_json = serde_json::to_string_pretty(&result.state()).into_diagnostic()?;
    std::fs::write(&state_path, state_json).into_diagnostic()?;

    println!(
        "Split {} into {} module(s); next free id {}, state written to {}",
        cli.document.display(),
        result.modules.len(),
        result.next_free_id,
        state_path.display()
    );

    Ok(())
}

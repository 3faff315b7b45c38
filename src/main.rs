use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

use treedeco::config::{DecorationConfig, DEFAULT_CONFIG_FILE};
use treedeco::crawler::FileCrawler;
use treedeco::render::decorated_rows;
use treedeco::tree::FileTree;
use treedeco::DecorationsManager;

/// Print a directory tree with its decorations applied.
#[derive(Debug, Parser)]
#[command(name = "treedeco", version)]
struct Cli {
    /// Directory to scan
    root: PathBuf,

    /// Decoration file (defaults to ROOT/.treedeco.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Deepest level to print (root = 0)
    #[arg(short, long)]
    depth: Option<usize>,

    /// Disable a decoration by name after loading
    #[arg(long = "disable", value_name = "NAME")]
    disabled: Vec<String>,

    /// Only print rows that carry at least one classname
    #[arg(long)]
    decorated_only: bool,

    /// Verbose logging (same as RUST_LOG=debug)
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if !cli.root.is_dir() {
        bail!("{} is not a directory", cli.root.display());
    }

    let mut crawler = FileCrawler::new();
    if let Some(depth) = cli.depth {
        crawler = crawler.with_max_depth(depth);
    }
    let (nodes, stats) = crawler.scan(&cli.root);
    let tree = FileTree::from_scan(&cli.root, &nodes);
    info!(
        "{} files, {} dirs in {}ms ({} unreadable)",
        stats.total_files, stats.total_dirs, stats.duration_ms, stats.skipped_errors
    );

    let mut manager = DecorationsManager::new();
    tree.register_with(&mut manager)
        .context("failed to mirror the scanned tree")?;

    let config_path = cli.config.clone().unwrap_or_else(|| cli.root.join(DEFAULT_CONFIG_FILE));
    match DecorationConfig::load_from_path(&config_path)? {
        Some(config) => {
            for spec in &config.decorations {
                manager.add_decoration(spec.build(|path| tree.resolve(path)));
            }
            info!("loaded {} decorations from {}", config.decorations.len(), config_path.display());
        }
        None if cli.config.is_some() => bail!("decoration file {} does not exist", config_path.display()),
        None => info!("no decoration file at {}", config_path.display()),
    }

    for name in &cli.disabled {
        match manager.find_decoration(name) {
            Some(id) => {
                manager.disable(id);
            }
            None => warn!("--disable {name}: no such decoration"),
        }
    }

    for row in decorated_rows(&tree, &manager, cli.depth) {
        if cli.decorated_only && row.classnames.is_empty() {
            continue;
        }
        println!("{}", row.display_line());
    }
    Ok(())
}

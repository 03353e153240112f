use std::io;

use anyhow::{Context, Result};
use flowquiz::config::QuizConfig;
use flowquiz::quiz;
use flowquiz::store::FileStateStore;
use flowquiz::tally::FileTally;
use log::info;

const BUILTIN_TITLE: &str = "SHOULD YOU USE VERCEL?";

fn main() -> Result<()> {
    // Initialize logging. Control verbosity with RUST_LOG env var:
    //   RUST_LOG=info   cargo run -- tree.mmd   # loading + transitions
    //   RUST_LOG=debug  cargo run -- tree.mmd   # + tally writes, skipped input
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = QuizConfig::from_args(std::env::args().skip(1), |key| std::env::var(key).ok())?;
    info!("Config: {config:?}");

    let (title, tree) = match &config.tree_path {
        Some(path) => {
            let title = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_uppercase())
                .unwrap_or_default();
            (title, quiz::source::load_tree(path)?)
        }
        None => (
            BUILTIN_TITLE.to_string(),
            quiz::tree::should_you_use_vercel().context("built-in tree is invalid")?,
        ),
    };

    println!("Loaded decision tree");
    println!("  Root       : {}", tree.root().id);
    println!("  Nodes      : {}", tree.len());
    println!("  Outcomes   : {}", tree.terminals().len());
    println!("  Max steps  : {}", tree.total_steps());

    let tally = FileTally::new(&config.tally_path);
    info!("Tally file: {}", tally.path().display());
    if config.results {
        return quiz::show_results(&tree, &tally, &mut io::stdout());
    }

    let store = FileStateStore::new(&config.state_path);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();
    quiz::run(&title, &tree, &tally, &store, &mut input, &mut out)
}

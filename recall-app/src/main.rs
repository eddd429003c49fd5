mod cli;
mod logging;
pub mod api;
pub mod tui;

use anyhow::Result;
use clap::Parser; // needed for Cli::parse()
use std::sync::Arc;
use tokio::runtime::Runtime;

use cli::commands::{open_repo, run_cli, session_config};
use cli::opts::{Cli, Command};
use recall_json::paths::data_root;
use tui::app::TuiApp;

fn main() -> Result<()> {
    let args = Cli::parse();

    match &args.cmd {
        // TUI drives its own runtime with block_on (no nested Tokio)
        Command::Tui(t) => {
            logging::init_file(args.verbose, &data_root())?;
            let rt = Arc::new(Runtime::new()?);
            let repo = rt.block_on(open_repo(args.store, args.db_path.clone()))?;
            let config = session_config(args.calendar, t.strict, Some(t.max));
            let mut app = TuiApp::new(repo, rt, config);
            app.run()
        }
        _ => {
            logging::init_stderr(args.verbose);
            let rt = Runtime::new()?;
            rt.block_on(run_cli(args))
        }
    }
}

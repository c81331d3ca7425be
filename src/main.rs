use clap::{Parser, Subcommand};
use commands::{chat::*, links::*, settings::*};
use models::links::LinkSort;
use models::settings::AppState;
use services::{data_dir_service, diagnostic_logger};
use std::path::PathBuf;

mod commands;
mod models;
mod services;
mod utils;

/// Track the links shared in Kick chat
#[derive(Parser)]
#[command(name = "linknook", version, about)]
struct Cli {
    /// Use this directory for settings and stored links
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Do not load or save per-channel links
    #[arg(long, global = true)]
    no_persist: bool,

    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Join a channel's chat and collect links as they are posted
    Watch {
        /// Kick username; defaults to the last joined channel
        username: Option<String>,
    },
    /// Print the stored links of a channel
    Links {
        slug: String,
        #[arg(long, default_value = "recent")]
        sort: LinkSort,
        /// Group by hostname
        #[arg(long)]
        grouped: bool,
    },
    /// Remove one stored link
    Remove { slug: String, url: String },
    /// Forget every stored link of a channel
    Clear { slug: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let data_dir = match data_dir_service::resolve_data_dir(cli.data_dir.as_deref()) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let settings = load_settings_from_file(&data_dir);
    diagnostic_logger::init_logging(cli.verbose || settings.diagnostics_enabled);
    log::debug!("[Main] Data directory: {}", data_dir.display());

    let state = AppState::new(settings, data_dir);

    let result = match cli.command {
        Command::Watch { username } => watch(&state, username, !cli.no_persist).await,
        Command::Links { slug, sort, grouped } => {
            if grouped {
                get_grouped_links(&state, &slug, sort).map(|groups| print_groups(&groups))
            } else {
                get_stored_links(&state, &slug, sort).map(|links| print_links(&links))
            }
        }
        Command::Remove { slug, url } => remove_stored_link(&state, &slug, &url)
            .map(|left| println!("{} links left for {}", left.len(), slug.trim())),
        Command::Clear { slug } => clear_stored_links(&state, &slug),
    };

    if let Err(e) = result {
        log::error!("[Main] {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

//! Screenwright - action decoding for desktop-automation agents
//!
//! Main entry point for the CLI application.

use std::io::{self, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use screenwright::cli::{config_command, decode_command, dispatch_command, ConfigAction};
use screenwright::core::{ScreenSize, Tag};
use screenwright::decode::Dialect;
use screenwright::Config;
use tracing_subscriber::EnvFilter;

/// Screenwright - decode model replies into desktop actions
#[derive(Parser, Debug)]
#[command(name = "screenwright")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug output
    #[arg(long, short = 'd', global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a model reply and print the actions as JSON
    Decode {
        /// fenced, planner, atlas, uground or structured_thought
        #[arg(long, short = 'D', default_value = "fenced")]
        dialect: Dialect,

        /// Reply file; stdin when omitted
        file: Option<PathBuf>,

        /// Screen width for grid coordinates
        #[arg(long)]
        width: Option<u32>,

        /// Screen height for grid coordinates
        #[arg(long)]
        height: Option<u32>,

        /// Set-of-marks boxes as a JSON array of {x, y, width, height}
        #[arg(long)]
        tags: Option<String>,
    },

    /// Classify a primitive line
    Dispatch {
        /// e.g. "WAIT 2" or "ANS hello world"
        line: Vec<String>,
    },

    /// Show configuration
    Config {
        /// Print the configuration file path
        #[arg(long, conflicts_with = "show")]
        path: bool,

        /// Print the effective configuration
        #[arg(long)]
        show: bool,

        /// Read this file instead of the default location
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn init_tracing(debug: bool) {
    let default = if debug { "screenwright=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    match args.command {
        Command::Decode {
            dialect,
            file,
            width,
            height,
            tags,
        } => {
            let text = match file {
                Some(path) => std::fs::read_to_string(path)?,
                None => {
                    let mut text = String::new();
                    io::stdin().read_to_string(&mut text)?;
                    text
                }
            };

            let configured = Config::load().screen;
            let screen = ScreenSize::new(
                width.unwrap_or(configured.width),
                height.unwrap_or(configured.height),
            );
            let tags: Option<Vec<Tag>> = tags.as_deref().map(serde_json::from_str).transpose()?;

            println!("{}", decode_command(dialect, &text, screen, tags)?);
        }
        Command::Dispatch { line } => {
            println!("{}", dispatch_command(&line.join(" ")));
        }
        Command::Config { path, show, file } => {
            let action = if path {
                ConfigAction::Path
            } else if show || file.is_some() {
                ConfigAction::Show
            } else {
                ConfigAction::Default
            };
            println!("{}", config_command(action, file.as_deref())?);
        }
    }

    Ok(())
}

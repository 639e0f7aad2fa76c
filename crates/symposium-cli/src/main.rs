//! `symposium` - inspect and reset a persisted workflow

use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use symposium_core::WorkflowConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

const DEFAULT_DIR: &str = ".symposium";

fn build_cli() -> Command {
    Command::new("symposium")
        .version(symposium_core::VERSION)
        .about("Symposium workflow snapshot tool")
        .subcommand_required(true)
        .arg(
            Arg::new("dir")
                .long("dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Snapshot directory (defaults to snapshot_dir from config, then ./.symposium)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Output as JSON"),
        )
        .subcommand(Command::new("status").about("Show per-step completion and navigation state"))
        .subcommand(
            Command::new("reset")
                .about("Clear a step and every step after it")
                .arg(
                    Arg::new("from")
                        .long("from")
                        .default_value("1")
                        .value_parser(value_parser!(u8).range(1..=5))
                        .help("First step to clear (1-5)"),
                ),
        )
        .subcommand(
            Command::new("prompts")
                .about("List prompt templates")
                .arg(
                    Arg::new("slot")
                        .long("slot")
                        .help("Limit to one slot and print its template"),
                )
                .arg(
                    Arg::new("reset")
                        .long("reset")
                        .action(ArgAction::SetTrue)
                        .help("Restore default templates"),
                ),
        )
        .subcommand(Command::new("article").about("Print the generated article"))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "symposium=info,symposium_core=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn context(matches: &ArgMatches) -> Result<commands::Context> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => WorkflowConfig::load(path)?,
        None => WorkflowConfig::new(),
    };
    let dir = matches
        .get_one::<PathBuf>("dir")
        .cloned()
        .or_else(|| config.snapshot_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DIR));

    Ok(commands::Context {
        config,
        dir,
        json: matches.get_flag("json"),
    })
}

async fn run(matches: ArgMatches) -> Result<()> {
    let ctx = context(&matches)?;
    tracing::debug!(dir = %ctx.dir.display(), key = %ctx.config.app_key, "resolved options");
    let mut out = std::io::stdout().lock();

    match matches.subcommand() {
        Some(("status", _)) => commands::status(&ctx, &mut out).await,
        Some(("reset", args)) => {
            let from = args.get_one::<u8>("from").copied().unwrap_or(1);
            commands::reset(&ctx, from, &mut out).await
        }
        Some(("prompts", args)) => {
            let slot = args.get_one::<String>("slot").map(String::as_str);
            commands::prompts(&ctx, args.get_flag("reset"), slot, &mut out).await
        }
        Some(("article", _)) => commands::article(&ctx, &mut out).await,
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    run(build_cli().get_matches()).await
}

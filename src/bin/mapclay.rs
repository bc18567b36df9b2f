use std::{
    fs,
    io::{self, Read as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use mapclay::options::catalog::VALID_OPTIONS;
use mapclay::{parse_configs, Config, Mapclay};

#[derive(Parser, Debug)]
#[command(name = "mapclay", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print configurations with aliases and presets applied, as JSON.
    Resolve(FileArgs),
    /// Print the fingerprint of each configuration.
    Fingerprint(FileArgs),
    /// List the options renderers understand.
    Options,
}

#[derive(Parser, Debug)]
struct FileArgs {
    /// YAML configuration file, `-` for stdin.
    path: PathBuf,

    /// Skip the default converter (default renderer, width and aliases).
    #[arg(long)]
    raw: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    #[cfg(feature = "debug")]
    env_logger::init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Resolve(args) => cmd_resolve(args).await,
        Command::Fingerprint(args) => cmd_fingerprint(args),
        Command::Options => cmd_options(),
    }
}

fn scheduler(raw: bool) -> Mapclay {
    let builder = Mapclay::builder();
    if raw {
        builder.without_converter().build()
    } else {
        builder.build()
    }
}

fn read_configs(path: &Path) -> anyhow::Result<Vec<Config>> {
    let text = if path.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("read configuration from stdin")?;
        text
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("open configuration '{}'", path.display()))?
    };
    Ok(parse_configs(&text).context("parse configuration YAML")?)
}

async fn cmd_resolve(args: FileArgs) -> anyhow::Result<()> {
    let configs = read_configs(&args.path)?;
    let resolved: Vec<Value> = scheduler(args.raw)
        .resolve(&configs)
        .await
        .into_iter()
        .map(|outcome| match outcome {
            Ok(config) => Value::Object(config.options),
            Err(err) => json!({ "error": err.to_string() }),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}

fn cmd_fingerprint(args: FileArgs) -> anyhow::Result<()> {
    let mapclay = scheduler(args.raw);
    for config in read_configs(&args.path)? {
        println!("{}", mapclay.convert(config).fingerprint());
    }
    Ok(())
}

fn cmd_options() -> anyhow::Result<()> {
    for option in VALID_OPTIONS.iter() {
        println!("{:<8} {}", option.name, option.desc);
        if let Some(example) = option.example {
            match option.example_desc {
                Some(desc) => println!("{:<8}   e.g. {example}  ({desc})", ""),
                None => println!("{:<8}   e.g. {example}", ""),
            }
        }
    }
    Ok(())
}

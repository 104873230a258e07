use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{
  ArgAction,
  Parser,
  Subcommand
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct KeyVal {
  pub key:   String,
  pub value: String
}

impl std::str::FromStr for KeyVal {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let (k, v) =
      s.split_once('=').ok_or_else(|| {
        anyhow!(
          "expected KEY=VALUE, got: {s}"
        )
      })?;
    Ok(Self {
      key:   k.trim().to_string(),
      value: v.trim().to_string()
    })
  }
}

#[derive(Parser, Debug, Clone)]
#[command(
  name = "tiller",
  version,
  about = "Tiller: start, scale and stop apps on a scheduler backend"
)]
pub struct GlobalCli {
  #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
  pub verbose: u8,

  #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
  pub quiet: u8,

  /// Config file (default:
  /// <config dir>/tiller/config.toml).
  #[arg(long = "config", global = true)]
  pub config: Option<PathBuf>,

  /// Backend base URL; overrides config
  /// and environment.
  #[arg(long = "url", global = true)]
  pub url: Option<String>,

  /// Extra config override, e.g.
  /// `--set timeout_secs=5`.
  #[arg(
    long = "set",
    value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
    action = ArgAction::Append,
    global = true
  )]
  pub overrides: Vec<KeyVal>,

  #[command(subcommand)]
  pub command: Command
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
  /// List apps.
  List,
  /// Start a new app.
  Create {
    id:        String,
    #[arg(long)]
    cmd:       Option<String>,
    #[arg(long, default_value_t = 10.0)]
    mem:       f64,
    #[arg(long, default_value_t = 0.1)]
    cpus:      f64,
    #[arg(long, default_value_t = 1)]
    instances: u32,
    #[arg(long = "uri", action = ArgAction::Append)]
    uris:      Vec<String>
  },
  /// Set the desired instance count of an
  /// app.
  Scale { id: String, instances: u32 },
  /// Stop an app.
  Destroy { id: String },
  /// List the running tasks of an app.
  Tasks { id: String }
}

pub fn init_tracing(
  verbose: u8,
  quiet: u8
) -> anyhow::Result<()> {
  let default_level = if quiet >= 2 {
    "error"
  } else if quiet == 1 {
    "warn"
  } else if verbose >= 3 {
    "trace"
  } else if verbose == 2 {
    "debug"
  } else if verbose == 1 {
    "info"
  } else {
    "warn"
  };

  let env_filter =
    EnvFilter::try_from_default_env()
      .or_else(|_| {
        EnvFilter::try_new(default_level)
      })
      .map_err(|e| {
        anyhow!(
          "invalid RUST_LOG / log \
           filter: {e}"
        )
      })?;

  let init_result =
    tracing_subscriber::fmt()
      .with_env_filter(env_filter)
      .with_writer(std::io::stderr)
      .with_target(true)
      .with_level(true)
      .with_ansi(
        std::io::stderr().is_terminal()
      )
      .try_init();

  if let Err(err) = init_result {
    debug!(error = %err, "tracing subscriber already set, continuing");
  }

  Ok(())
}

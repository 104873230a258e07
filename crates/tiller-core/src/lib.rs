pub mod cli;
pub mod commands;
pub mod config;
pub mod transport;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::info;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting tiller CLI"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_layers(
    std::env::vars_os(),
    cli
      .overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value)),
    cli.url
  )?;

  let transport =
    transport::HttpTransport::new(&cfg)
      .context(
        "failed to set up backend \
         transport"
      )?;

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  let mut stdout = std::io::stdout().lock();
  runtime.block_on(commands::dispatch(
    &transport,
    cli.command,
    &mut stdout
  ))?;

  info!("done");
  Ok(())
}

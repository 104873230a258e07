use std::io::Write;

use anyhow::{
  Context,
  anyhow
};
use tiller_shared::{
  App,
  AppCollection,
  Task,
  TaskCollection,
  Transport
};
use tracing::info;

use crate::cli::Command;

/// Runs one CLI command against
/// `transport`, writing one line per item
/// to `out`.
#[tracing::instrument(skip(
  transport, out
))]
pub async fn dispatch<T, W>(
  transport: &T,
  command: Command,
  out: &mut W
) -> anyhow::Result<()>
where
  T: Transport,
  W: Write
{
  match command {
    | Command::List => {
      let mut apps =
        AppCollection::default();
      apps.fetch(transport).await?;
      for app in apps.apps() {
        writeln!(out, "{}", app_line(app))?;
      }
    }
    | Command::Create {
      id,
      cmd,
      mem,
      cpus,
      instances,
      uris
    } => {
      let mut app = App::with_id(id);
      app.cmd = cmd;
      app.mem = mem;
      app.cpus = cpus;
      app.instances = instances;
      app.uris = uris;

      let mut apps =
        AppCollection::default();
      let app =
        apps.create(transport, app).await?;
      writeln!(out, "started {}", app.id())?;
    }
    | Command::Scale { id, instances } => {
      let mut app =
        find_app(transport, &id).await?;
      app
        .scale(transport, instances)
        .await?;
      writeln!(
        out,
        "scaled {} to {instances}",
        app.id()
      )?;
    }
    | Command::Destroy { id } => {
      let app =
        find_app(transport, &id).await?;
      app.destroy(transport).await?;
      writeln!(out, "stopped {}", app.id())?;
    }
    | Command::Tasks { id } => {
      let mut tasks =
        TaskCollection::new(id);
      tasks.fetch(transport).await?;
      for task in tasks.tasks() {
        writeln!(out, "{}", task_line(task))?;
      }
    }
  }

  out.flush().context("failed to flush output")
}

/// Reads the current app from the backend
/// so updates carry its full state.
async fn find_app<T: Transport>(
  transport: &T,
  id: &str
) -> anyhow::Result<App> {
  let mut apps = AppCollection::default();
  apps.fetch(transport).await?;
  let app = apps
    .remove(id)
    .ok_or_else(|| anyhow!("no app with id {id}"))?;
  info!(app_id = %app.id(), "found app");
  Ok(app)
}

pub fn app_line(app: &App) -> String {
  format!(
    "{}\tinstances={}\tcpus={}\tmem={}\tcmd={}",
    app.id(),
    app.instances,
    app.cpus,
    app.mem,
    app.cmd.as_deref().unwrap_or("-")
  )
}

pub fn task_line(task: &Task) -> String {
  let ports = task
    .ports
    .iter()
    .map(u16::to_string)
    .collect::<Vec<_>>()
    .join(",");
  format!(
    "{}\t{}\t{}",
    task.id,
    task.host.as_deref().unwrap_or("-"),
    if ports.is_empty() { "-" } else { ports.as_str() }
  )
}

use std::ffi::OsString;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use reqwest::Url;
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

pub const DEFAULT_URL: &str =
  "http://localhost:8080/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_PREFIX: &str = "TILLER_";
const KEYS: [&str; 2] =
  ["url", "timeout_secs"];

#[derive(
  Debug, Clone, PartialEq, Deserialize,
)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  pub url:          String,
  pub timeout_secs: u64,
  #[serde(skip)]
  pub loaded_file:  Option<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      url:          DEFAULT_URL.to_string(),
      timeout_secs: DEFAULT_TIMEOUT_SECS,
      loaded_file:  None
    }
  }
}

impl Config {
  /// Loads the config file. An explicit
  /// `config_override` must exist; the
  /// default location is optional.
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    if let Some(path) = config_override
    {
      let path = expand_tilde(path);
      info!(config = %path.display(), "loading config");
      return Self::load_file(&path);
    }

    match default_config_path() {
      | Some(path) if path.exists() => {
        info!(config = %path.display(), "loading config");
        Self::load_file(&path)
      }
      | _ => {
        warn!(
          "no config file found; \
           using defaults"
        );
        Ok(Self::default())
      }
    }
  }

  #[tracing::instrument]
  fn load_file(
    path: &Path
  ) -> anyhow::Result<Self> {
    let text = fs::read_to_string(path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    let mut cfg: Config =
      toml::from_str(&text)
        .with_context(|| {
          format!(
            "invalid config file {}",
            path.display()
          )
        })?;
    cfg.loaded_file =
      Some(path.to_path_buf());
    Ok(cfg)
  }

  /// Applies `key=value` overrides on top
  /// of the loaded file. Later entries
  /// win.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      debug!(key = %key, value = %value, "applying override");
      match key.as_str() {
        | "url" => self.url = value,
        | "timeout_secs" => {
          self.timeout_secs = value
            .trim()
            .parse()
            .with_context(|| {
              format!(
                "timeout_secs must be a \
                 whole number of seconds, \
                 got {value:?}"
              )
            })?;
        }
        | other => {
          return Err(anyhow!(
            "unknown config key: {other}"
          ));
        }
      }
    }
    Ok(())
  }

  /// Layers every override source over
  /// the loaded file, lowest first:
  /// `TILLER_*` variables, then `--set`
  /// pairs, then `--url`.
  #[tracing::instrument(skip_all)]
  pub fn apply_layers<E, S>(
    &mut self,
    env: E,
    sets: S,
    url: Option<String>
  ) -> anyhow::Result<()>
  where
    E: IntoIterator<
      Item = (OsString, OsString)
    >,
    S: IntoIterator<
      Item = (String, String)
    >
  {
    let env_overrides =
      overrides_from_env(env);
    debug!(?env_overrides, "environment overrides");
    self.apply_overrides(
      env_overrides
        .into_iter()
        .chain(sets)
        .chain(
          url.map(|url| {
            ("url".to_string(), url)
          })
        )
    )
  }

  /// Base URL with a trailing slash, so
  /// relative endpoints join under it.
  pub fn base_url(
    &self
  ) -> anyhow::Result<Url> {
    let trimmed = self.url.trim();
    let normalized =
      if trimmed.ends_with('/') {
        trimmed.to_string()
      } else {
        format!("{trimmed}/")
      };
    Url::parse(&normalized)
      .with_context(|| {
        format!(
          "invalid backend URL: {}",
          self.url
        )
      })
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(
      self.timeout_secs
    )
  }
}

pub fn default_config_path()
-> Option<PathBuf> {
  dirs::config_dir().map(|dir| {
    dir
      .join("tiller")
      .join("config.toml")
  })
}

/// Maps `TILLER_*` variables to config
/// overrides (`TILLER_URL` -> `url`).
/// Variables that name no config key are
/// ignored, as are names or values that
/// are not valid UTF-8.
pub fn overrides_from_env<I>(
  vars: I
) -> Vec<(String, String)>
where
  I: IntoIterator<
    Item = (OsString, OsString)
  >
{
  let mut overrides: Vec<_> = vars
    .into_iter()
    .filter_map(|(name, value)| {
      let name = name.into_string().ok()?;
      let key = name
        .strip_prefix(ENV_PREFIX)?
        .to_ascii_lowercase();
      if !KEYS.contains(&key.as_str()) {
        return None;
      }
      match value.into_string() {
        | Ok(value) => Some((key, value)),
        | Err(_) => {
          warn!(
            variable = %name,
            "ignoring non-UTF-8 value"
          );
          None
        }
      }
    })
    .collect();
  overrides.sort();
  overrides
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

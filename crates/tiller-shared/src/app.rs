use std::sync::atomic::{
  AtomicU64,
  Ordering
};

use anyhow::Context;
use serde::{
  Deserialize,
  Serialize
};
use serde_json::Value;
use tracing::{
  debug,
  info
};

use crate::sync::{
  HttpVerb,
  JSON_CONTENT_TYPE,
  SyncMethod,
  SyncOptions,
  SyncRequest,
  Transport
};
use crate::task::TaskCollection;

pub const APPS_URL: &str = "v1/apps";

static NEXT_APP_ID: AtomicU64 =
  AtomicU64::new(1);

/// Next process-unique app id
/// (`app_1`, `app_2`, ...).
pub fn next_app_id() -> String {
  let n = NEXT_APP_ID
    .fetch_add(1, Ordering::Relaxed);
  format!("app_{n}")
}

/// Fixed endpoint for methods the app
/// model remaps; `None` falls through to
/// default sync.
pub fn remapped_endpoint(
  method: SyncMethod
) -> Option<&'static str> {
  match method {
    | SyncMethod::Create => {
      Some("v1/apps/start")
    }
    | SyncMethod::Delete => {
      Some("v1/apps/stop")
    }
    | SyncMethod::Update => {
      Some("v1/apps/scale")
    }
    | SyncMethod::Read => None
  }
}

/// A deployable application template.
///
/// The owned [`TaskCollection`] is always
/// scoped to this app's `id`; `id` can
/// only change through [`App::set_id`].
#[derive(
  Debug, Clone, PartialEq, Serialize,
  Deserialize,
)]
#[serde(from = "AppRecord")]
pub struct App {
  id:            String,
  pub cmd:       Option<String>,
  pub mem:       f64,
  pub cpus:      f64,
  pub instances: u32,
  pub uris:      Vec<String>,
  #[serde(skip)]
  tasks:         TaskCollection
}

#[derive(Deserialize)]
struct AppRecord {
  #[serde(default = "next_app_id")]
  id:        String,
  #[serde(default)]
  cmd:       Option<String>,
  #[serde(default = "default_mem")]
  mem:       f64,
  #[serde(default = "default_cpus")]
  cpus:      f64,
  #[serde(default = "default_instances")]
  instances: u32,
  #[serde(default)]
  uris:      Vec<String>
}

fn default_mem() -> f64 {
  10.0
}

fn default_cpus() -> f64 {
  0.1
}

fn default_instances() -> u32 {
  1
}

impl From<AppRecord> for App {
  fn from(record: AppRecord) -> Self {
    let tasks =
      TaskCollection::new(&record.id);
    Self {
      id: record.id,
      cmd: record.cmd,
      mem: record.mem,
      cpus: record.cpus,
      instances: record.instances,
      uris: record.uris,
      tasks
    }
  }
}

impl Default for App {
  fn default() -> Self {
    Self::with_id(next_app_id())
  }
}

impl App {
  pub fn with_id(
    id: impl Into<String>
  ) -> Self {
    let id = id.into();
    Self {
      tasks: TaskCollection::new(&id),
      id,
      cmd: None,
      mem: default_mem(),
      cpus: default_cpus(),
      instances: default_instances(),
      uris: vec![]
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  /// Changes the id and re-scopes the
  /// owned task collection to match.
  pub fn set_id(
    &mut self,
    id: impl Into<String>
  ) {
    let id = id.into();
    if id == self.id {
      return;
    }
    debug!(
      from = %self.id,
      to = %id,
      "app id changed"
    );
    self.tasks.rebind(&id);
    self.id = id;
  }

  pub fn tasks(&self) -> &TaskCollection {
    &self.tasks
  }

  pub fn tasks_mut(
    &mut self
  ) -> &mut TaskCollection {
    &mut self.tasks
  }

  /// URL used by methods that fall
  /// through to default sync.
  pub fn url(&self) -> String {
    format!("{APPS_URL}/{}", self.id)
  }

  /// Resolves `method` into a concrete
  /// request.
  ///
  /// `options.add` forces `Create`.
  /// Create/Update/Delete become a JSON
  /// `POST` of the whole app to a fixed
  /// endpoint; anything else is left to
  /// default sync.
  pub fn sync_request(
    &self,
    method: SyncMethod,
    options: &SyncOptions
  ) -> anyhow::Result<SyncRequest> {
    let method = if options.add {
      SyncMethod::Create
    } else {
      method
    };

    let Some(endpoint) =
      remapped_endpoint(method)
    else {
      let url = options
        .url
        .clone()
        .unwrap_or_else(|| self.url());
      return Ok(SyncRequest::passthrough(
        method, url
      ));
    };

    let body = serde_json::to_string(self)
      .with_context(|| {
        format!(
          "failed to serialize app {}",
          self.id
        )
      })?;

    Ok(SyncRequest {
      method,
      verb: HttpVerb::Post,
      url: endpoint.to_string(),
      content_type: Some(JSON_CONTENT_TYPE),
      body: Some(body)
    })
  }

  #[tracing::instrument(
    skip(self, transport, options),
    fields(app_id = %self.id)
  )]
  pub async fn sync<T: Transport>(
    &self,
    transport: &T,
    method: SyncMethod,
    options: &SyncOptions
  ) -> anyhow::Result<Value> {
    let request =
      self.sync_request(method, options)?;
    debug!(
      method = %request.method,
      request = %request,
      "syncing app"
    );
    transport.send(&request).await
  }

  /// Persists the app. An app always has
  /// an id, so this is an update unless
  /// `options.add` is set.
  pub async fn save<T: Transport>(
    &self,
    transport: &T,
    options: &SyncOptions
  ) -> anyhow::Result<Value> {
    self
      .sync(
        transport,
        SyncMethod::Update,
        options
      )
      .await
  }

  /// Sets the desired instance count and
  /// persists it.
  #[tracing::instrument(
    skip(self, transport),
    fields(app_id = %self.id)
  )]
  pub async fn scale<T: Transport>(
    &mut self,
    transport: &T,
    instances: u32
  ) -> anyhow::Result<Value> {
    self.instances = instances;
    info!(instances, "scaling app");
    self
      .save(
        transport,
        &SyncOptions::default()
      )
      .await
  }

  /// Stops the app on the backend.
  #[tracing::instrument(
    skip(self, transport),
    fields(app_id = %self.id)
  )]
  pub async fn destroy<T: Transport>(
    &self,
    transport: &T
  ) -> anyhow::Result<Value> {
    info!("stopping app");
    self
      .sync(
        transport,
        SyncMethod::Delete,
        &SyncOptions::default()
      )
      .await
  }
}

/// The apps known to the backend.
#[derive(
  Debug, Clone, PartialEq, Default,
)]
pub struct AppCollection {
  apps: Vec<App>
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AppsPayload {
  List(Vec<App>),
  Wrapped { apps: Vec<App> }
}

impl AppCollection {
  pub fn new(apps: Vec<App>) -> Self {
    Self { apps }
  }

  pub fn url(&self) -> &'static str {
    APPS_URL
  }

  /// Accepts either a bare array of apps
  /// or `{ "apps": [...] }`.
  pub fn parse(
    &self,
    payload: Value
  ) -> anyhow::Result<Vec<App>> {
    if payload.is_null() {
      return Ok(vec![]);
    }
    let payload: AppsPayload =
      serde_json::from_value(payload)
        .context(
          "failed to decode app list"
        )?;
    Ok(match payload {
      | AppsPayload::List(apps) => apps,
      | AppsPayload::Wrapped { apps } => {
        apps
      }
    })
  }

  pub fn apps(&self) -> &[App] {
    &self.apps
  }

  pub fn len(&self) -> usize {
    self.apps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.apps.is_empty()
  }

  pub fn get(
    &self,
    id: &str
  ) -> Option<&App> {
    self
      .apps
      .iter()
      .find(|app| app.id() == id)
  }

  pub fn get_mut(
    &mut self,
    id: &str
  ) -> Option<&mut App> {
    self
      .apps
      .iter_mut()
      .find(|app| app.id() == id)
  }

  pub fn remove(
    &mut self,
    id: &str
  ) -> Option<App> {
    let index = self
      .apps
      .iter()
      .position(|app| app.id() == id)?;
    Some(self.apps.remove(index))
  }

  #[tracing::instrument(skip_all)]
  pub async fn fetch<T: Transport>(
    &mut self,
    transport: &T
  ) -> anyhow::Result<usize> {
    let response = transport
      .send(&SyncRequest::get(
        self.url()
      ))
      .await?;
    self.apps = self.parse(response)?;
    debug!(
      count = self.apps.len(),
      "loaded apps"
    );
    Ok(self.apps.len())
  }

  /// Creates `app` on the backend and
  /// adds it to the collection. An entry
  /// with the same id is replaced in
  /// place, so ids stay unique.
  #[tracing::instrument(
    skip(self, transport, app),
    fields(app_id = %app.id())
  )]
  pub async fn create<T: Transport>(
    &mut self,
    transport: &T,
    app: App
  ) -> anyhow::Result<&App> {
    app
      .save(transport, &SyncOptions::add())
      .await?;
    info!("created app");
    let index = match self
      .apps
      .iter()
      .position(|existing| {
        existing.id() == app.id()
      }) {
      | Some(index) => {
        debug!("replacing existing entry");
        self.apps[index] = app;
        index
      }
      | None => {
        self.apps.push(app);
        self.apps.len() - 1
      }
    };
    Ok(&self.apps[index])
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::sync::recording::RecordingTransport;
  use crate::task::Task;

  fn body_json(
    request: &SyncRequest
  ) -> Value {
    serde_json::from_str(
      request
        .body
        .as_deref()
        .expect("request body")
    )
    .expect("body is json")
  }

  #[test]
  fn defaults_match_template() {
    let app = App::default();
    assert!(app.id().starts_with("app_"));
    assert_eq!(app.cmd, None);
    assert_eq!(app.mem, 10.0);
    assert_eq!(app.cpus, 0.1);
    assert_eq!(app.instances, 1);
    assert!(app.uris.is_empty());
    assert_eq!(app.tasks().app_id(), app.id());
  }

  #[test]
  fn generated_ids_are_unique() {
    let a = App::default();
    let b = App::default();
    assert_ne!(a.id(), b.id());
  }

  #[test]
  fn set_id_rebinds_tasks() {
    let mut app = App::with_id("web");
    app.tasks_mut().reset(vec![Task {
      id: "web.1".to_string(),
      ..Task::default()
    }]);

    app.set_id("api");

    assert_eq!(app.id(), "api");
    assert_eq!(app.tasks().app_id(), "api");
    assert_eq!(
      app.tasks().url(),
      "v1/apps/api/tasks"
    );
    assert_eq!(app.tasks().len(), 1);
  }

  #[test]
  fn deserialize_fills_defaults() {
    let app: App =
      serde_json::from_value(json!({}))
        .expect("decode app");
    assert!(app.id().starts_with("app_"));
    assert_eq!(app.mem, 10.0);
    assert_eq!(app.instances, 1);
    assert_eq!(app.tasks().app_id(), app.id());
  }

  #[test]
  fn serialize_omits_tasks() {
    let mut app = App::with_id("web");
    app.cmd = Some("python -m http.server".to_string());
    app.uris = vec!["http://x/a.tgz".to_string()];

    let value =
      serde_json::to_value(&app).expect("encode app");
    assert_eq!(
      value,
      json!({
        "id": "web",
        "cmd": "python -m http.server",
        "mem": 10.0,
        "cpus": 0.1,
        "instances": 1,
        "uris": ["http://x/a.tgz"]
      })
    );
  }

  #[test]
  fn update_routes_to_scale() {
    let app = App::with_id("web");
    let request = app
      .sync_request(
        SyncMethod::Update,
        &SyncOptions::default()
      )
      .expect("resolve request");

    assert_eq!(request.method, SyncMethod::Update);
    assert_eq!(request.verb, HttpVerb::Post);
    assert_eq!(request.url, "v1/apps/scale");
    assert_eq!(
      request.content_type,
      Some(JSON_CONTENT_TYPE)
    );
    assert_eq!(
      body_json(&request),
      serde_json::to_value(&app).expect("encode app")
    );
  }

  #[test]
  fn add_forces_create() {
    let app = App::with_id("web");
    for method in [
      SyncMethod::Read,
      SyncMethod::Update,
      SyncMethod::Delete
    ] {
      let request = app
        .sync_request(method, &SyncOptions::add())
        .expect("resolve request");
      assert_eq!(request.method, SyncMethod::Create);
      assert_eq!(request.url, "v1/apps/start");
      assert_eq!(request.verb, HttpVerb::Post);
    }
  }

  #[test]
  fn delete_routes_to_stop() {
    let request = App::with_id("web")
      .sync_request(
        SyncMethod::Delete,
        &SyncOptions::default()
      )
      .expect("resolve request");
    assert_eq!(request.url, "v1/apps/stop");
    assert_eq!(request.verb, HttpVerb::Post);
  }

  #[test]
  fn read_is_not_rewritten() {
    let app = App::with_id("web");
    let request = app
      .sync_request(
        SyncMethod::Read,
        &SyncOptions::default()
      )
      .expect("resolve request");
    assert_eq!(
      request,
      SyncRequest::passthrough(
        SyncMethod::Read,
        "v1/apps/web"
      )
    );

    let request = app
      .sync_request(
        SyncMethod::Read,
        &SyncOptions {
          url: Some("custom/url".to_string()),
          ..SyncOptions::default()
        }
      )
      .expect("resolve request");
    assert_eq!(request.verb, HttpVerb::Get);
    assert_eq!(request.url, "custom/url");
    assert!(request.body.is_none());
  }

  #[tokio::test]
  async fn scale_sets_instances_and_saves_once() {
    let transport = RecordingTransport::default();
    let mut app = App::with_id("web");

    app
      .scale(&transport, 5)
      .await
      .expect("scale app");

    assert_eq!(app.instances, 5);
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].url, "v1/apps/scale");
    assert_eq!(body_json(&sent[0])["instances"], json!(5));
  }

  #[tokio::test]
  async fn destroy_posts_to_stop() {
    let transport = RecordingTransport::default();
    App::with_id("web")
      .destroy(&transport)
      .await
      .expect("destroy app");

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].url, "v1/apps/stop");
    assert_eq!(body_json(&sent[0])["id"], json!("web"));
  }

  #[tokio::test]
  async fn collection_fetch_and_lookup() {
    let transport = RecordingTransport::default()
      .respond_with(json!([
        { "id": "web", "instances": 3 },
        { "id": "db", "cmd": "postgres" }
      ]));
    let mut apps = AppCollection::default();

    let count = apps
      .fetch(&transport)
      .await
      .expect("fetch apps");

    assert_eq!(count, 2);
    assert_eq!(transport.sent()[0].url, "v1/apps");
    assert_eq!(
      apps.get("web").map(|app| app.instances),
      Some(3)
    );
    assert_eq!(
      apps.get("db").and_then(|app| app.cmd.clone()),
      Some("postgres".to_string())
    );
    assert!(apps.remove("web").is_some());
    assert!(apps.get("web").is_none());
    assert_eq!(apps.len(), 1);
  }

  #[test]
  fn collection_parses_wrapped_payload() {
    let apps = AppCollection::default()
      .parse(json!({ "apps": [{ "id": "web" }] }))
      .expect("parse apps");
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].id(), "web");
  }

  #[tokio::test]
  async fn collection_create_goes_through_start() {
    let transport = RecordingTransport::default();
    let mut apps = AppCollection::default();

    let created = apps
      .create(&transport, App::with_id("web"))
      .await
      .expect("create app");
    assert_eq!(created.id(), "web");

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, SyncMethod::Create);
    assert_eq!(sent[0].url, "v1/apps/start");
    assert_eq!(apps.len(), 1);
  }

  #[tokio::test]
  async fn collection_create_failure_keeps_list() {
    let transport = RecordingTransport::default()
      .fail_with("HTTP 409 Conflict");
    let mut apps = AppCollection::default();

    let result = apps
      .create(&transport, App::with_id("web"))
      .await;

    assert!(result.is_err());
    assert!(apps.is_empty());
  }

  #[tokio::test]
  async fn collection_create_replaces_same_id() {
    let transport = RecordingTransport::default();
    let mut apps = AppCollection::default();
    apps
      .create(&transport, App::with_id("web"))
      .await
      .expect("create web");
    apps
      .create(&transport, App::with_id("db"))
      .await
      .expect("create db");

    let mut again = App::with_id("web");
    again.instances = 4;
    let created = apps
      .create(&transport, again)
      .await
      .expect("create web again");
    assert_eq!(created.instances, 4);

    assert_eq!(apps.len(), 2);
    assert_eq!(apps.apps()[0].id(), "web");
    assert_eq!(apps.apps()[1].id(), "db");
    assert_eq!(
      apps.get("web").map(|app| app.instances),
      Some(4)
    );
    assert_eq!(transport.sent().len(), 3);
  }
}

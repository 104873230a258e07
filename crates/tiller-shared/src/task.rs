use anyhow::{
  Context,
  bail
};
use serde::{
  Deserialize,
  Serialize
};
use serde_json::{
  Map,
  Value
};
use tracing::{
  debug,
  warn
};

use crate::sync::{
  SyncRequest,
  Transport
};

/// A running instance of an app.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Default,
)]
pub struct Task {
  #[serde(default)]
  pub id:    String,
  #[serde(default)]
  pub host:  Option<String>,
  #[serde(default)]
  pub ports: Vec<u16>,
  #[serde(flatten)]
  pub extra: Map<String, Value>
}

/// Server payload for a task listing:
/// app id to that app's task records.
/// Slices are left undecoded until one is
/// picked out.
pub type TaskPayload =
  Map<String, Value>;

/// Tasks of a single app.
///
/// `app_id` is a scoping key, not an
/// ownership link: it only selects the
/// endpoint and the payload slice.
#[derive(
  Debug, Clone, PartialEq, Default,
)]
pub struct TaskCollection {
  app_id: String,
  tasks:  Vec<Task>
}

impl TaskCollection {
  pub fn new(
    app_id: impl Into<String>
  ) -> Self {
    Self {
      app_id: app_id.into(),
      tasks:  vec![]
    }
  }

  pub fn app_id(&self) -> &str {
    &self.app_id
  }

  /// Re-scopes the collection to another
  /// app. Loaded tasks are kept until the
  /// next fetch.
  pub fn rebind(
    &mut self,
    app_id: impl Into<String>
  ) {
    let app_id = app_id.into();
    debug!(
      from = %self.app_id,
      to = %app_id,
      "rebinding task collection"
    );
    self.app_id = app_id;
  }

  pub fn url(&self) -> String {
    format!(
      "v1/apps/{}/tasks",
      self.app_id
    )
  }

  /// Extracts and decodes this
  /// collection's slice of `payload`;
  /// `None` when the key is absent or
  /// null. Other apps' slices are never
  /// decoded.
  pub fn parse(
    &self,
    mut payload: TaskPayload
  ) -> anyhow::Result<Option<Vec<Task>>> {
    match payload.remove(&self.app_id) {
      | None | Some(Value::Null) => Ok(None),
      | Some(slice) => {
        serde_json::from_value(slice)
          .map(Some)
          .with_context(|| {
            format!(
              "failed to decode tasks \
               for app {}",
              self.app_id
            )
          })
      }
    }
  }

  pub fn tasks(&self) -> &[Task] {
    &self.tasks
  }

  pub fn len(&self) -> usize {
    self.tasks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tasks.is_empty()
  }

  pub fn reset(
    &mut self,
    tasks: Vec<Task>
  ) {
    self.tasks = tasks;
  }

  /// Loads the tasks from the backend and
  /// returns how many were loaded.
  #[tracing::instrument(
    skip(self, transport),
    fields(app_id = %self.app_id)
  )]
  pub async fn fetch<T: Transport>(
    &mut self,
    transport: &T
  ) -> anyhow::Result<usize> {
    let request =
      SyncRequest::get(self.url());
    let response = transport
      .send(&request)
      .await?;

    let payload = match response {
      | Value::Null => TaskPayload::new(),
      | Value::Object(payload) => payload,
      | other => bail!(
        "expected an object keyed by app \
         id from {request}, got {other}"
      )
    };

    let tasks = match self
      .parse(payload)
      .with_context(|| {
        format!("bad task payload from {request}")
      })? {
      | Some(tasks) => tasks,
      | None => {
        warn!(
          "task payload has no entry \
           for app; treating as empty"
        );
        vec![]
      }
    };

    debug!(
      count = tasks.len(),
      "loaded tasks"
    );
    self.reset(tasks);
    Ok(self.len())
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::sync::HttpVerb;
  use crate::sync::recording::RecordingTransport;

  fn task(id: &str) -> Task {
    Task {
      id: id.to_string(),
      ..Task::default()
    }
  }

  #[test]
  fn url_embeds_app_id() {
    let tasks = TaskCollection::new("app_7");
    assert_eq!(
      tasks.url(),
      "v1/apps/app_7/tasks"
    );
  }

  fn payload(value: Value) -> TaskPayload {
    match value {
      | Value::Object(map) => map,
      | other => panic!("not an object: {other}")
    }
  }

  #[test]
  fn parse_extracts_own_slice() {
    let tasks = TaskCollection::new("app_7");
    let payload = payload(json!({
      "app_7": [{ "id": "t1" }, { "id": "t2" }],
      "app_8": [{ "id": "t3" }]
    }));

    assert_eq!(
      tasks.parse(payload).expect("parse"),
      Some(vec![task("t1"), task("t2")])
    );
  }

  #[test]
  fn parse_missing_or_null_key_is_none() {
    let tasks = TaskCollection::new("app_9");
    let missing = payload(json!({
      "app_8": [{ "id": "t3" }]
    }));
    assert_eq!(
      tasks.parse(missing).expect("parse"),
      None
    );

    let null = payload(json!({
      "app_9": null
    }));
    assert_eq!(
      tasks.parse(null).expect("parse"),
      None
    );
  }

  #[test]
  fn parse_only_decodes_own_slice() {
    let tasks = TaskCollection::new("web");
    let payload = payload(json!({
      "web": [{ "id": "web.1" }],
      "db": null,
      "cache": "not a list",
      "queue": [{ "id": 7 }]
    }));

    assert_eq!(
      tasks.parse(payload).expect("parse"),
      Some(vec![task("web.1")])
    );
  }

  #[test]
  fn parse_rejects_malformed_own_slice() {
    let tasks = TaskCollection::new("web");
    let payload = payload(json!({
      "web": "not a list"
    }));

    let err = tasks
      .parse(payload)
      .expect_err("bad slice should fail");
    assert!(
      err
        .to_string()
        .contains("for app web")
    );
  }

  #[test]
  fn rebind_changes_url() {
    let mut tasks =
      TaskCollection::new("old");
    tasks.rebind("new");
    assert_eq!(tasks.app_id(), "new");
    assert_eq!(
      tasks.url(),
      "v1/apps/new/tasks"
    );
  }

  #[test]
  fn task_keeps_unknown_fields() {
    let task: Task =
      serde_json::from_value(json!({
        "id": "web.1",
        "host": "agent-1",
        "ports": [31000],
        "stagedAt": "2014-01-01"
      }))
      .expect("decode task");
    assert_eq!(task.id, "web.1");
    assert_eq!(task.ports, vec![31000]);
    assert_eq!(
      task.extra.get("stagedAt"),
      Some(&json!("2014-01-01"))
    );
  }

  #[tokio::test]
  async fn fetch_loads_own_tasks() {
    let transport =
      RecordingTransport::default()
        .respond_with(json!({
          "web": [{ "id": "web.1" }, { "id": "web.2" }],
          "db": [{ "id": "db.1" }]
        }));
    let mut tasks =
      TaskCollection::new("web");

    let count = tasks
      .fetch(&transport)
      .await
      .expect("fetch tasks");

    assert_eq!(count, 2);
    assert_eq!(tasks.tasks()[1].id, "web.2");
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].verb, HttpVerb::Get);
    assert_eq!(
      sent[0].url,
      "v1/apps/web/tasks"
    );
  }

  #[tokio::test]
  async fn fetch_missing_key_empties_collection()
  {
    let transport =
      RecordingTransport::default()
        .respond_with(json!({
          "db": [{ "id": "db.1" }]
        }));
    let mut tasks =
      TaskCollection::new("web");
    tasks.reset(vec![task("stale")]);

    let count = tasks
      .fetch(&transport)
      .await
      .expect("fetch tasks");

    assert_eq!(count, 0);
    assert!(tasks.is_empty());
  }

  #[tokio::test]
  async fn fetch_ignores_malformed_sibling_slices()
  {
    let transport =
      RecordingTransport::default()
        .respond_with(json!({
          "web": [{ "id": "web.1" }],
          "db": null
        }));
    let mut tasks =
      TaskCollection::new("web");

    let count = tasks
      .fetch(&transport)
      .await
      .expect("fetch tasks");

    assert_eq!(count, 1);
    assert_eq!(tasks.tasks()[0].id, "web.1");
  }

  #[tokio::test]
  async fn fetch_rejects_non_object_payload()
  {
    let transport =
      RecordingTransport::default()
        .respond_with(json!([
          { "id": "web.1" }
        ]));
    let mut tasks =
      TaskCollection::new("web");
    tasks.reset(vec![task("stale")]);

    let err = tasks
      .fetch(&transport)
      .await
      .expect_err("array payload should fail");
    assert!(
      err
        .to_string()
        .contains("expected an object")
    );
    assert_eq!(tasks.tasks()[0].id, "stale");
  }

  #[tokio::test]
  async fn fetch_surfaces_transport_error()
  {
    let transport =
      RecordingTransport::default()
        .fail_with("connection refused");
    let mut tasks =
      TaskCollection::new("web");

    let err = tasks
      .fetch(&transport)
      .await
      .expect_err("fetch should fail");
    assert!(
      err
        .to_string()
        .contains("connection refused")
    );
  }
}

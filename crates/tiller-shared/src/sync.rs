use std::fmt;

use serde_json::Value;

pub const JSON_CONTENT_TYPE: &str =
  "application/json";

/// Abstract persistence intent of a model
/// operation.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
pub enum SyncMethod {
  Create,
  Read,
  Update,
  Delete
}

impl SyncMethod {
  /// Verb used when a model does not
  /// remap the method.
  pub fn default_verb(self) -> HttpVerb {
    match self {
      | Self::Create => HttpVerb::Post,
      | Self::Read => HttpVerb::Get,
      | Self::Update => HttpVerb::Put,
      | Self::Delete => HttpVerb::Delete
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      | Self::Create => "create",
      | Self::Read => "read",
      | Self::Update => "update",
      | Self::Delete => "delete"
    }
  }
}

impl fmt::Display for SyncMethod {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
pub enum HttpVerb {
  Get,
  Post,
  Put,
  Delete
}

impl HttpVerb {
  pub fn as_str(self) -> &'static str {
    match self {
      | Self::Get => "GET",
      | Self::Post => "POST",
      | Self::Put => "PUT",
      | Self::Delete => "DELETE"
    }
  }
}

impl fmt::Display for HttpVerb {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Caller-supplied knobs for a single
/// sync call.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
  /// Marks the call as adding a new
  /// model to a collection. Forces the
  /// `Create` path.
  pub add: bool,
  /// Overrides the model's default URL
  /// for methods that fall through.
  pub url: Option<String>
}

impl SyncOptions {
  pub fn add() -> Self {
    Self {
      add: true,
      ..Self::default()
    }
  }
}

/// A fully resolved request, ready for a
/// [`Transport`]. URLs are relative to
/// the transport's base.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRequest {
  pub method:       SyncMethod,
  pub verb:         HttpVerb,
  pub url:          String,
  pub content_type: Option<&'static str>,
  pub body:         Option<String>
}

impl SyncRequest {
  /// Default request for `method`
  /// against `url`: verb from the
  /// default map, no body.
  pub fn passthrough(
    method: SyncMethod,
    url: impl Into<String>
  ) -> Self {
    Self {
      method,
      verb: method.default_verb(),
      url: url.into(),
      content_type: None,
      body: None
    }
  }

  pub fn get(
    url: impl Into<String>
  ) -> Self {
    Self::passthrough(
      SyncMethod::Read,
      url
    )
  }
}

impl fmt::Display for SyncRequest {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(f, "{} {}", self.verb, self.url)
  }
}

/// Sends resolved requests to the
/// backend.
///
/// Failures (network errors, non-2xx
/// responses) are returned as-is; models
/// never retry or translate them. An
/// empty response body decodes to
/// [`Value::Null`].
#[allow(async_fn_in_trait)]
pub trait Transport {
  async fn send(
    &self,
    request: &SyncRequest
  ) -> anyhow::Result<Value>;
}

#[cfg(test)]
pub(crate) mod recording {
  use std::cell::RefCell;
  use std::collections::VecDeque;

  use serde_json::Value;

  use super::{
    SyncRequest,
    Transport
  };

  /// Records every request and answers
  /// with queued responses (`Null` once
  /// the queue is drained).
  #[derive(Default)]
  pub struct RecordingTransport {
    pub requests:  RefCell<Vec<SyncRequest>>,
    responses:     RefCell<VecDeque<anyhow::Result<Value>>>
  }

  impl RecordingTransport {
    pub fn respond_with(
      self,
      value: Value
    ) -> Self {
      self
        .responses
        .borrow_mut()
        .push_back(Ok(value));
      self
    }

    pub fn fail_with(
      self,
      message: &str
    ) -> Self {
      self
        .responses
        .borrow_mut()
        .push_back(Err(anyhow::anyhow!(
          message.to_string()
        )));
      self
    }

    pub fn sent(&self) -> Vec<SyncRequest> {
      self.requests.borrow().clone()
    }
  }

  impl Transport for RecordingTransport {
    async fn send(
      &self,
      request: &SyncRequest
    ) -> anyhow::Result<Value> {
      self
        .requests
        .borrow_mut()
        .push(request.clone());
      self
        .responses
        .borrow_mut()
        .pop_front()
        .unwrap_or(Ok(Value::Null))
    }
  }
}

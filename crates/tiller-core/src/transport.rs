use anyhow::{
  Context,
  anyhow
};
use reqwest::{
  Method,
  Url,
  header
};
use serde_json::Value;
use tiller_shared::{
  HttpVerb,
  SyncRequest,
  Transport
};
use tracing::{
  debug,
  warn
};

use crate::config::Config;

/// [`Transport`] over HTTP, relative to a
/// configured base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  base:   Url
}

impl HttpTransport {
  pub fn new(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    let base = cfg.base_url()?;
    let client =
      reqwest::Client::builder()
        .timeout(cfg.timeout())
        .build()
        .context(
          "failed building HTTP client"
        )?;
    debug!(base = %base, timeout_secs = cfg.timeout_secs, "built HTTP transport");
    Ok(Self { client, base })
  }

  pub fn base(&self) -> &Url {
    &self.base
  }

  pub fn endpoint(
    &self,
    path: &str
  ) -> anyhow::Result<Url> {
    self
      .base
      .join(path.trim_start_matches('/'))
      .with_context(|| {
        format!(
          "invalid endpoint path: {path}"
        )
      })
  }

  pub fn build_request(
    &self,
    request: &SyncRequest
  ) -> anyhow::Result<reqwest::Request> {
    let url = self.endpoint(&request.url)?;
    let mut builder = self
      .client
      .request(method_for(request.verb), url)
      .header(
        header::ACCEPT,
        "application/json"
      );

    if let Some(content_type) =
      request.content_type
    {
      builder = builder.header(
        header::CONTENT_TYPE,
        content_type
      );
    }
    if let Some(body) = &request.body {
      builder = builder.body(body.clone());
    }

    builder.build().with_context(|| {
      format!(
        "failed building request \
         {request}"
      )
    })
  }
}

impl Transport for HttpTransport {
  #[tracing::instrument(
    skip_all,
    fields(request = %request)
  )]
  async fn send(
    &self,
    request: &SyncRequest
  ) -> anyhow::Result<Value> {
    let http_request =
      self.build_request(request)?;
    let response = self
      .client
      .execute(http_request)
      .await
      .with_context(|| {
        format!("request failed: {request}")
      })?;

    let status = response.status();
    let body =
      response.text().await.with_context(
        || {
          format!(
            "failed reading response \
             body for {request}"
          )
        }
      )?;

    if !status.is_success() {
      warn!(
        status = %status,
        "backend rejected request"
      );
      return Err(anyhow!(
        "{request} failed with HTTP \
         {status}: {}",
        body.trim()
      ));
    }

    debug!(status = %status, bytes = body.len(), "request succeeded");
    decode_body(&body).with_context(|| {
      format!(
        "invalid JSON response for \
         {request}"
      )
    })
  }
}

fn method_for(verb: HttpVerb) -> Method {
  match verb {
    | HttpVerb::Get => Method::GET,
    | HttpVerb::Post => Method::POST,
    | HttpVerb::Put => Method::PUT,
    | HttpVerb::Delete => Method::DELETE
  }
}

/// Empty bodies decode to `Null`.
pub fn decode_body(
  body: &str
) -> serde_json::Result<Value> {
  if body.trim().is_empty() {
    return Ok(Value::Null);
  }
  serde_json::from_str(body)
}

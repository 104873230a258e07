use anyhow::anyhow;
use gloo::net::http::{
  Request,
  RequestBuilder
};
use serde_json::Value;
use tiller_shared::{
  HttpVerb,
  SyncRequest,
  Transport
};

/// Browser [`Transport`] over `fetch`.
///
/// An empty base keeps request URLs
/// relative to the page, which is how the
/// dashboard is served next to the API.
#[derive(
  Debug, Clone, Default, PartialEq,
)]
pub struct FetchTransport {
  base: String
}

impl FetchTransport {
  pub fn new(
    base: impl Into<String>
  ) -> Self {
    Self { base: base.into() }
  }

  pub fn url_for(
    &self,
    path: &str
  ) -> String {
    join_url(&self.base, path)
  }
}

impl Transport for FetchTransport {
  async fn send(
    &self,
    request: &SyncRequest
  ) -> anyhow::Result<Value> {
    let url = self.url_for(&request.url);
    tracing::debug!(request = %request, url = %url, "sending request");

    let mut builder = builder_for(
      request.verb,
      &url
    )
    .header("Accept", "application/json");
    if let Some(content_type) =
      request.content_type
    {
      builder = builder
        .header("Content-Type", content_type);
    }

    let outgoing = match &request.body {
      | Some(body) => builder.body(body.clone()),
      | None => builder.build()
    }
    .map_err(|e| {
      anyhow!(
        "failed to build {request}: {e}"
      )
    })?;

    let response =
      outgoing.send().await.map_err(|e| {
        anyhow!("{request} failed: {e}")
      })?;
    let status = response.status();
    let ok = response.ok();
    let body =
      response.text().await.map_err(|e| {
        anyhow!(
          "failed reading response for \
           {request}: {e}"
        )
      })?;

    if !ok {
      tracing::warn!(status, request = %request, "backend rejected request");
      return Err(anyhow!(
        "{request} failed with HTTP \
         {status}: {}",
        body.trim()
      ));
    }

    if body.trim().is_empty() {
      return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|e| {
      anyhow!(
        "invalid JSON response for \
         {request}: {e}"
      )
    })
  }
}

fn builder_for(
  verb: HttpVerb,
  url: &str
) -> RequestBuilder {
  match verb {
    | HttpVerb::Get => Request::get(url),
    | HttpVerb::Post => Request::post(url),
    | HttpVerb::Put => Request::put(url),
    | HttpVerb::Delete => {
      Request::delete(url)
    }
  }
}

fn join_url(
  base: &str,
  path: &str
) -> String {
  if base.is_empty() {
    return path.to_string();
  }
  format!(
    "{}/{}",
    base.trim_end_matches('/'),
    path.trim_start_matches('/')
  )
}

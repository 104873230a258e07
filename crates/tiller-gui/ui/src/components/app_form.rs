use tiller_shared::{
  App,
  AppCollection
};
use web_sys::{
  HtmlInputElement,
  HtmlTextAreaElement
};
use yew::{
  Callback,
  Html,
  Properties,
  SubmitEvent,
  TargetCast,
  function_component,
  html,
  use_context,
  use_state
};

use super::ModalHandle;
use crate::api::FetchTransport;

#[derive(
  Clone, Debug, PartialEq, Eq,
)]
struct AppDraft {
  id:        String,
  cmd:       String,
  mem:       String,
  cpus:      String,
  instances: String,
  uris:      String
}

impl Default for AppDraft {
  fn default() -> Self {
    let defaults = App::with_id("");
    Self {
      id:        String::new(),
      cmd:       String::new(),
      mem:       defaults.mem.to_string(),
      cpus:      defaults.cpus.to_string(),
      instances: defaults
        .instances
        .to_string(),
      uris:      String::new()
    }
  }
}

impl AppDraft {
  /// Builds the app to start. A blank id
  /// gets a generated one; URIs are split
  /// on whitespace and commas.
  fn to_app(&self) -> Result<App, String> {
    let mut app = if self.id.trim().is_empty()
    {
      App::default()
    } else {
      App::with_id(self.id.trim())
    };

    let cmd = self.cmd.trim();
    app.cmd = (!cmd.is_empty())
      .then(|| cmd.to_string());
    app.mem =
      parse_number(&self.mem, "memory")?;
    app.cpus =
      parse_number(&self.cpus, "CPUs")?;
    app.instances = self
      .instances
      .trim()
      .parse()
      .map_err(|_| {
        "instances must be a whole \
         number"
          .to_string()
      })?;
    app.uris = self
      .uris
      .split(|c: char| {
        c.is_whitespace() || c == ','
      })
      .filter(|uri| !uri.is_empty())
      .map(str::to_string)
      .collect();
    Ok(app)
  }
}

fn parse_number(
  raw: &str,
  label: &str
) -> Result<f64, String> {
  match raw.trim().parse::<f64>() {
    | Ok(value)
      if value.is_finite()
        && value >= 0.0 =>
    {
      Ok(value)
    }
    | _ => Err(format!(
      "{label} must be a non-negative \
       number"
    ))
  }
}

#[derive(Properties, PartialEq)]
pub struct AppFormProps {
  pub apps:       AppCollection,
  /// Receives the collection with the
  /// started app added.
  pub on_created: Callback<AppCollection>
}

#[function_component(AppForm)]
pub fn app_form(
  props: &AppFormProps
) -> Html {
  let modal = use_context::<ModalHandle>();
  let draft = use_state(AppDraft::default);
  let error = use_state(|| None::<String>);
  let busy = use_state(|| false);

  let field = |update: fn(&mut AppDraft, String)| {
    let draft = draft.clone();
    Callback::from(
      move |e: web_sys::InputEvent| {
        let input: HtmlInputElement =
          e.target_unchecked_into();
        let mut next = (*draft).clone();
        update(&mut next, input.value());
        draft.set(next);
      }
    )
  };

  let on_uris = {
    let draft = draft.clone();
    Callback::from(
      move |e: web_sys::InputEvent| {
        let input: HtmlTextAreaElement =
          e.target_unchecked_into();
        let mut next = (*draft).clone();
        next.uris = input.value();
        draft.set(next);
      }
    )
  };

  let on_submit = {
    let draft = draft.clone();
    let error = error.clone();
    let busy = busy.clone();
    let apps = props.apps.clone();
    let on_created = props.on_created.clone();
    let modal = modal.clone();
    Callback::from(move |e: SubmitEvent| {
      e.prevent_default();
      let app = match draft.to_app() {
        | Ok(app) => app,
        | Err(err) => {
          error.set(Some(err));
          return;
        }
      };

      let mut apps = apps.clone();
      let error = error.clone();
      let busy = busy.clone();
      let on_created = on_created.clone();
      let modal = modal.clone();
      busy.set(true);
      wasm_bindgen_futures::spawn_local(
        async move {
          let created = apps
            .create(
              &FetchTransport::default(),
              app
            )
            .await
            .map(|app| app.id().to_string());
          match created {
            | Ok(id) => {
              tracing::info!(app_id = %id, "started app");
              on_created.emit(apps);
              if let Some(modal) = modal {
                modal.destroy.emit(());
              }
            }
            | Err(err) => {
              tracing::error!(error = %err, "start failed");
              error.set(Some(err.to_string()));
              busy.set(false);
            }
          }
        }
      );
    })
  };

  html! {
      <form class="app-form" onsubmit={on_submit}>
          <div class="header">{ "New App" }</div>
          <div class="content">
              <div class="field">
                  <label>{ "ID" }</label>
                  <input
                      value={draft.id.clone()}
                      oninput={field(|d, v| d.id = v)}
                      placeholder="generated when blank"
                  />
              </div>
              <div class="field">
                  <label>{ "Command" }</label>
                  <input value={draft.cmd.clone()} oninput={field(|d, v| d.cmd = v)} />
              </div>
              <div class="field">
                  <label>{ "Memory (MB)" }</label>
                  <input type="number" step="any" value={draft.mem.clone()} oninput={field(|d, v| d.mem = v)} />
              </div>
              <div class="field">
                  <label>{ "CPUs" }</label>
                  <input type="number" step="any" value={draft.cpus.clone()} oninput={field(|d, v| d.cpus = v)} />
              </div>
              <div class="field">
                  <label>{ "Instances" }</label>
                  <input type="number" min="0" value={draft.instances.clone()} oninput={field(|d, v| d.instances = v)} />
              </div>
              <div class="field">
                  <label>{ "URIs" }</label>
                  <textarea value={draft.uris.clone()} oninput={on_uris} />
              </div>
              if let Some(err) = (*error).clone() {
                  <div class="field-error">{ err }</div>
              }
          </div>
          <div class="footer">
              <button type="submit" class="btn" disabled={*busy}>{ "Start" }</button>
          </div>
      </form>
  }
}

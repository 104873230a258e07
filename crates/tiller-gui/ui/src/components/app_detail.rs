use tiller_shared::{
  App,
  Task
};
use web_sys::HtmlInputElement;
use yew::{
  Callback,
  Html,
  MouseEvent,
  Properties,
  TargetCast,
  function_component,
  html,
  use_context,
  use_effect_with,
  use_state
};

use super::ModalHandle;
use crate::api::FetchTransport;

#[derive(Properties, PartialEq)]
pub struct AppDetailProps {
  pub app:        App,
  /// The app changed on the backend.
  pub on_changed: Callback<()>,
  pub on_error:   Callback<String>
}

fn parse_instances(
  raw: &str
) -> Result<u32, String> {
  raw.trim().parse::<u32>().map_err(|_| {
    format!(
      "instances must be a whole \
       number, got {:?}",
      raw.trim()
    )
  })
}

fn ports_label(task: &Task) -> String {
  task
    .ports
    .iter()
    .map(u16::to_string)
    .collect::<Vec<_>>()
    .join(", ")
}

#[function_component(AppDetail)]
pub fn app_detail(
  props: &AppDetailProps
) -> Html {
  let modal = use_context::<ModalHandle>();
  let tasks =
    use_state(|| props.app.tasks().clone());
  let instances_input = use_state(|| {
    props.app.instances.to_string()
  });
  let busy = use_state(|| false);

  {
    let tasks = tasks.clone();
    let on_error = props.on_error.clone();
    use_effect_with(
      props.app.id().to_string(),
      move |app_id| {
        let mut collection =
          (*tasks).clone();
        collection.rebind(app_id.clone());
        wasm_bindgen_futures::spawn_local(
          async move {
            match collection
              .fetch(&FetchTransport::default())
              .await
            {
              | Ok(count) => {
                tracing::debug!(count, "loaded app tasks");
                tasks.set(collection);
              }
              | Err(err) => {
                tracing::error!(error = %err, "task fetch failed");
                on_error.emit(err.to_string());
              }
            }
          }
        );
        || ()
      }
    );
  }

  let on_instances_input = {
    let instances_input =
      instances_input.clone();
    Callback::from(
      move |e: web_sys::InputEvent| {
        let input: HtmlInputElement =
          e.target_unchecked_into();
        instances_input.set(input.value());
      }
    )
  };

  let on_scale = {
    let app = props.app.clone();
    let instances_input =
      instances_input.clone();
    let busy = busy.clone();
    let on_changed = props.on_changed.clone();
    let on_error = props.on_error.clone();
    Callback::from(move |_: MouseEvent| {
      let instances =
        match parse_instances(
          &instances_input
        ) {
          | Ok(instances) => instances,
          | Err(err) => {
            on_error.emit(err);
            return;
          }
        };

      let mut app = app.clone();
      let busy = busy.clone();
      let on_changed = on_changed.clone();
      let on_error = on_error.clone();
      busy.set(true);
      wasm_bindgen_futures::spawn_local(
        async move {
          match app
            .scale(
              &FetchTransport::default(),
              instances
            )
            .await
          {
            | Ok(_) => on_changed.emit(()),
            | Err(err) => {
              tracing::error!(error = %err, "scale failed");
              on_error.emit(err.to_string());
            }
          }
          busy.set(false);
        }
      );
    })
  };

  let on_stop = {
    let app = props.app.clone();
    let busy = busy.clone();
    let on_changed = props.on_changed.clone();
    let on_error = props.on_error.clone();
    let modal = modal.clone();
    Callback::from(move |_: MouseEvent| {
      let app = app.clone();
      let busy = busy.clone();
      let on_changed = on_changed.clone();
      let on_error = on_error.clone();
      let modal = modal.clone();
      busy.set(true);
      wasm_bindgen_futures::spawn_local(
        async move {
          match app
            .destroy(&FetchTransport::default())
            .await
          {
            | Ok(_) => match modal {
              | Some(modal) => {
                modal.destroy.emit(())
              }
              | None => on_changed.emit(())
            },
            | Err(err) => {
              tracing::error!(error = %err, "stop failed");
              on_error.emit(err.to_string());
              busy.set(false);
            }
          }
        }
      );
    })
  };

  let on_close = {
    let modal = modal.clone();
    Callback::from(move |_: MouseEvent| {
      if let Some(modal) = &modal {
        modal.destroy.emit(());
      }
    })
  };

  let app = &props.app;
  html! {
      <div class="app-detail">
          <div class="header">
              <h3>{ app.id() }</h3>
          </div>
          <div class="content">
              <dl class="attributes">
                  <dt>{ "Command" }</dt>
                  <dd>{ app.cmd.clone().unwrap_or_else(|| "-".to_string()) }</dd>
                  <dt>{ "Memory (MB)" }</dt>
                  <dd>{ app.mem }</dd>
                  <dt>{ "CPUs" }</dt>
                  <dd>{ app.cpus }</dd>
                  <dt>{ "Instances" }</dt>
                  <dd>{ app.instances }</dd>
                  <dt>{ "URIs" }</dt>
                  <dd>
                      { for app.uris.iter().map(|uri| html! { <div class="uri">{ uri.clone() }</div> }) }
                  </dd>
              </dl>

              <h4>{ format!("Tasks ({})", tasks.len()) }</h4>
              <table class="table tasks">
                  <thead>
                      <tr>
                          <th>{ "ID" }</th>
                          <th>{ "Host" }</th>
                          <th>{ "Ports" }</th>
                      </tr>
                  </thead>
                  <tbody>
                      {
                          for tasks.tasks().iter().map(|task| html! {
                              <tr>
                                  <td>{ task.id.clone() }</td>
                                  <td>{ task.host.clone().unwrap_or_default() }</td>
                                  <td>{ ports_label(task) }</td>
                              </tr>
                          })
                      }
                  </tbody>
              </table>
          </div>
          <div class="footer">
              <input
                  class="instances"
                  type="number"
                  min="0"
                  value={(*instances_input).clone()}
                  oninput={on_instances_input}
              />
              <button type="button" class="btn" onclick={on_scale} disabled={*busy}>
                  { "Scale" }
              </button>
              <button type="button" class="btn danger" onclick={on_stop} disabled={*busy}>
                  { "Stop" }
              </button>
              <button type="button" class="btn" onclick={on_close}>{ "Close" }</button>
          </div>
      </div>
  }
}

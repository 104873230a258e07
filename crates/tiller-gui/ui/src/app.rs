use tiller_shared::AppCollection;
use yew::{
  Callback,
  Html,
  MouseEvent,
  function_component,
  html,
  use_effect_with,
  use_state
};

use crate::api::FetchTransport;
use crate::components::{
  AppDetail,
  AppForm,
  AppTable,
  ModalComponent
};

#[derive(Clone, Debug, PartialEq)]
enum ModalView {
  Detail(String),
  NewApp
}

#[function_component(Dashboard)]
pub fn dashboard() -> Html {
  let apps =
    use_state(AppCollection::default);
  let error = use_state(|| None::<String>);
  let modal_view =
    use_state(|| None::<ModalView>);
  let refresh_tick = use_state(|| 0_u64);

  {
    let apps = apps.clone();
    let error = error.clone();
    use_effect_with(
      *refresh_tick,
      move |tick| {
        let tick = *tick;
        wasm_bindgen_futures::spawn_local(
          async move {
            tracing::info!(tick, "refreshing app list");
            let mut next = (*apps).clone();
            match next
              .fetch(&FetchTransport::default())
              .await
            {
              | Ok(count) => {
                tracing::debug!(count, "refreshed app list");
                apps.set(next);
              }
              | Err(err) => {
                tracing::error!(error = %err, "app list refresh failed");
                error.set(Some(err.to_string()));
              }
            }
          }
        );
        || ()
      }
    );
  }

  let reload = {
    let refresh_tick = refresh_tick.clone();
    Callback::from(move |_: ()| {
      refresh_tick.set(*refresh_tick + 1)
    })
  };

  let report_error = {
    let error = error.clone();
    Callback::from(move |message: String| {
      error.set(Some(message))
    })
  };

  let dismiss_error = {
    let error = error.clone();
    Callback::from(move |_: MouseEvent| {
      error.set(None)
    })
  };

  let close_modal = {
    let modal_view = modal_view.clone();
    Callback::from(move |_: ()| {
      tracing::debug!("closing modal");
      modal_view.set(None)
    })
  };

  let open_detail = {
    let modal_view = modal_view.clone();
    Callback::from(move |id: String| {
      modal_view
        .set(Some(ModalView::Detail(id)))
    })
  };

  let open_new_app = {
    let modal_view = modal_view.clone();
    Callback::from(move |_: MouseEvent| {
      modal_view.set(Some(ModalView::NewApp))
    })
  };

  let on_created = {
    let apps = apps.clone();
    Callback::from(
      move |next: AppCollection| {
        apps.set(next)
      }
    )
  };

  let modal_body = match &*modal_view {
    | Some(ModalView::Detail(id)) => {
      apps.get(id).cloned().map(|app| {
        html! {
            <AppDetail
                app={app}
                on_changed={reload.clone()}
                on_error={report_error.clone()}
            />
        }
      })
    }
    | Some(ModalView::NewApp) => Some(html! {
        <AppForm apps={(*apps).clone()} on_created={on_created} />
    }),
    | None => None
  };

  html! {
      <div class="dashboard">
          <div class="toolbar">
              <h2>{ "Apps" }</h2>
              <button type="button" class="btn" onclick={open_new_app}>{ "New App" }</button>
          </div>
          if let Some(message) = (*error).clone() {
              <div class="alert error" onclick={dismiss_error}>{ message }</div>
          }
          <AppTable apps={apps.apps().to_vec()} on_select={open_detail} />
          if let Some(body) = modal_body {
              <ModalComponent on_destroy={Some(reload)} on_close={close_modal}>
                  { body }
              </ModalComponent>
          }
      </div>
  }
}

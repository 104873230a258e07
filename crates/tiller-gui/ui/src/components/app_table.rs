use tiller_shared::App;
use yew::{
  Callback,
  Html,
  Properties,
  function_component,
  html
};

#[derive(Properties, PartialEq)]
pub struct AppTableProps {
  pub apps:      Vec<App>,
  pub on_select: Callback<String>
}

#[function_component(AppTable)]
pub fn app_table(props: &AppTableProps) -> Html {
  if props.apps.is_empty() {
    return html! {
        <div class="panel empty">{ "No apps running." }</div>
    };
  }

  html! {
      <table class="table apps">
          <thead>
              <tr>
                  <th>{ "ID" }</th>
                  <th>{ "Command" }</th>
                  <th>{ "Memory (MB)" }</th>
                  <th>{ "CPUs" }</th>
                  <th>{ "Instances" }</th>
              </tr>
          </thead>
          <tbody>
              {
                  for props.apps.iter().map(|app| {
                      let id = app.id().to_string();
                      let on_select = props.on_select.clone();
                      html! {
                          <tr class="row" onclick={move |_| on_select.emit(id.clone())}>
                              <td>{ app.id() }</td>
                              <td class="cmd">{ app.cmd.clone().unwrap_or_default() }</td>
                              <td>{ app.mem }</td>
                              <td>{ app.cpus }</td>
                              <td>{ app.instances }</td>
                          </tr>
                      }
                  })
              }
          </tbody>
      </table>
  }
}

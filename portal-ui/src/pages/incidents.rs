use crate::app::use_portal;
use leptos::*;
use portal_core::filters::IncidentBoard;
use portal_core::model::{EntityId, IncidentStatus};
use wasm_bindgen_futures::spawn_local;

fn criticality_class(label: &str) -> String {
    format!("badge {}", label.to_ascii_lowercase())
}

#[component]
pub fn IncidentsPage() -> impl IntoView {
    let portal = use_portal();
    let board = create_rw_signal(IncidentBoard::new());
    let preview = create_rw_signal(None::<String>);

    let load = move || {
        board.update(|b| b.begin_load());
        spawn_local(async move {
            let result = futures::try_join!(portal.client.incidents(), portal.client.sites());
            if let Some(outcome) = board.try_update(|b| b.finish_load(result)) {
                let _ = portal.intercept(outcome);
            }
        });
    };
    load();

    let change_status = move |id: EntityId, next: IncidentStatus| {
        let Some(pending) = board.try_update(|b| b.begin_status_change(&id, next)).flatten() else {
            return;
        };
        spawn_local(async move {
            let result = portal.client.update_incident_status(&id, next).await;
            if let Some(outcome) = board.try_update(|b| b.finish_status_change(pending, result)) {
                let _ = portal.intercept(outcome);
            }
        });
    };

    let filters = move || {
        let (sites, types, filter) = board.with(|b| {
            (
                b.site_options().into_iter().cloned().collect::<Vec<_>>(),
                b.type_options(),
                b.filter.clone(),
            )
        });
        view! {
          <div class="filters">
            <select on:change=move |ev| {
              let value = event_target_value(&ev);
              board.update(|b| b.filter.site = (!value.is_empty()).then(|| EntityId::new(value)));
            }>
              <option value="">"All sites"</option>
              {sites
                .into_iter()
                .map(|site| {
                  let selected = filter.site.as_ref() == Some(&site.id);
                  view! { <option value=site.id.to_string() selected=selected>{site.name}</option> }
                })
                .collect_view()}
            </select>
            <select on:change=move |ev| {
              let value = event_target_value(&ev);
              board.update(|b| b.filter.incident_type = (!value.is_empty()).then(|| EntityId::new(value)));
            }>
              <option value="">"All types"</option>
              {types
                .into_iter()
                .map(|(id, label)| {
                  let selected = filter.incident_type.as_ref() == Some(&id);
                  view! { <option value=id.to_string() selected=selected>{label}</option> }
                })
                .collect_view()}
            </select>
            <select on:change=move |ev| {
              let status = event_target_value(&ev).parse::<IncidentStatus>().ok();
              board.update(|b| b.filter.status = status);
            }>
              <option value="">"Open, in progress and resolved"</option>
              {IncidentStatus::ALL
                .into_iter()
                .map(|status| {
                  let selected = filter.status == Some(status);
                  view! { <option value=status.as_str() selected=selected>{status.label()}</option> }
                })
                .collect_view()}
            </select>
            <button on:click=move |_| load()>"Refresh"</button>
          </div>
        }
    };

    let rows = move || {
        board.with(|b| {
            b.visible()
                .into_iter()
                .map(|incident| {
                    let id = incident.id.clone();
                    let site = incident
                        .site_name
                        .clone()
                        .unwrap_or_else(|| b.site_name(&incident.site).to_string());
                    let kind = incident
                        .incident_type_display
                        .clone()
                        .unwrap_or_else(|| incident.incident_type.to_string());
                    let criticality = incident.criticality.map(|c| {
                        view! { <span class=criticality_class(c.as_str())>{c.label()}</span> }
                    });
                    let reported = incident
                        .created_at
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default();
                    let reporter = match (&incident.reporter_phone, incident.is_anonymous) {
                        (Some(phone), false) => format!("{} ({phone})", incident.reporter_label()),
                        _ => incident.reporter_label().to_string(),
                    };
                    let current = incident.status;
                    let images = incident
                        .images
                        .iter()
                        .map(|image| {
                            let url = image.image_url.clone();
                            let full = url.clone();
                            view! {
                              <img class="thumb" src=url on:click=move |_| preview.set(Some(full.clone()))/>
                            }
                        })
                        .collect_view();
                    view! {
                      <tr>
                        <td>{reported}</td>
                        <td>{site}</td>
                        <td>{kind}</td>
                        <td>{criticality}</td>
                        <td class="description">{incident.description.clone()}</td>
                        <td>{reporter}</td>
                        <td>{images}</td>
                        <td>
                          <select on:change=move |ev| {
                            if let Ok(next) = event_target_value(&ev).parse::<IncidentStatus>() {
                              change_status(id.clone(), next);
                            }
                          }>
                            {IncidentStatus::ALL
                              .into_iter()
                              .map(|status| view! {
                                <option value=status.as_str() selected={status == current}>{status.label()}</option>
                              })
                              .collect_view()}
                          </select>
                        </td>
                      </tr>
                    }
                })
                .collect_view()
        })
    };

    view! {
      <section>
        <h1>"Incidents"</h1>
        {filters}
        {move || board.with(|b| b.error().map(|e| view! { <p class="error">{e.to_string()}</p> }))}
        <Show when=move || board.with(IncidentBoard::is_loading)>
          <p class="meta">"Loading..."</p>
        </Show>
        <table class="incidents">
          <thead>
            <tr>
              <th>"Reported"</th><th>"Site"</th><th>"Type"</th><th>"Criticality"</th>
              <th>"Description"</th><th>"Reporter"</th><th>"Images"</th><th>"Status"</th>
            </tr>
          </thead>
          <tbody>{rows}</tbody>
        </table>
        {move || preview.get().map(|url| view! {
          <div class="modal-backdrop" on:click=move |_| preview.set(None)>
            <img class="full" src=url/>
          </div>
        })}
      </section>
    }
}

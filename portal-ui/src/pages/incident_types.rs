use super::crud;
use crate::app::use_portal;
use leptos::*;
use portal_core::admin::IncidentTypeScreen;
use portal_core::model::{EntityId, IncidentTypeDraft};
use portal_core::public::TypeVisual;
use wasm_bindgen_futures::spawn_local;

#[component]
pub fn IncidentTypesPage() -> impl IntoView {
    let portal = use_portal();
    let screen = create_rw_signal(IncidentTypeScreen::new());
    let sites = crud::load_sites(portal);
    let rows = crud::rows(screen);
    crud::load(portal, screen);

    let toggle = move |id: EntityId| {
        let Some(request) = screen.with_untracked(|s| s.begin_toggle(&id)) else {
            return;
        };
        spawn_local(async move {
            let result = portal.client.update_incident_type(&id, &request.draft).await;
            let Some(toggled) = screen.try_update(|s| s.finish_toggle(result)) else {
                return;
            };
            if let Ok(true) = portal.intercept(toggled) {
                crud::load(portal, screen);
            }
        });
    };

    let text_field = move |label: &'static str,
                           field: &'static str,
                           read: fn(&IncidentTypeDraft) -> String,
                           write: fn(&mut IncidentTypeDraft, String)| {
        view! {
          <label>{label}
            <input
              prop:value=crud::draft(screen, read)
              on:input=move |ev| crud::edit(screen, field, |d| write(d, event_target_value(&ev)))
            />
          </label>
          {crud::error_of(screen, field)}
        }
    };

    let fields = move || {
        view! {
          <label>"Site"
            {crud::site_select(
              sites,
              move || screen.with(|s| s.editor().and_then(|e| e.draft().site.clone())),
              "Select a site",
              move |site| crud::edit(screen, "site", |d| d.site = site),
            )}
          </label>
          {crud::error_of(screen, "site")}
          {text_field("Name (key)", "name", |d| d.name.clone(), |d, v| d.name = v)}
          {text_field("Display name", "display_name", |d| d.display_name.clone(), |d, v| d.display_name = v)}
          <label>"Description"
            <textarea
              prop:value=crud::draft(screen, |d| d.description.clone())
              on:input=move |ev| crud::edit(screen, "description", |d| d.description = event_target_value(&ev))
            ></textarea>
          </label>
          <label>"Order"
            <input
              type="number"
              prop:value=crud::draft(screen, |d| d.order.to_string())
              on:input=move |ev| {
                let order = event_target_value(&ev).parse::<i32>().unwrap_or_default();
                crud::edit(screen, "order", |d| d.order = order)
              }
            />
          </label>
          {text_field("Icon", "icon", |d| d.icon.clone().unwrap_or_default(), |d, v| d.icon = (!v.trim().is_empty()).then_some(v))}
          {text_field("Color", "color", |d| d.color.clone().unwrap_or_default(), |d, v| d.color = (!v.trim().is_empty()).then_some(v))}
          <label class="check">
            <input
              type="checkbox"
              prop:checked=crud::draft(screen, |d| d.requires_criticality)
              on:change=move |ev| crud::edit(screen, "requires_criticality", |d| d.requires_criticality = event_target_checked(&ev))
            />
            "Requires criticality"
          </label>
          <label class="check">
            <input
              type="checkbox"
              prop:checked=crud::draft(screen, |d| d.is_active)
              on:change=move |ev| crud::edit(screen, "is_active", |d| d.is_active = event_target_checked(&ev))
            />
            "Active"
          </label>
        }
    };

    view! {
      <section class="crud">
        {crud::toolbar(screen, "Incident Types", "Add Incident Type")}
        <div class="filters">
          {crud::site_select(
            sites,
            move || screen.with(|s| s.site_filter().cloned()),
            "All sites",
            move |site| screen.update(|s| s.set_site_filter(site)),
          )}
        </div>
        <table>
          <thead>
            <tr>
              <th>"Order"</th><th>"Display name"</th><th>"Site"</th>
              <th>"Criticality"</th><th>"Status"</th><th></th>
            </tr>
          </thead>
          <tbody>
            {move || {
              rows
                .get()
                .into_iter()
                .map(|kind| {
                  let visual = TypeVisual::resolve(&kind);
                  let id = kind.id.clone();
                  view! {
                    <tr class:inactive=!kind.is_active>
                      <td>{kind.order}</td>
                      <td>
                        <span class=format!("swatch {}", visual.color.css_class())></span>
                        {kind.display_name.clone()}
                        <div class="meta">{kind.name.clone()}</div>
                      </td>
                      <td>{crud::site_name(sites, &kind.site)}</td>
                      <td>{if kind.requires_criticality { "Required" } else { "-" }}</td>
                      <td>
                        <button on:click=move |_| toggle(id.clone())>
                          {if kind.is_active { "Active" } else { "Inactive" }}
                        </button>
                      </td>
                      {crud::row_actions(screen, kind.id.clone())}
                    </tr>
                  }
                })
                .collect_view()
            }}
          </tbody>
        </table>
        {crud::editor_modal(portal, screen, fields)}
        {crud::delete_dialog(portal, screen)}
      </section>
    }
}

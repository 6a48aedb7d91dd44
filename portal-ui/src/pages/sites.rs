use super::crud;
use crate::app::use_portal;
use leptos::*;
use portal_core::admin::SiteScreen;

#[component]
pub fn SitesPage() -> impl IntoView {
    let portal = use_portal();
    let screen = create_rw_signal(SiteScreen::new());
    let rows = crud::rows(screen);
    crud::load(portal, screen);

    let fields = move || {
        view! {
          <label>"Name"
            <input
              prop:value=crud::draft(screen, |d| d.name.clone())
              on:input=move |ev| crud::edit(screen, "name", |d| d.name = event_target_value(&ev))
            />
          </label>
          {crud::error_of(screen, "name")}
          <label>"Address"
            <textarea
              prop:value=crud::draft(screen, |d| d.address.clone())
              on:input=move |ev| crud::edit(screen, "address", |d| d.address = event_target_value(&ev))
            ></textarea>
          </label>
          {crud::error_of(screen, "address")}
        }
    };

    view! {
      <section class="crud">
        {crud::toolbar(screen, "Sites", "Add Site")}
        <table>
          <thead><tr><th>"Name"</th><th>"Address"</th><th></th></tr></thead>
          <tbody>
            {move || {
              rows
                .get()
                .into_iter()
                .map(|site| view! {
                  <tr>
                    <td>{site.name.clone()}</td>
                    <td>{site.address.clone()}</td>
                    {crud::row_actions(screen, site.id.clone())}
                  </tr>
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

use super::crud;
use crate::app::use_portal;
use leptos::*;
use portal_core::admin::ContactScreen;

#[component]
pub fn ContactsPage() -> impl IntoView {
    let portal = use_portal();
    let screen = create_rw_signal(ContactScreen::new());
    let sites = crud::load_sites(portal);
    let rows = crud::rows(screen);
    crud::load(portal, screen);

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
          <label>"Name"
            <input
              prop:value=crud::draft(screen, |d| d.name.clone())
              on:input=move |ev| crud::edit(screen, "name", |d| d.name = event_target_value(&ev))
            />
          </label>
          {crud::error_of(screen, "name")}
          <label>"Designation"
            <input
              prop:value=crud::draft(screen, |d| d.designation.clone())
              on:input=move |ev| crud::edit(screen, "designation", |d| d.designation = event_target_value(&ev))
            />
          </label>
          {crud::error_of(screen, "designation")}
          <label>"Phone number"
            <input
              type="tel"
              placeholder="+919876543210"
              prop:value=crud::draft(screen, |d| d.phone_number.clone())
              on:input=move |ev| crud::edit(screen, "phone_number", |d| d.phone_number = event_target_value(&ev))
            />
          </label>
          {crud::error_of(screen, "phone_number")}
        }
    };

    view! {
      <section class="crud">
        {crud::toolbar(screen, "Emergency Contacts", "Add Contact")}
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
            <tr><th>"Name"</th><th>"Designation"</th><th>"Phone"</th><th>"Site"</th><th></th></tr>
          </thead>
          <tbody>
            {move || {
              rows
                .get()
                .into_iter()
                .map(|contact| {
                  let site = contact
                    .site_name
                    .clone()
                    .unwrap_or_else(|| crud::site_name(sites, &contact.site));
                  view! {
                    <tr>
                      <td>{contact.name.clone()}</td>
                      <td>{contact.designation.clone()}</td>
                      <td><a href=contact.tel_link()>{contact.phone_number.clone()}</a></td>
                      <td>{site}</td>
                      {crud::row_actions(screen, contact.id.clone())}
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

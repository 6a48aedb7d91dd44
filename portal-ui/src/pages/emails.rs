use super::crud;
use crate::app::use_portal;
use leptos::*;
use portal_core::admin::EmailScreen;

#[component]
pub fn EmailsPage() -> impl IntoView {
    let portal = use_portal();
    let screen = create_rw_signal(EmailScreen::new());
    let rows = crud::rows(screen);
    crud::load(portal, screen);

    let fields = move || {
        view! {
          <label>"Email address"
            <input
              type="email"
              placeholder="safety@example.com"
              prop:value=crud::draft(screen, |d| d.email.clone())
              on:input=move |ev| crud::edit(screen, "email", |d| d.email = event_target_value(&ev))
            />
          </label>
          {crud::error_of(screen, "email")}
        }
    };

    view! {
      <section class="crud">
        {crud::toolbar(screen, "Notification Emails", "Add Email")}
        <p class="meta">"Every address below is notified when a new incident is reported."</p>
        <table>
          <thead><tr><th>"Email"</th><th>"Added"</th><th></th></tr></thead>
          <tbody>
            {move || {
              rows
                .get()
                .into_iter()
                .map(|email| {
                  let added = email
                    .created_at
                    .map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                  view! {
                    <tr>
                      <td>{email.email.clone()}</td>
                      <td>{added}</td>
                      {crud::row_actions(screen, email.id.clone())}
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

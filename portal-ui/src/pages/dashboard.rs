use crate::app::{use_portal, Link};
use leptos::*;
use portal_core::dashboard::DashboardStats;
use portal_core::session::Route;
use wasm_bindgen_futures::spawn_local;

#[component]
pub fn DashboardPage() -> impl IntoView {
    let portal = use_portal();
    let stats = create_rw_signal(None::<DashboardStats>);
    let error = create_rw_signal(None::<String>);

    spawn_local(async move {
        let result = DashboardStats::load(&portal.client).await;
        match portal.intercept(result) {
            Ok(loaded) => stats.set(Some(loaded)),
            Err(err) => error.set(Some(err.user_message())),
        }
    });

    let card = move |label: &'static str, read: fn(&DashboardStats) -> usize, route: Route| {
        view! {
          <div class="stat">
            <div class="value">{move || stats.get().map(|s| read(&s).to_string()).unwrap_or_else(|| "-".into())}</div>
            <Link route=route>{label}</Link>
          </div>
        }
    };

    view! {
      <section>
        <h1>"Admin Dashboard"</h1>
        {move || error.get().map(|e| view! { <p class="error">{e}</p> })}
        <div class="stats">
          {card("Sites", |s| s.sites, Route::Sites)}
          {card("Total incidents", |s| s.total_incidents, Route::Incidents)}
          {card("Open", |s| s.open, Route::Incidents)}
          {card("In progress", |s| s.in_progress, Route::Incidents)}
          {card("Resolved", |s| s.resolved, Route::Incidents)}
          {card("Closed", |s| s.closed, Route::Incidents)}
          {card("Emergency contacts", |s| s.contacts, Route::Contacts)}
          {card("Notification emails", |s| s.emails, Route::Emails)}
        </div>
      </section>
    }
}

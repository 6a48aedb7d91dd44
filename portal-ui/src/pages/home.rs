use crate::app::Link;
use leptos::*;
use portal_core::session::Route;

#[component]
pub fn HomePage() -> impl IntoView {
    view! {
      <div class="home">
        <h1>"Safety Feedback System"</h1>
        <p>
          "Scan the QR code posted at your site to report unsafe conditions, "
          "unsafe actions, near misses or general feedback."
        </p>
        <Link route=Route::Login class="primary">"Admin sign in"</Link>
      </div>
    }
}

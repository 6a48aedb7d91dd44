use crate::bridge::FetchTransport;
use crate::pages;
use leptos::*;
use portal_core::api::PortalClient;
use portal_core::config::BROWSER_API_BASE;
use portal_core::session::{guard, Navigation, Route, Session};
use portal_core::{ApiError, ApiResult};
use wasm_bindgen_futures::spawn_local;

/// Shared by every page through context.
#[derive(Clone, Copy)]
pub struct Portal {
    pub client: PortalClient<FetchTransport>,
    pub session: RwSignal<Session>,
    pub route: RwSignal<Route>,
    /// The first auth check has answered.
    pub checked: RwSignal<bool>,
}

fn current_route() -> Route {
    let path = window().location().pathname().unwrap_or_default();
    Route::parse(&path)
}

impl Portal {
    fn new() -> Self {
        Self {
            client: PortalClient::new(FetchTransport::new(BROWSER_API_BASE)),
            session: create_rw_signal(Session::anonymous()),
            route: create_rw_signal(current_route()),
            checked: create_rw_signal(false),
        }
    }

    pub fn navigate(&self, route: Route) {
        let path = route.path();
        if let Ok(history) = window().history() {
            let _ = history.push_state_with_url(&wasm_bindgen::JsValue::NULL, "", Some(&path));
        }
        self.route.set(route);
    }

    /// A 401 anywhere signs the user out; the guard then shows the login.
    pub fn intercept<T>(&self, result: ApiResult<T>) -> ApiResult<T> {
        if let Err(err) = &result {
            console_warn(&format!("request failed: {err}"));
        }
        self.session
            .try_update(|session| session.intercept(result))
            .unwrap_or(Err(ApiError::Unauthorized))
    }

    pub fn sign_out(&self) {
        let portal = *self;
        spawn_local(async move {
            let _ = portal.client.logout().await;
            portal.session.update(Session::clear);
            portal.navigate(Route::Login);
        });
    }
}

pub fn console_warn(message: &str) {
    web_sys::console::warn_1(&message.into());
}

pub fn use_portal() -> Portal {
    expect_context::<Portal>()
}

#[component]
pub fn Link(route: Route, #[prop(optional)] class: &'static str, children: Children) -> impl IntoView {
    let portal = use_portal();
    let href = route.path();
    view! {
      <a
        href=href
        class=class
        on:click=move |ev| {
          ev.prevent_default();
          portal.navigate(route.clone());
        }
      >
        {children()}
      </a>
    }
}

fn render(route: Route) -> View {
    match route {
        Route::Home => view! { <pages::home::HomePage/> }.into_view(),
        Route::Public(site) => view! { <pages::public::PublicFeedback site=site/> }.into_view(),
        Route::Login => view! { <pages::login::LoginPage after=None/> }.into_view(),
        Route::Dashboard => view! { <pages::dashboard::DashboardPage/> }.into_view(),
        Route::Sites => view! { <pages::sites::SitesPage/> }.into_view(),
        Route::Contacts => view! { <pages::contacts::ContactsPage/> }.into_view(),
        Route::Incidents => view! { <pages::incidents::IncidentsPage/> }.into_view(),
        Route::IncidentTypes => view! { <pages::incident_types::IncidentTypesPage/> }.into_view(),
        Route::Emails => view! { <pages::emails::EmailsPage/> }.into_view(),
        Route::QrCodes => view! { <pages::qr_codes::QrCodesPage/> }.into_view(),
        Route::NotFound(path) => view! {
          <div class="not-found">
            <h1>"Page Not Found"</h1>
            <p class="meta">{path}</p>
            <Link route=Route::Home>"Go home"</Link>
          </div>
        }
        .into_view(),
    }
}

#[component]
pub fn App() -> impl IntoView {
    let portal = Portal::new();
    provide_context(portal);

    let _popstate = window_event_listener(ev::popstate, move |_| portal.route.set(current_route()));

    spawn_local(async move {
        if let Ok(status) = portal.client.check_auth().await {
            portal.session.update(|s| s.apply(&status));
        }
        portal.checked.set(true);
    });

    create_effect(move |_| {
        document().set_title(portal.route.with(Route::title));
    });

    // Only a change of signed-in state re-renders the page.
    let signed_in = create_memo(move |_| portal.session.with(Session::is_authenticated));

    move || {
        let route = portal.route.get();
        if route.requires_auth() && !portal.checked.get() {
            return view! { <div class="loading">"Loading..."</div> }.into_view();
        }
        signed_in.track();
        match portal.session.with_untracked(|session| guard(route, session)) {
            Navigation::Render(route) if route.requires_auth() => {
                view! { <AdminLayout>{render(route)}</AdminLayout> }.into_view()
            }
            Navigation::Render(route) => render(route),
            Navigation::Login { after } => {
                view! { <pages::login::LoginPage after=Some(after)/> }.into_view()
            }
        }
    }
}

#[component]
fn AdminLayout(children: Children) -> impl IntoView {
    let portal = use_portal();
    let username = move || portal.session.with(|s| s.username().unwrap_or_default().to_string());
    view! {
      <div class="admin">
        <nav class="admin-nav">
          {Route::ADMIN_NAV
            .into_iter()
            .map(|route| {
              let title = route.title();
              let target = route.clone();
              let active = move || portal.route.get() == target;
              view! {
                <span class:active=active>
                  <Link route=route>{title}</Link>
                </span>
              }
            })
            .collect_view()}
          <span class="user">{username}</span>
          <button on:click=move |_| portal.sign_out()>"Logout"</button>
        </nav>
        <main>{children()}</main>
      </div>
    }
}

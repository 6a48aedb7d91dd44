use super::field_error;
use crate::app::use_portal;
use leptos::*;
use portal_core::session::{after_login, LoginForm, Route};
use portal_core::validation::NON_FIELD;
use wasm_bindgen_futures::spawn_local;

#[component]
pub fn LoginPage(after: Option<Route>) -> impl IntoView {
    let portal = use_portal();
    let form = create_rw_signal(LoginForm::default());
    let error = move |field: &'static str| {
        field_error(move || form.with(|f| f.errors().get(field).map(str::to_string)))
    };

    let submit = move || {
        let Some((username, password)) = form.try_update(|f| f.begin_submit()).flatten() else {
            return;
        };
        let after = after.clone();
        spawn_local(async move {
            let result = portal
                .client
                .login(&username, &password)
                .await
                .map(|status| portal.session.update(|s| s.apply(&status)));
            form.update(|f| f.finish_submit(&result));
            if result.is_ok() {
                portal.navigate(after_login(after));
            }
        });
    };

    view! {
      <div class="login">
        <form on:submit=move |ev| {
          ev.prevent_default();
          submit();
        }>
          <h1>"Safety Portal Admin"</h1>
          {error(NON_FIELD)}
          <label>"Username"
            <input
              autocomplete="username"
              prop:value=move || form.with(|f| f.username.clone())
              on:input=move |ev| form.update(|f| f.set_username(event_target_value(&ev)))
            />
          </label>
          {error("username")}
          <label>"Password"
            <input
              type="password"
              autocomplete="current-password"
              prop:value=move || form.with(|f| f.password.clone())
              on:input=move |ev| form.update(|f| f.set_password(event_target_value(&ev)))
            />
          </label>
          {error("password")}
          <button type="submit" class="primary" disabled=move || form.with(LoginForm::is_submitting)>
            {move || if form.with(LoginForm::is_submitting) { "Signing in..." } else { "Sign in" }}
          </button>
        </form>
      </div>
    }
}

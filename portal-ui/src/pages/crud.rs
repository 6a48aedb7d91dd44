//! Glue between a [`CrudScreen`] held in a signal and the network. The
//! screen stays synchronous; calls run on `spawn_local` between its
//! `begin_*` and `finish_*` steps.

use super::field_error;
use crate::app::Portal;
use leptos::*;
use portal_core::admin::{CrudScreen, Resource};
use portal_core::model::EntityId;
use portal_core::validation::NON_FIELD;
use wasm_bindgen_futures::spawn_local;

pub type Screen<R> = RwSignal<CrudScreen<R>>;

pub fn load<R: Resource + 'static>(portal: Portal, screen: Screen<R>) {
    screen.update(|s| s.begin_load());
    spawn_local(async move {
        let result = R::list(&portal.client).await;
        if let Some(outcome) = screen.try_update(|s| s.finish_load(result)) {
            let _ = portal.intercept(outcome);
        }
    });
}

pub fn save<R: Resource + 'static>(portal: Portal, screen: Screen<R>) {
    let Some(request) = screen.try_update(|s| s.begin_save()).flatten() else {
        return;
    };
    spawn_local(async move {
        let result = match &request.id {
            Some(id) => R::update(&portal.client, id, &request.draft).await,
            None => R::create(&portal.client, &request.draft).await,
        };
        let Some(saved) = screen.try_update(|s| s.finish_save(result)) else {
            return;
        };
        if let Ok(true) = portal.intercept(saved) {
            load(portal, screen);
        }
    });
}

pub fn confirm_delete<R: Resource + 'static>(portal: Portal, screen: Screen<R>) {
    let Some(id) = screen.try_update(|s| s.begin_delete()).flatten() else {
        return;
    };
    spawn_local(async move {
        let result = R::delete(&portal.client, &id).await;
        let Some(deleted) = screen.try_update(|s| s.finish_delete(result)) else {
            return;
        };
        if let Ok(true) = portal.intercept(deleted) {
            load(portal, screen);
        }
    });
}

/// Applies an input change to the open draft, clearing `field`'s error.
pub fn edit<R: Resource + 'static>(
    screen: Screen<R>,
    field: &'static str,
    apply: impl FnOnce(&mut R::Draft),
) {
    screen.update(|s| {
        if let Some(editor) = s.editor_mut() {
            editor.edit(field, apply);
        }
    });
}

pub fn draft<R: Resource + 'static, V>(
    screen: Screen<R>,
    read: impl Fn(&R::Draft) -> V + Copy + 'static,
) -> impl Fn() -> V + Copy + 'static
where
    V: Default,
{
    move || screen.with(|s| s.editor().map(|e| read(e.draft())).unwrap_or_default())
}

pub fn error_of<R: Resource + 'static>(screen: Screen<R>, field: &'static str) -> impl IntoView {
    field_error(move || {
        screen.with(|s| s.editor().and_then(|e| e.error(field)).map(str::to_string))
    })
}

/// Page header, load error and the add button.
pub fn toolbar<R: Resource + 'static>(screen: Screen<R>, heading: &'static str, add: &'static str) -> impl IntoView {
    view! {
      <div class="toolbar">
        <h1>{heading}</h1>
        <button class="primary" on:click=move |_| screen.update(|s| s.open_create())>{add}</button>
      </div>
      {move || screen.with(|s| s.error().map(|e| view! { <p class="error">{e.to_string()}</p> }))}
      <Show when=move || screen.with(|s| s.is_loading())>
        <p class="meta">"Loading..."</p>
      </Show>
    }
}

/// Create/edit modal around the entity-specific `fields`.
pub fn editor_modal<R, F, V>(portal: Portal, screen: Screen<R>, fields: F) -> impl IntoView
where
    R: Resource + 'static,
    F: Fn() -> V + Copy + 'static,
    V: IntoView,
{
    // Only opening, closing or retitling the editor rebuilds the form;
    // keystrokes reach the inputs through their own `prop:value` bindings.
    let title = create_memo(move |_| screen.with(|s| s.editor().map(|e| e.title())));
    let saving = create_memo(move |_| screen.with(|s| s.editor().is_some_and(|e| e.is_saving())));
    move || {
        let title = title.get()?;
        Some(untrack(|| view! {
          <div class="modal-backdrop">
            <form
              class="modal"
              on:submit=move |ev| {
                ev.prevent_default();
                save(portal, screen);
              }
            >
              <h2>{title}</h2>
              {error_of(screen, NON_FIELD)}
              {fields()}
              <div class="row">
                <button type="button" on:click=move |_| screen.update(|s| s.close_editor())>"Cancel"</button>
                <button type="submit" class="primary" disabled=move || saving.get()>
                  {move || if saving.get() { "Saving..." } else { "Save" }}
                </button>
              </div>
            </form>
          </div>
        }))
    }
}

/// Records as currently filtered; row views rebuild only when these change.
pub fn rows<R: Resource + 'static>(screen: Screen<R>) -> Memo<Vec<R::Record>> {
    create_memo(move |_| screen.with(|s| s.visible().into_iter().cloned().collect()))
}

pub fn delete_dialog<R: Resource + 'static>(portal: Portal, screen: Screen<R>) -> impl IntoView {
    let pending = create_memo(move |_| screen.with(|s| s.pending_delete().is_some()));
    move || {
        pending.get().then(|| view! {
          <div class="modal-backdrop">
            <div class="modal">
              <h2>{format!("Delete {}", R::NOUN)}</h2>
              <p>{format!("Are you sure you want to delete this {}?", R::NOUN)}</p>
              <div class="row">
                <button on:click=move |_| screen.update(|s| s.cancel_delete())>"Cancel"</button>
                <button class="danger" on:click=move |_| confirm_delete(portal, screen)>"Delete"</button>
              </div>
            </div>
          </div>
        })
    }
}

/// Edit and delete buttons for one row.
pub fn row_actions<R: Resource + 'static>(screen: Screen<R>, id: EntityId) -> impl IntoView {
    let edit_id = id.clone();
    view! {
      <td class="actions">
        <button on:click=move |_| {
          screen.update(|s| {
            s.open_edit(&edit_id);
          })
        }>"Edit"</button>
        <button class="danger" on:click=move |_| {
          screen.update(|s| {
            s.request_delete(&id);
          })
        }>"Delete"</button>
      </td>
    }
}

/// `<select>` of sites; an empty value means none.
pub fn site_select(
    sites: RwSignal<Vec<portal_core::model::Site>>,
    selected: impl Fn() -> Option<EntityId> + 'static,
    placeholder: &'static str,
    on_pick: impl Fn(Option<EntityId>) + 'static,
) -> impl IntoView {
    let selected = Signal::derive(selected);
    view! {
      <select on:change=move |ev| {
        let value = event_target_value(&ev);
        on_pick((!value.is_empty()).then(|| EntityId::new(value)));
      }>
        <option value="" selected=move || selected.with(Option::is_none)>{placeholder}</option>
        {move || {
          let current = selected.get();
          sites
            .get()
            .into_iter()
            .map(|site| {
              let is_selected = current.as_ref() == Some(&site.id);
              view! { <option value=site.id.to_string() selected=is_selected>{site.name}</option> }
            })
            .collect_view()
        }}
      </select>
    }
}

/// Sites for pickers and name lookups on the contacts and types screens.
pub fn load_sites(portal: Portal) -> RwSignal<Vec<portal_core::model::Site>> {
    let sites = create_rw_signal(Vec::new());
    spawn_local(async move {
        let result = portal.client.sites().await;
        if let Ok(mut list) = portal.intercept(result) {
            list.sort_by(|a, b| a.name.cmp(&b.name));
            sites.set(list);
        }
    });
    sites
}

pub fn site_name(sites: RwSignal<Vec<portal_core::model::Site>>, id: &EntityId) -> String {
    sites.with(|list| {
        list.iter()
            .find(|s| &s.id == id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| "Unknown Site".into())
    })
}

//! The page a visitor lands on after scanning a site's QR code.

use super::{field_error, read_files};
use crate::app::{console_warn, use_portal, Portal};
use crate::camera::{user_agent, BrowserDevices};
use leptos::html::Video;
use leptos::*;
use portal_core::camera::{CameraConstraints, CameraSession, CameraState, MediaDevices, MediaStream};
use portal_core::model::{Criticality, EmergencyContact, EntityId};
use portal_core::public::{ContactsLookup, PageState, PublicPage, TypeIcon};
use portal_core::submission::{
    IncidentForm, SubmissionPhase, FIELD_CRITICALITY, FIELD_DESCRIPTION, FIELD_IMAGES,
    FIELD_REPORTER_NAME, FIELD_REPORTER_PHONE,
};
use portal_core::upload::ImageFile;
use portal_core::validation::{DESCRIPTION_MAX_CHARS, NON_FIELD};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;

type Page = RwSignal<PublicPage>;

fn icon_glyph(icon: TypeIcon) -> &'static str {
    match icon {
        TypeIcon::AlertTriangle => "\u{26A0}",
        TypeIcon::Shield => "\u{1F6E1}",
        TypeIcon::Eye => "\u{1F441}",
        TypeIcon::Send => "\u{2709}",
    }
}

fn with_form(page: Page, apply: impl FnOnce(&mut IncidentForm)) {
    page.update(|p| {
        if let Some(form) = p.form_mut() {
            apply(form);
        }
    });
}

fn read_form<V: Default>(page: Page, read: impl FnOnce(&IncidentForm) -> V) -> V {
    page.with(|p| p.form().map(read).unwrap_or_default())
}

#[component]
pub fn PublicFeedback(site: EntityId) -> impl IntoView {
    let portal = use_portal();
    let page = create_rw_signal(PublicPage::new(site));

    let load = move || {
        page.update(PublicPage::begin_load);
        spawn_local(async move {
            let site = page.with_untracked(|p| p.site_id().clone());
            let (found, types) = futures::join!(
                portal.client.site(&site),
                portal.client.incident_types(Some(&site))
            );
            page.update(|p| p.finish_load(found, types));
        });
    };
    load();

    let open_contacts = move |_: ev::MouseEvent| {
        page.update(PublicPage::open_contacts);
        spawn_local(async move {
            let site = page.with_untracked(|p| p.site_id().clone());
            let result = portal.client.site_contacts(&site).await;
            page.update(|p| p.finish_contacts(result));
        });
    };

    // Typing into the incident form must not rebuild the grid behind it.
    let stage = create_memo(move |_| page.with(|p| (p.state().clone(), p.is_submitted())));
    let body = move || match stage.get() {
        (PageState::Loading, _) => view! { <div class="loading">"Loading..."</div> }.into_view(),
        (PageState::NotFound, _) => view! {
          <div class="not-found">
            <h1>"Site not found"</h1>
            <p>"This QR code does not point to a known site."</p>
          </div>
        }
        .into_view(),
        (PageState::Failed(message), _) => view! {
          <div class="error-panel">
            <p class="error">{message}</p>
            <button on:click=move |_| load()>"Try again"</button>
          </div>
        }
        .into_view(),
        (PageState::Ready, true) => view! {
          <div class="thank-you">
            <h2>"Thank you!"</h2>
            <p>"Your report has been submitted and the safety team has been notified."</p>
            <button class="primary" on:click=move |_| page.update(PublicPage::submit_another)>
              "Submit another report"
            </button>
          </div>
        }
        .into_view(),
        (PageState::Ready, false) => view! { <TypeGrid page=page/> }.into_view(),
    };

    view! {
      <div class="public">
        <header>
          <h1>"Safety Feedback"</h1>
          <p class="site-name">{move || page.with(|p| p.site().map(|s| s.name.clone()))}</p>
          <button class="contacts-button" on:click=open_contacts>"Emergency Contacts"</button>
        </header>
        {body}
        <IncidentModal portal=portal page=page/>
        <ContactsModal page=page/>
      </div>
    }
}

#[component]
fn TypeGrid(page: Page) -> impl IntoView {
    let tiles = create_memo(move |_| {
        page.with(|p| {
            p.tiles()
                .map(|(kind, visual)| (kind.clone(), visual))
                .collect::<Vec<_>>()
        })
    });
    let grid = move || {
        tiles
            .get()
            .into_iter()
            .map(|(kind, visual)| {
                let id = kind.id.clone();
                view! {
                  <button
                    class=format!("tile {}", visual.color.css_class())
                    on:click=move |_| {
                      page.update(|p| {
                        p.choose(&id);
                      })
                    }
                  >
                    <span class="icon">{icon_glyph(visual.icon)}</span>
                    <span class="title">{kind.display_name.clone()}</span>
                    <span class="blurb">{kind.blurb().to_string()}</span>
                  </button>
                }
            })
            .collect_view()
    };
    view! {
      <p class="prompt">"What would you like to report?"</p>
      <div class="tiles">{grid}</div>
      <Show when=move || tiles.with(Vec::is_empty)>
        <p class="meta">"No report types are configured for this site yet."</p>
      </Show>
    }
}

fn submit(portal: Portal, page: Page) {
    let Some(payload) = page
        .try_update(|p| p.form_mut().and_then(IncidentForm::begin_submit))
        .flatten()
    else {
        return;
    };
    spawn_local(async move {
        let result = portal.client.create_incident(payload).await;
        if let Err(err) = &result {
            console_warn(&format!("incident submission failed: {err}"));
        }
        page.update(|p| {
            let stored = match p.form_mut() {
                Some(form) => {
                    form.finish_submit(result);
                    matches!(form.phase(), SubmissionPhase::Submitted(_))
                }
                None => false,
            };
            if stored {
                p.mark_submitted();
            }
        });
    });
}

#[component]
fn IncidentModal(portal: Portal, page: Page) -> impl IntoView {
    let camera_open = create_rw_signal(false);
    let error = move |field: &'static str| {
        field_error(move || read_form(page, |f| f.error(field).map(str::to_string)))
    };
    let busy = create_memo(move |_| read_form(page, |f| f.phase().is_busy()));
    let layout = create_memo(move |_| page.with(|p| p.form().map(IncidentForm::layout)));
    let needs_criticality = create_memo(move |_| layout.with(|l| l.as_ref().is_some_and(|l| l.requires_criticality)));
    let anonymous = create_memo(move |_| layout.with(|l| l.as_ref().is_some_and(|l| l.is_anonymous)));
    let image_count = create_memo(move |_| layout.with(|l| l.as_ref().map_or(0, |l| l.image_count)));
    let failure = create_memo(move |_| {
        read_form(page, |f| match f.phase() {
            SubmissionPhase::Error(message) => Some(message.clone()),
            _ => None,
        })
    });

    let pick_files = move |ev: ev::Event| {
        let Some(input) = ev
            .target()
            .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok())
        else {
            return;
        };
        spawn_local(async move {
            for file in read_files(input).await {
                with_form(page, |f| {
                    f.add_image(file);
                });
            }
        });
    };

    let criticality = move || {
        needs_criticality.get().then(|| {
            view! {
              <fieldset class="criticality">
                <legend>"Criticality"</legend>
                {Criticality::ALL
                  .into_iter()
                  .map(|level| view! {
                    <label class=format!("level {}", level.as_str())>
                      <input
                        type="radio"
                        name="criticality"
                        prop:checked=move || read_form(page, |f| Some(f.criticality())) == Some(level)
                        on:change=move |_| with_form(page, |f| f.set_criticality(level))
                      />
                      {level.label()}
                    </label>
                  })
                  .collect_view()}
              </fieldset>
              {error(FIELD_CRITICALITY)}
            }
        })
    };

    let previews = move || {
        image_count.track();
        page.with_untracked(|p| {
            p.form()
                .map(|f| {
                    f.images()
                        .previews()
                        .enumerate()
                        .map(|(index, src)| view! {
                          <div class="preview">
                            <img src=src.to_string()/>
                            <button type="button" on:click=move |_| with_form(page, |f| {
                              f.remove_image(index);
                            })>"\u{00D7}"</button>
                          </div>
                        })
                        .collect_view()
                })
                .unwrap_or_default()
        })
    };

    let reporter = move || {
        (!anonymous.get()).then(|| view! {
          <label>"Your name"
            <input
              prop:value=move || read_form(page, |f| f.reporter_name().to_string())
              on:input=move |ev| with_form(page, |f| f.set_reporter_name(event_target_value(&ev)))
            />
          </label>
          {error(FIELD_REPORTER_NAME)}
          <label>"Phone number"
            <input
              type="tel"
              prop:value=move || read_form(page, |f| f.reporter_phone().to_string())
              on:input=move |ev| with_form(page, |f| f.set_reporter_phone(event_target_value(&ev)))
            />
          </label>
          {error(FIELD_REPORTER_PHONE)}
        })
    };

    // Rebuilt only when the form opens, closes or changes type.
    let title = create_memo(move |_| layout.with(|l| l.as_ref().map(|l| l.title.clone())));
    let modal = move || {
        let title = title.get()?;
        Some(untrack(|| view! {
          <div class="modal-backdrop">
            <form class="modal incident" on:submit=move |ev| {
              ev.prevent_default();
              submit(portal, page);
            }>
              <div class="modal-head">
                <h2>{title}</h2>
                <button type="button" on:click=move |_| page.update(PublicPage::close_form)>"\u{00D7}"</button>
              </div>
              {criticality}
              <label>"Description"
                <textarea
                  rows="5"
                  maxlength=DESCRIPTION_MAX_CHARS
                  placeholder="Describe what you observed"
                  prop:value=move || read_form(page, |f| f.description().to_string())
                  on:input=move |ev| with_form(page, |f| f.set_description(event_target_value(&ev)))
                ></textarea>
              </label>
              <p class="counter">
                {move || format!("{}/{}", read_form(page, IncidentForm::description_chars), DESCRIPTION_MAX_CHARS)}
              </p>
              {error(FIELD_DESCRIPTION)}
              <div class="photos">
                <label class="button">
                  "Upload photos"
                  <input type="file" accept="image/*" multiple=true hidden=true on:change=pick_files/>
                </label>
                <button type="button" on:click=move |_| camera_open.set(true)>"Take photo"</button>
              </div>
              <div class="previews">{previews}</div>
              {error(FIELD_IMAGES)}
              <label class="check">
                <input
                  type="checkbox"
                  prop:checked=move || read_form(page, IncidentForm::is_anonymous)
                  on:change=move |ev| with_form(page, |f| f.set_anonymous(event_target_checked(&ev)))
                />
                "Submit anonymously"
              </label>
              {reporter}
              {error(NON_FIELD)}
              {move || failure.get().map(|message| view! { <p class="error">{message}</p> })}
              <button type="submit" class="primary" disabled=move || busy.get()>
                {move || if busy.get() { "Submitting..." } else { "Submit report" }}
              </button>
            </form>
            <Show when=move || camera_open.get()>
              <CameraCapture
                on_capture=move |file: ImageFile| {
                  with_form(page, |f| {
                    f.add_image(file);
                  });
                  camera_open.set(false);
                }
                on_close=move |_: ()| camera_open.set(false)
              />
            </Show>
          </div>
        }))
    };

    modal
}

#[component]
fn CameraCapture(
    #[prop(into)] on_capture: Callback<ImageFile>,
    #[prop(into)] on_close: Callback<()>,
) -> impl IntoView {
    let video_ref = create_node_ref::<Video>();
    let session = create_rw_signal(CameraSession::new(CameraConstraints::for_user_agent(&user_agent())));
    let capture_error = create_rw_signal(None::<String>);

    let open = move || {
        let Some(video) = video_ref.get_untracked() else {
            return;
        };
        let devices = BrowserDevices::new((*video).clone());
        let supported = devices.is_supported();
        let Some(Ok(ticket)) = session.try_update(|s| s.begin_open(supported)) else {
            return;
        };
        capture_error.set(None);
        spawn_local(async move {
            let constraints = session.with_untracked(|s| *s.constraints());
            let mut result = Some(devices.open_stream(&constraints).await);
            session.try_update(|s| {
                if let Some(result) = result.take() {
                    s.attach(ticket, result);
                }
            });
            // The capture view closed while the camera was starting.
            if let Some(Ok(mut stream)) = result {
                stream.stop();
            }
        });
    };
    video_ref.on_load(move |_| open());

    on_cleanup(move || {
        session.try_update(|s| s.close());
    });

    let capture = move |_: ev::MouseEvent| {
        let now = js_sys::Date::now() as i64;
        match session.try_update(|s| s.capture(now)) {
            Some(Ok(file)) => on_capture.call(file),
            Some(Err(err)) => capture_error.set(Some(err.to_string())),
            None => {}
        }
    };

    let cancel = move |_: ev::MouseEvent| {
        session.update(|s| s.close());
        on_close.call(());
    };

    view! {
      <div class="camera">
        <video
          node_ref=video_ref
          autoplay=true
          playsinline=true
          muted=true
          class:hidden=move || !matches!(session.with(|s| s.state().clone()), CameraState::Live)
          on:loadedmetadata=move |_| session.update(|s| s.mark_live())
        ></video>
        <Show when=move || session.with(|s| s.shows_placeholder())>
          <div class="placeholder">"Starting camera..."</div>
        </Show>
        {move || session.with(|s| s.error().cloned()).map(|err| view! {
          <div class="camera-error">
            <p class="error">{err.to_string()}</p>
            {err.is_retryable().then(|| view! {
              <button type="button" on:click=move |_| open()>"Try again"</button>
            })}
          </div>
        })}
        {move || capture_error.get().map(|e| view! { <p class="error">{e}</p> })}
        <div class="row">
          <button type="button" on:click=cancel>"Cancel"</button>
          <button
            type="button"
            class="primary"
            disabled=move || !matches!(session.with(|s| s.state().clone()), CameraState::Live)
            on:click=capture
          >
            "Capture"
          </button>
        </div>
      </div>
    }
}

fn contact_card(contact: EmergencyContact) -> impl IntoView {
    view! {
      <li class="contact">
        <div>
          <b>{contact.name.clone()}</b>
          <div class="meta">{contact.designation.clone()}</div>
        </div>
        <a class="call" href=contact.tel_link()>{contact.phone_number.clone()}</a>
      </li>
    }
}

#[component]
fn ContactsModal(page: Page) -> impl IntoView {
    let lookup = create_memo(move |_| page.with(|p| p.contacts().clone()));
    move || {
        let lookup = lookup.get();
        if !lookup.is_open() {
            return None;
        }
        let body = match lookup {
            ContactsLookup::Loading => view! { <p class="meta">"Loading..."</p> }.into_view(),
            ContactsLookup::Failed(message) => view! { <p class="error">{message}</p> }.into_view(),
            ContactsLookup::Loaded {
                helplines,
                site_contacts,
            } => view! {
              <h3>"National helplines"</h3>
              <ul>{helplines.into_iter().map(contact_card).collect_view()}</ul>
              <h3>"Site contacts"</h3>
              {if site_contacts.is_empty() {
                view! { <p class="meta">"No contacts are listed for this site."</p> }.into_view()
              } else {
                view! { <ul>{site_contacts.into_iter().map(contact_card).collect_view()}</ul> }.into_view()
              }}
            }
            .into_view(),
            ContactsLookup::Closed => ().into_view(),
        };
        Some(view! {
          <div class="modal-backdrop">
            <div class="modal contacts">
              <div class="modal-head">
                <h2>"Emergency Contacts"</h2>
                <button on:click=move |_| page.update(PublicPage::close_contacts)>"\u{00D7}"</button>
              </div>
              {body}
            </div>
          </div>
        })
    }
}

use crate::app::use_portal;
use leptos::*;
use portal_core::qr::{QrBoard, QrEntry};
use wasm_bindgen_futures::spawn_local;

#[component]
pub fn QrCodesPage() -> impl IntoView {
    let portal = use_portal();
    let board = create_rw_signal(None::<QrBoard>);
    let error = create_rw_signal(None::<String>);

    spawn_local(async move {
        let result = QrBoard::load(&portal.client).await;
        match portal.intercept(result) {
            Ok(loaded) => board.set(Some(loaded)),
            Err(err) => error.set(Some(err.user_message())),
        }
    });

    let cards = move || {
        board.with(|b| {
            let Some(b) = b else {
                return view! { <p class="meta">"Loading..."</p> }.into_view();
            };
            b.cards
                .iter()
                .map(|card| {
                    let filename = card.download_filename();
                    let body = match &card.entry {
                        QrEntry::Ready(code) => view! {
                          <img class="qr" src=code.image.clone() alt=format!("QR code for {}", card.site.name)/>
                          <p class="meta"><a href=code.public_url.clone() target="_blank">{code.public_url.clone()}</a></p>
                          <a class="button" href=code.image.clone() download=filename>"Download"</a>
                        }
                        .into_view(),
                        QrEntry::Failed(message) => view! { <p class="error">{message.clone()}</p> }.into_view(),
                    };
                    view! {
                      <div class="qr-card">
                        <h3>{card.site.name.clone()}</h3>
                        <p class="meta">{card.site.address.clone()}</p>
                        {body}
                      </div>
                    }
                })
                .collect_view()
        })
    };

    view! {
      <section>
        <div class="toolbar">
          <h1>"QR Codes"</h1>
          <button on:click=move |_| {
            let _ = window().print();
          }>"Print"</button>
        </div>
        {move || error.get().map(|e| view! { <p class="error">{e}</p> })}
        <div class="qr-grid">{cards}</div>
      </section>
    }
}

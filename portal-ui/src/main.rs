mod app;
mod bridge;
mod camera;
mod pages;

fn main() {
    leptos::mount_to_body(|| leptos::view! { <app::App/> })
}

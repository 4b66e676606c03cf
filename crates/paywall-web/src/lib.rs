//! paywall Web Frontend
//!
//! Leptos-based WASM frontend: pricing page with hosted payment links.

mod app;
mod components;
mod pages;
mod storage;

pub use app::App;
pub use components::PaymentLink;
pub use storage::PAYMENT_LINK_KEY;

use wasm_bindgen::prelude::*;

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    leptos::mount::mount_to_body(App);
}

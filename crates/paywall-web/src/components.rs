//! UI Components

use leptos::prelude::*;

use crate::storage;

/// Button-styled link to a hosted checkout page
///
/// When `payment_link` is given it is written to local storage on click,
/// before the browser follows `href`.
#[component]
pub fn PaymentLink(
    #[prop(into)] href: String,
    #[prop(optional, into)] payment_link: Option<String>,
    #[prop(into)] text: String,
) -> impl IntoView {
    let remember = move |_| {
        if let Some(link) = payment_link.as_deref() {
            storage::remember_payment_link(link);
        }
    };

    view! {
        <a href=href class="btn btn-primary" on:click=remember>
            {text}
        </a>
    }
}

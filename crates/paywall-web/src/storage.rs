//! Browser Local Storage

/// Key under which the pending payment link is kept
pub const PAYMENT_LINK_KEY: &str = "stripePaymentLink";

fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok().flatten()
}

/// Remember which payment link the user is about to open
///
/// Best effort: storage may be unavailable (private mode, quota) and the
/// navigation goes ahead regardless.
pub fn remember_payment_link(link: &str) {
    if let Some(storage) = local_storage() {
        let _ = storage.set_item(PAYMENT_LINK_KEY, link);
    }
}

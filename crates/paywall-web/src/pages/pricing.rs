//! Pricing Page

use leptos::prelude::*;

use crate::components::PaymentLink;

const MONTHLY_LINK: &str = match option_env!("STRIPE_MONTHLY_PAYMENT_LINK") {
    Some(link) => link,
    None => "#",
};

const YEARLY_LINK: &str = match option_env!("STRIPE_YEARLY_PAYMENT_LINK") {
    Some(link) => link,
    None => "#",
};

#[component]
pub fn PricingPage() -> impl IntoView {
    view! {
        <div class="pricing">
            <h1>"Pricing"</h1>

            <div class="plans">
                <div class="plan">
                    <h2>"Free"</h2>
                    <div class="price">"$0"<span>"/month"</span></div>
                    <ul>
                        <li>"Core features"</li>
                    </ul>
                </div>

                <div class="plan featured">
                    <h2>"Premium Monthly"</h2>
                    <div class="price">"$9"<span>"/month"</span></div>
                    <ul>
                        <li>"Everything in Free"</li>
                        <li>"Premium features"</li>
                    </ul>
                    <PaymentLink href=MONTHLY_LINK payment_link=MONTHLY_LINK text="Subscribe" />
                </div>

                <div class="plan">
                    <span class="badge">"Best value"</span>
                    <h2>"Premium Yearly"</h2>
                    <div class="price">"$90"<span>"/year"</span></div>
                    <ul>
                        <li>"Everything in Monthly"</li>
                        <li>"Two months free"</li>
                    </ul>
                    <PaymentLink href=YEARLY_LINK payment_link=YEARLY_LINK text="Subscribe" />
                </div>
            </div>
        </div>
    }
}

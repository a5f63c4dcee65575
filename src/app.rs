//! SCOT Portal App
//!
//! Wires the sync engine to the browser, provides context and switches
//! between the sign-in screen and the dashboard.

use leptos::prelude::*;
use leptos::task::spawn_local;
use reactive_stores::Store;
use std::rc::Rc;
use std::time::Duration;

use scot_sync::SyncOrchestrator;

use crate::components::{
    Diagnostics, DueGrid, FollowupModal, OrdersPanel, QuickOrderModal, ScheduleCallDialog, SignIn, SyncErrorBanner,
    Toast, TopBar,
};
use crate::config;
use crate::context::{use_app_context, AppContext};
use crate::platform::{BrowserHttp, BrowserRuntime};
use crate::store::{AppState, AppStateStoreFields, StoreObserver, ToastSignal};

/// Countdowns and slot expiry are recomputed at this pace
const CLOCK_TICK: Duration = Duration::from_secs(5);

#[component]
pub fn App(debug: bool) -> impl IntoView {
    let config = config::load(debug);
    let sync = SyncOrchestrator::new(config, Rc::new(BrowserHttp), Rc::new(BrowserRuntime));

    let store = Store::new(AppState::default());
    let toast: ToastSignal = RwSignal::new(None);
    sync.set_observer(Rc::new(StoreObserver { store, toast }));

    let ctx = AppContext::new(sync, toast, debug);
    provide_context(store);
    provide_context(ctx);

    set_interval(move || ctx.tick(), CLOCK_TICK);

    let (signing_in, set_signing_in) = signal(false);

    let on_credential = Callback::new(move |credential: String| {
        set_signing_in.set(true);
        spawn_local(async move {
            if let Err(e) = ctx.sync().sign_in(&credential).await {
                if !e.is_cancelled() {
                    ctx.toast(e.user_message());
                }
            }
            set_signing_in.set(false);
        });
    });

    let on_sign_out = Callback::new(move |_: ()| {
        ctx.followup.set(None);
        ctx.scheduling.set(None);
        ctx.quick_order_open.set(false);
        ctx.sync().sign_out();
    });

    view! {
        <Show
            when=move || store.signed_in().get() && !signing_in.get()
            fallback=move || view! { <SignIn on_credential=on_credential busy=signing_in /> }
        >
            <Dashboard on_sign_out=on_sign_out />
        </Show>
        <Toast />
    }
}

#[component]
fn Dashboard(on_sign_out: Callback<()>) -> impl IntoView {
    let ctx = use_app_context();

    view! {
        <div class="dashboard">
            <TopBar on_sign_out=on_sign_out />
            <SyncErrorBanner />
            <main class="dashboard-main">
                <DueGrid />
                <OrdersPanel />
            </main>
            {ctx.debug.then(|| view! { <Diagnostics /> })}

            {move || ctx.followup.get().map(|followup| view! { <FollowupModal followup=followup /> })}
            {move || ctx.scheduling.get().map(|order| view! { <ScheduleCallDialog order=order /> })}
            <Show when=move || ctx.quick_order_open.get()>
                <QuickOrderModal />
            </Show>
        </div>
    }
}

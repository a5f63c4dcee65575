//! UI Components
//!
//! Leptos components of the dashboard.

mod diagnostics;
mod due_card;
mod followup_modal;
mod modal_shell;
mod order_frame;
mod orders_panel;
mod quick_order_modal;
mod sales_order_form;
mod schedule_call_dialog;
mod sign_in;
mod toast;
mod top_bar;

pub use diagnostics::Diagnostics;
pub use due_card::{DueCard, DueGrid};
pub use followup_modal::FollowupModal;
pub use modal_shell::ModalShell;
pub use order_frame::OrderFrame;
pub use orders_panel::OrdersPanel;
pub use quick_order_modal::QuickOrderModal;
pub use sales_order_form::SalesOrderForm;
pub use schedule_call_dialog::ScheduleCallDialog;
pub use sign_in::SignIn;
pub use toast::Toast;
pub use top_bar::{SyncErrorBanner, TopBar};

//! Periodic silent refresh while a session is active and no modal is open.

use futures::future::FutureExt;

use super::{RefreshOptions, SyncOrchestrator};

impl SyncOrchestrator {
    /// (Re)start the timer. Any previous timer loop ends at its next tick.
    pub(crate) fn start_polling(&self) {
        let interval = self.inner.config.poll_interval();
        let epoch = self.inner.poll_epoch.get() + 1;
        self.inner.poll_epoch.set(epoch);
        if interval.is_zero() || self.inner.suspended.get() > 0 {
            self.inner.polling.set(false);
            return;
        }
        self.inner.polling.set(true);

        let this = self.clone();
        self.inner.runtime.spawn(
            async move {
                loop {
                    this.inner.runtime.sleep(interval).await;
                    if this.inner.poll_epoch.get() != epoch || !this.is_signed_in() {
                        return;
                    }
                    this.refresh(RefreshOptions::silent()).await;
                }
            }
            .boxed_local(),
        );
    }

    pub(crate) fn stop_polling(&self) {
        self.inner.poll_epoch.set(self.inner.poll_epoch.get() + 1);
        self.inner.polling.set(false);
    }

    pub fn is_polling(&self) -> bool {
        self.inner.polling.get()
    }

    /// A modal opened: hold the timer so nothing changes under the user's hands
    pub fn suspend_polling(&self) {
        self.inner.suspended.set(self.inner.suspended.get() + 1);
        self.stop_polling();
    }

    /// A modal closed; the timer restarts once no modal remains open
    pub fn resume_polling(&self) {
        let remaining = self.inner.suspended.get().saturating_sub(1);
        self.inner.suspended.set(remaining);
        if remaining == 0 && self.is_signed_in() && !self.is_polling() {
            self.start_polling();
        }
    }
}

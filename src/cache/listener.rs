//! Invalidation listener
//!
//! A long-lived background task exclusively driving the invalidation
//! subscription: `Disconnected -> Connecting -> Subscribed`, back to
//! `Disconnected` on any transport error, never exiting on its own. While no
//! subscription is live the coordinator's table is bypassed (and flushed if
//! entries were cached), since missed notifications would otherwise cause
//! unbounded staleness.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::cache::coordinator::CacheCoordinator;

/// Subscription lifecycle state, observable through
/// [`ListenerHandle::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Disconnected,
    Connecting,
    Subscribed,
}

/// Owning handle for the listener task.
#[derive(Debug)]
pub struct ListenerHandle {
    shutdown_tx: mpsc::UnboundedSender<()>,
    state_rx: watch::Receiver<ListenerState>,
    join: JoinHandle<()>,
}

impl ListenerHandle {
    /// Current subscription state.
    pub fn state(&self) -> ListenerState {
        *self.state_rx.borrow()
    }

    /// A watch on the subscription state, independent of this handle.
    pub fn state_receiver(&self) -> watch::Receiver<ListenerState> {
        self.state_rx.clone()
    }

    /// Wait until the listener reports `state`.
    pub async fn wait_for(&self, state: ListenerState) {
        let mut rx = self.state_rx.clone();
        while *rx.borrow_and_update() != state {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Signal shutdown and wait for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.join.await;
    }
}

/// The background subscription loop.
pub struct InvalidationListener {
    coordinator: Arc<CacheCoordinator>,
    shutdown_rx: mpsc::UnboundedReceiver<()>,
    state_tx: watch::Sender<ListenerState>,
}

impl InvalidationListener {
    /// Spawn the listener task for `coordinator`.
    ///
    /// The table is suspended before the task starts, so no read can be
    /// served from cache until the first subscription is live.
    pub fn spawn(coordinator: Arc<CacheCoordinator>) -> ListenerHandle {
        coordinator.suspend_serving();
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ListenerState::Disconnected);
        let listener = Self {
            coordinator,
            shutdown_rx,
            state_tx,
        };
        let join = tokio::spawn(listener.run());
        ListenerHandle {
            shutdown_tx,
            state_rx,
            join,
        }
    }

    fn set_state(&self, state: ListenerState) {
        let _ = self.state_tx.send(state);
    }

    async fn run(mut self) {
        let config = self.coordinator.config().clone();
        let mut backoff = config.reconnect_backoff;

        loop {
            self.set_state(ListenerState::Connecting);
            let channel = self.coordinator.channel();
            let subscribed = tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    self.set_state(ListenerState::Disconnected);
                    return;
                }
                result = channel.subscribe() => result,
            };
            let mut subscription = match subscribed {
                Ok(subscription) => subscription,
                Err(err) => {
                    log::warn!("invalidation subscribe failed, retrying: {}", err);
                    self.set_state(ListenerState::Disconnected);
                    if self.backoff_or_shutdown(&mut backoff, &config).await {
                        return;
                    }
                    continue;
                }
            };

            self.set_state(ListenerState::Subscribed);
            self.coordinator.mark_trusted();
            backoff = config.reconnect_backoff;
            log::debug!("invalidation subscription live");

            loop {
                tokio::select! {
                    _ = self.shutdown_rx.recv() => {
                        self.set_state(ListenerState::Disconnected);
                        return;
                    }
                    event = subscription.next_event() => match event {
                        Ok(event) => self.coordinator.handle_invalidation(event),
                        Err(err) => {
                            log::warn!(
                                "invalidation subscription lost ({}), flushing cache and resubscribing",
                                err
                            );
                            self.coordinator.mark_untrusted();
                            self.set_state(ListenerState::Disconnected);
                            break;
                        }
                    }
                }
            }

            if self.backoff_or_shutdown(&mut backoff, &config).await {
                return;
            }
        }
    }

    /// Sleep the current backoff (doubling it for next time), or return true
    /// if shutdown arrived first.
    async fn backoff_or_shutdown(
        &mut self,
        backoff: &mut Duration,
        config: &crate::cache::config::CacheConfig,
    ) -> bool {
        let delay = *backoff;
        *backoff = (*backoff * 2).min(config.reconnect_backoff_max);
        tokio::select! {
            _ = self.shutdown_rx.recv() => true,
            _ = tokio::time::sleep(delay) => false,
        }
    }
}

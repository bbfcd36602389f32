// src/broadcaster/heartbeat.rs
// Adapted from `api/ws/chat/heartbeat.rs`: a cancellable heartbeat loop tied
// to a connection's lifetime, so it never fires after the socket closes.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub trait StatusSender: Send + Sync + 'static {
    fn send_status(&self, message: &str);
}

impl<F> StatusSender for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn send_status(&self, message: &str) {
        (self)(message)
    }
}

pub struct HeartbeatManager<S: StatusSender> {
    sender: Arc<S>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<S: StatusSender> HeartbeatManager<S> {
    pub fn new(sender: Arc<S>) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            sender,
            stop_tx,
            stop_rx,
            handle: Mutex::new(None),
        }
    }

    /// Safe to call once; subsequent calls replace the previous task.
    pub fn start(&self, period: Duration) {
        self.stop();

        let mut rx = self.stop_rx.clone();
        let sender = self.sender.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let ts = chrono::Utc::now().timestamp();
                        let msg = format!("{{\"type\":\"heartbeat\",\"timestamp\":{ts}}}");
                        sender.send_status(&msg);
                    }
                    changed = rx.changed() => {
                        if changed.is_ok() && *rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        *self.handle.lock() = Some(handle);
    }

    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.lock().take() {
            tokio::spawn(async move {
                let _ = handle.await;
            });
        }
    }
}

impl<S: StatusSender> Drop for HeartbeatManager<S> {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}

use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::task::JoinHandle;

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Trailing-edge: only the last scheduled action runs, once `window` has
/// passed without another `schedule` call.
#[derive(Clone)]
pub struct Debouncer {
    window: Duration,
    ticket: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            ticket: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn schedule<F>(&self, action: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mine = self.ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let ticket = Arc::clone(&self.ticket);
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if ticket.load(Ordering::SeqCst) == mine {
                action.await;
            }
        })
    }
}

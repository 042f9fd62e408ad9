// src/services/offer_timer.rs
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const DEFAULT_OFFER_TIMEOUT_SECS: u32 = 15;

/// Countdown for a single ride offer.
///
/// Ticks once per second and publishes the remaining seconds. When it reaches
/// zero `on_expire` runs exactly once. The countdown task is aborted when the
/// timer is cancelled or dropped, so every exit path (accept, reject, view torn
/// down) releases it. The expiry path itself calls [`OfferTimer::release`].
pub struct OfferTimer {
    handle: Option<JoinHandle<()>>,
    remaining: watch::Receiver<u32>,
}

impl OfferTimer {
    pub fn start<F, Fut>(seconds: u32, on_expire: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = watch::channel(seconds);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.tick().await;

            let mut remaining = seconds;
            while remaining > 0 {
                interval.tick().await;
                remaining -= 1;
                let _ = tx.send(remaining);
            }
            tracing::debug!("Offer countdown reached zero");
            on_expire().await;
        });

        Self {
            handle: Some(handle),
            remaining: rx,
        }
    }

    pub fn remaining(&self) -> u32 {
        *self.remaining.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.remaining.clone()
    }

    pub fn cancel(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Lets go of the countdown task without aborting it. Only for the expiry
    /// callback, which runs inside that task.
    pub fn release(mut self) {
        self.handle.take();
    }
}

impl Drop for OfferTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_timer(seconds: u32, fired: &Arc<AtomicUsize>) -> OfferTimer {
        let fired = fired.clone();
        OfferTimer::start(seconds, move || async move {
            fired.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_timeout() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = counting_timer(15, &fired);
        assert_eq!(timer.remaining(), 15);

        tokio::time::sleep(Duration::from_millis(14_500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timer.remaining(), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(timer.remaining(), 0);
        timer.release();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_countdown() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = counting_timer(15, &fired);

        tokio::time::sleep(Duration::from_secs(5)).await;
        timer.cancel();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_countdown() {
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let _timer = counting_timer(3, &fired);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_ticks() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = counting_timer(3, &fired);
        let mut rx = timer.subscribe();

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 2);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 1);
        timer.cancel();
    }
}

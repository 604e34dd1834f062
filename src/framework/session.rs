//! Per-connection extension session: owns the attached [`AudioExtension`], a bounded feed
//! channel that drops samples instead of blocking when the extension falls behind, and a poll task
//! that drains encoded frames out to the caller's sink.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::framework::registry::Registry;
use crate::framework::AudioExtension;

const FEED_CHANNEL_CAPACITY: usize = 64;
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Handle to a running session. Dropping this does not stop the session; call [`Session::detach`]
/// explicitly so the extension's `detach` hook runs and the background task is joined.
pub struct Session {
    feed_tx: mpsc::Sender<Vec<i16>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Session {
    /// Attach a new session running `extension_name` at `sample_rate` Hz. `on_frame` is invoked
    /// from the session's background task for every encoded frame the extension produces.
    pub fn attach(
        extension_name: &str,
        sample_rate: u32,
        on_frame: impl Fn(Vec<u8>) + Send + 'static,
    ) -> Result<Self> {
        let mut extension = Registry::global().create(extension_name, sample_rate)?;
        let (feed_tx, mut feed_rx) = mpsc::channel::<Vec<i16>>(FEED_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(DRAIN_POLL_INTERVAL);
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    maybe_samples = feed_rx.recv() => {
                        match maybe_samples {
                            Some(samples) => extension.feed(&samples),
                            None => break,
                        }
                    }
                    _ = ticker.tick() => {
                        match extension.drain() {
                            Ok(frames) => {
                                for frame in frames {
                                    on_frame(frame);
                                }
                            }
                            Err(err) => {
                                warn!(error = %err, "extension task failed");
                                break;
                            }
                        }
                    }
                }
            }
            extension.detach();
            debug!("session task exiting");
        });

        Ok(Self {
            feed_tx,
            cancel,
            task: Some(task),
        })
    }

    /// Forward PCM to the extension. Never blocks: if the feed channel is full (the extension's
    /// background task has fallen behind), the samples are dropped rather than backing up the
    /// caller's read loop.
    pub fn feed(&self, samples: Vec<i16>) {
        if self.feed_tx.try_send(samples).is_err() {
            warn!("dropping PCM: session feed channel is full");
        }
    }

    /// Signal the session to stop and wait for its background task to finish, running the
    /// extension's `detach` hook exactly once.
    pub async fn detach(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Convenience wrapper binding a session to a shared frame sink, used by the demo WS host so each
/// connection's write half can be cloned into the session's frame callback.
pub fn attach_with_sink(
    extension_name: &str,
    sample_rate: u32,
    sink: Arc<dyn Fn(Vec<u8>) + Send + Sync>,
) -> Result<Session> {
    Session::attach(extension_name, sample_rate, move |frame| sink(frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn attach_with_unknown_extension_errors() {
        let result = Session::attach("not-a-real-extension", 8000, |_| {});
        assert!(matches!(result, Err(Error::UnknownExtension(_))));
    }

    #[tokio::test]
    async fn feed_then_detach_does_not_panic() {
        let frame_count = Arc::new(AtomicUsize::new(0));
        let counter = frame_count.clone();
        let session = Session::attach("sstv", 8000, move |_frame| {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

        session.feed(vec![0i16; 800]);
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.detach().await;
    }
}

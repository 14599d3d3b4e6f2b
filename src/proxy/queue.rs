// ABOUTME: Single-flight queue for proxy regeneration passes.
// ABOUTME: At most one pass runs; requests arriving meanwhile share the next pass.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::error::ProxyError;

type PassResult = Result<(), ProxyError>;
type Pass<T> = Box<dyn Fn(T) -> BoxFuture<'static, PassResult> + Send + Sync>;

struct QueueState<T> {
    pending: Vec<(T, oneshot::Sender<PassResult>)>,
    running: bool,
}

struct Inner<T> {
    state: Mutex<QueueState<T>>,
    pass: Pass<T>,
}

/// Serializes regeneration passes.
///
/// Each pass renders the most recently queued snapshot and settles every
/// request that was pending when it started. Requests queued while a pass
/// runs wait for one follow-up pass.
pub struct ReloadQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ReloadQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> ReloadQueue<T> {
    pub fn new<F, Fut>(pass: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PassResult> + Send + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState {
                    pending: Vec::new(),
                    running: false,
                }),
                pass: Box::new(move |snapshot| Box::pin(pass(snapshot))),
            }),
        }
    }

    /// Queue `snapshot` and wait for the pass that covers it.
    pub async fn request(&self, snapshot: T) -> PassResult {
        let (tx, rx) = oneshot::channel();
        self.inner.state.lock().pending.push((snapshot, tx));
        Inner::kick(&self.inner);
        rx.await.unwrap_or(Err(ProxyError::Abandoned))
    }

    /// Whether a pass is running right now.
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }
}

impl<T: Send + 'static> Inner<T> {
    fn kick(inner: &Arc<Self>) {
        let (snapshot, waiters) = {
            let mut state = inner.state.lock();
            if state.running {
                return;
            }
            let Some((snapshot, latest)) = state.pending.pop() else {
                return;
            };
            let mut waiters: Vec<_> = state.pending.drain(..).map(|(_, tx)| tx).collect();
            waiters.push(latest);
            state.running = true;
            (snapshot, waiters)
        };

        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            // The pass runs in its own task so a panic still settles the waiters
            // and releases the queue.
            let pass = {
                let inner = Arc::clone(&inner);
                tokio::spawn(async move { (inner.pass)(snapshot).await })
            };
            let result = match pass.await {
                Ok(result) => result,
                Err(e) => Err(ProxyError::Panicked(e.to_string())),
            };
            match &result {
                Ok(()) => tracing::debug!("reload pass finished for {} request(s)", waiters.len()),
                Err(e) => tracing::error!("reload pass failed: {}", e),
            }
            inner.state.lock().running = false;
            for waiter in waiters {
                // The requester may have stopped waiting.
                let _ = waiter.send(result.clone());
            }
            Inner::kick(&inner);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn single_request_runs_one_pass() {
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&passes);
        let queue = ReloadQueue::new(move |_: u32| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        queue.request(1).await.unwrap();
        assert_eq!(passes.load(Ordering::SeqCst), 1);
        assert!(!queue.is_running());
    }

    #[tokio::test]
    async fn waiting_requests_render_latest_snapshot() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let queue = ReloadQueue::new(move |snapshot: u32| {
            let record = Arc::clone(&record);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                record.lock().push(snapshot);
                Ok(())
            }
        });

        let first = tokio::spawn({
            let queue = queue.clone();
            async move { queue.request(1).await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        let (second, third) = tokio::join!(queue.request(2), queue.request(3));

        first.await.unwrap().unwrap();
        second.unwrap();
        third.unwrap();
        // The follow-up pass renders only the newest queued snapshot.
        assert_eq!(*seen.lock(), vec![1, 3]);
    }

    #[tokio::test]
    async fn failure_rejects_waiters_and_unlocks() {
        let fail = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let flag = Arc::clone(&fail);
        let queue = ReloadQueue::new(move |_: ()| {
            let fail = flag.load(Ordering::SeqCst);
            async move {
                if fail {
                    Err(ProxyError::Reload("exit 1".into()))
                } else {
                    Ok(())
                }
            }
        });

        assert_eq!(
            queue.request(()).await,
            Err(ProxyError::Reload("exit 1".into()))
        );
        fail.store(false, Ordering::SeqCst);
        assert_eq!(queue.request(()).await, Ok(()));
    }

    #[tokio::test]
    async fn panicking_pass_fails_waiters_and_unlocks() {
        let queue = ReloadQueue::new(move |explode: bool| async move {
            if explode {
                panic!("template engine blew up");
            }
            Ok(())
        });

        let err = queue.request(true).await.unwrap_err();
        assert!(matches!(err, ProxyError::Panicked(_)));
        assert!(!queue.is_running());

        tokio::time::timeout(Duration::from_secs(1), queue.request(false))
            .await
            .expect("queue stayed locked after a panic")
            .unwrap();
    }
}

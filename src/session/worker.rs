use std::sync::mpsc;
use std::time::Duration;

#[derive(Debug, PartialEq, Eq)]
pub enum JobWait<T> {
    Done(T),
    TimedOut,
    /// The worker exited without sending, e.g. it panicked.
    Lost,
}

/// Receiving end of a single background job.
#[derive(Debug)]
pub struct JobHandle<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> JobHandle<T> {
    pub fn wait(self) -> JobWait<T> {
        match self.rx.recv() {
            Ok(result) => JobWait::Done(result),
            Err(mpsc::RecvError) => JobWait::Lost,
        }
    }

    pub fn wait_timeout(self, timeout: Duration) -> JobWait<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => JobWait::Done(result),
            Err(mpsc::RecvTimeoutError::Timeout) => JobWait::TimedOut,
            Err(mpsc::RecvTimeoutError::Disconnected) => JobWait::Lost,
        }
    }
}

pub(crate) fn spawn_worker<T, W>(name: &str, work: W) -> JobHandle<T>
where
    T: Send + 'static,
    W: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<T>();
    let spawned = std::thread::Builder::new()
        .name(format!("backdrop-{name}"))
        .spawn(move || {
            let result = work();
            let _ = tx.send(result);
        });
    if let Err(err) = spawned {
        tracing::error!(?err, job = name, "failed to spawn worker thread");
    }
    JobHandle { rx }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_returns_worker_result() {
        let handle = spawn_worker("sum", || 2 + 3);
        assert_eq!(handle.wait(), JobWait::Done(5));
    }

    #[test]
    fn wait_timeout_reports_slow_workers() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let handle = spawn_worker("slow", move || {
            let _ = release_rx.recv();
            1
        });
        assert_eq!(
            handle.wait_timeout(Duration::from_millis(20)),
            JobWait::TimedOut
        );
        drop(release_tx);
    }

    #[test]
    fn panicking_worker_is_reported_as_lost() {
        let handle = spawn_worker("panic", || -> u8 { panic!("worker failure") });
        assert_eq!(handle.wait(), JobWait::Lost);
    }
}

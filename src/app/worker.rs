use std::sync::mpsc;
use std::time::Duration;

use thiserror::Error;

pub(super) const WORKER_RESULT_POLL_INTERVAL: Duration = Duration::from_millis(24);

#[derive(Debug, Error)]
pub(super) enum WorkerFailure {
    #[error("failed to start worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("worker thread exited without a result")]
    Exited,
}

/// Runs `work` on a named thread and hands its result to `on_result` on the
/// GTK main loop. `on_failed` runs instead, once, if the thread cannot start
/// or ends without sending a result.
pub(super) fn spawn_worker_action<T, W, H, F>(name: &str, work: W, mut on_result: H, on_failed: F)
where
    T: Send + 'static,
    W: FnOnce() -> T + Send + 'static,
    H: FnMut(T) + 'static,
    F: FnOnce(WorkerFailure) + 'static,
{
    let (tx, rx) = mpsc::channel::<T>();
    let spawned = std::thread::Builder::new()
        .name(format!("uilabel-{name}"))
        .spawn(move || {
            let result = work();
            let _ = tx.send(result);
        });
    if let Err(err) = spawned {
        tracing::error!(worker = name, error = %err, "failed to spawn worker thread");
        on_failed(WorkerFailure::Spawn(err));
        return;
    }

    let name = name.to_string();
    let mut on_failed = Some(on_failed);
    gtk4::glib::timeout_add_local(WORKER_RESULT_POLL_INTERVAL, move || match rx.try_recv() {
        Ok(result) => {
            on_result(result);
            gtk4::glib::ControlFlow::Break
        }
        Err(mpsc::TryRecvError::Empty) => gtk4::glib::ControlFlow::Continue,
        Err(mpsc::TryRecvError::Disconnected) => {
            tracing::warn!(worker = %name, "worker thread exited without a result");
            if let Some(on_failed) = on_failed.take() {
                on_failed(WorkerFailure::Exited);
            }
            gtk4::glib::ControlFlow::Break
        }
    });
}

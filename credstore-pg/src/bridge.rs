//! Synchronous-to-asynchronous execution bridge.
//!
//! One background thread pumps a current-thread tokio runtime for the
//! process lifetime. `run_sync` submits a future onto that loop and
//! blocks the calling thread, and only the calling thread, until the
//! result arrives. Many callers can have operations in flight at once:
//! each submission is spawned as its own task on the worker, so the
//! futures interleave cooperatively there, bounded by the pool for
//! actual connections.

use std::future::Future;
use std::sync::mpsc;
use std::sync::{Mutex, PoisonError};
use std::thread;

use futures::future::BoxFuture;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use crate::error::StoreError;

type Job = BoxFuture<'static, ()>;

struct Worker {
    jobs: UnboundedSender<Job>,
    handle: thread::JoinHandle<()>,
}

impl Worker {
    fn is_live(&self) -> bool {
        !self.handle.is_finished() && !self.jobs.is_closed()
    }
}

static WORKER: Mutex<Option<Worker>> = Mutex::new(None);

#[cfg(test)]
static SPAWN_COUNT: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

fn spawn_worker() -> Result<Worker, StoreError> {
    #[cfg(test)]
    SPAWN_COUNT.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

    let (jobs, mut queue) = unbounded_channel::<Job>();
    let handle = thread::Builder::new()
        .name("credstore-db-loop".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    tracing::error!(error = %err, "bridge runtime failed to start");
                    return;
                }
            };
            runtime.block_on(async move {
                while let Some(job) = queue.recv().await {
                    tokio::spawn(job);
                }
            });
        })
        .map_err(|err| StoreError::bridge(format!("worker thread failed to start: {err}")))?;

    tracing::debug!("bridge worker started");
    Ok(Worker { jobs, handle })
}

/// Hand a job to the live worker, starting or replacing the worker as
/// needed. The lock is held only while checking liveness and sending,
/// never while a job runs.
fn submit(job: Job) -> Result<(), StoreError> {
    let mut guard = WORKER.lock().unwrap_or_else(PoisonError::into_inner);
    if !guard.as_ref().is_some_and(Worker::is_live) {
        *guard = Some(spawn_worker()?);
    }
    let mut job = job;
    if let Some(worker) = guard.as_ref() {
        match worker.jobs.send(job) {
            Ok(()) => return Ok(()),
            Err(tokio::sync::mpsc::error::SendError(rejected)) => job = rejected,
        }
    }
    // The worker exited between the liveness check and the send.
    let worker = spawn_worker()?;
    worker
        .jobs
        .send(job)
        .map_err(|_| StoreError::bridge("worker exited before accepting the job"))?;
    *guard = Some(worker);
    Ok(())
}

/// Run an asynchronous storage operation to completion from synchronous
/// code.
///
/// Safe to call from any context, including threads that must not own a
/// runtime themselves. Each call pairs its job with its own completion
/// channel, so concurrent callers never serialize against each other
/// here. Once submitted, an operation runs to completion or failure;
/// there is no cancellation.
pub fn run_sync<T, F>(operation: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, StoreError>> + Send + 'static,
{
    let (done, outcome) = mpsc::channel();
    submit(Box::pin(async move {
        let _ = done.send(operation.await);
    }))?;
    match outcome.recv() {
        Ok(result) => result,
        Err(_) => Err(StoreError::bridge(
            "worker dropped the operation before completion",
        )),
    }
}

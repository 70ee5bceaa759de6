//! Bounded worker pool used for request dispatch and shard persistence

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// A unit of work run by a queue worker.
#[async_trait]
pub trait Job: Send + 'static {
    async fn run(self: Box<Self>);
}

type BoxedJob = Box<dyn Job>;

/// Fixed pool of workers draining a FIFO channel.
///
/// `submit` never blocks. With one worker, jobs run strictly in submission
/// order; with more, they run concurrently and may finish in any order.
#[derive(Debug)]
pub struct WorkQueue {
    name: String,
    sender: Mutex<Option<mpsc::UnboundedSender<BoxedJob>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkQueue {
    /// Spawn `workers` tasks on the current tokio runtime
    pub fn new(name: impl Into<String>, workers: usize) -> Self {
        let name = name.into();
        let workers = workers.max(1);
        let (sender, receiver) = mpsc::unbounded_channel::<BoxedJob>();
        let receiver = Arc::new(AsyncMutex::new(receiver));

        let handles = (0..workers)
            .map(|index| {
                let receiver = Arc::clone(&receiver);
                let queue_name = name.clone();
                tokio::spawn(async move {
                    worker_loop(queue_name, index, receiver).await;
                })
            })
            .collect();

        debug!("Started work queue '{}' with {} workers", name, workers);

        Self {
            name,
            sender: Mutex::new(Some(sender)),
            handles: Mutex::new(handles),
        }
    }

    /// Queue a job. A shut-down queue hands the job back untouched.
    pub fn submit<J: Job>(&self, job: J) -> Result<(), J> {
        let guard = self.sender.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(sender) = guard.as_ref() else {
            return Err(job);
        };

        if sender.send(Box::new(job)).is_err() {
            error!("Work queue '{}' lost its workers, job dropped", self.name);
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }

    /// Stop accepting jobs, run everything already queued, then join the workers
    pub async fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        drop(sender);

        let handles: Vec<JoinHandle<()>> = self
            .handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Work queue '{}' worker failed to join: {}", self.name, e);
            }
        }

        debug!("Work queue '{}' drained", self.name);
    }
}

async fn worker_loop(
    name: String,
    index: usize,
    receiver: Arc<AsyncMutex<mpsc::UnboundedReceiver<BoxedJob>>>,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(job) = next else {
            break;
        };

        if AssertUnwindSafe(job.run()).catch_unwind().await.is_err() {
            error!("Job panicked on work queue '{}' worker {}", name, index);
        }
    }

    debug!("Work queue '{}' worker {} stopped", name, index);
}

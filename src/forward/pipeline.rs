//! Bounded delivery queue and the worker pool draining it.
//!
//! The consumer loop hands records to [`Pipeline::handle`], which blocks
//! while the queue is full. [`Pipeline::stop`] closes the queue and waits
//! for every worker to drain what is left and exit.
//!
//! Shutdown order matters: stop the consumer first, then call `stop`. A
//! record offered after `stop` is refused with [`Error::PipelineClosed`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ForwardConfig;
use crate::forward::{CredentialMap, DeliveryWorker, Forwarder};
use crate::kafka::Record;
use crate::{Error, Result};

pub struct Pipeline {
    sender: RwLock<Option<mpsc::Sender<Record>>>,
    workers: Mutex<Vec<JoinHandle<u64>>>,
    active_workers: Arc<AtomicUsize>,
    capacity: usize,
}

impl Pipeline {
    /// Allocates the queue and spawns `concurrency` workers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(forwarder: Arc<Forwarder>, concurrency: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let queue = Arc::new(Mutex::new(receiver));
        let active_workers = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(concurrency);
        for worker_id in 0..concurrency {
            let worker = DeliveryWorker::new(worker_id, queue.clone(), forwarder.clone());
            let active = active_workers.clone();
            active.fetch_add(1, Ordering::SeqCst);
            workers.push(tokio::spawn(async move {
                let processed = worker.run().await;
                active.fetch_sub(1, Ordering::SeqCst);
                processed
            }));
        }

        info!(
            sink_url = %forwarder.sink_url(),
            workers = concurrency,
            capacity,
            "Pipeline started"
        );

        Self {
            sender: RwLock::new(Some(sender)),
            workers: Mutex::new(workers),
            active_workers,
            capacity,
        }
    }

    pub fn from_config(config: &ForwardConfig, credentials: CredentialMap) -> Result<Self> {
        let forwarder = Arc::new(Forwarder::from_config(config, credentials)?);
        Ok(Self::start(forwarder, config.concurrency, config.queue_capacity))
    }

    /// Enqueues a record, waiting for a free slot if the queue is full.
    pub async fn handle(&self, record: Record) -> Result<()> {
        let sender = self
            .sender
            .read()
            .await
            .clone()
            .ok_or(Error::PipelineClosed)?;

        sender.send(record).await.map_err(|_| Error::PipelineClosed)
    }

    /// Closes the queue and waits until every worker has drained it and exited.
    ///
    /// There is no timeout: a worker in the middle of a retry finishes its
    /// current attempt or backoff first. Calling `stop` again is a no-op.
    pub async fn stop(&self) {
        let sender = self.sender.write().await.take();
        if sender.is_none() {
            warn!("Pipeline already stopped");
        }
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock().await);
        let mut processed: u64 = 0;
        for (worker_id, result) in join_all(workers).await.into_iter().enumerate() {
            match result {
                Ok(count) => processed += count,
                Err(e) => error!(worker_id, error = %e, "Delivery worker panicked"),
            }
        }

        info!(processed, "Pipeline stopped");
    }

    pub fn is_closed(&self) -> bool {
        self.sender.try_read().map(|s| s.is_none()).unwrap_or(false)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of records waiting in the queue.
    pub fn queued(&self) -> usize {
        match self.sender.try_read() {
            Ok(guard) => guard
                .as_ref()
                .map(|s| s.max_capacity() - s.capacity())
                .unwrap_or(0),
            Err(_) => 0,
        }
    }

    /// Number of workers that have not exited yet.
    pub fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::SeqCst)
    }
}

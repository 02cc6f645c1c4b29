use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::forward::Forwarder;
use crate::kafka::Record;

/// Receiving end of the delivery queue, shared by all workers.
pub type SharedQueue = Arc<Mutex<mpsc::Receiver<Record>>>;

/// One member of the delivery pool.
///
/// Takes records off the shared queue until the queue is closed and empty.
pub struct DeliveryWorker {
    id: usize,
    queue: SharedQueue,
    forwarder: Arc<Forwarder>,
}

impl DeliveryWorker {
    pub fn new(id: usize, queue: SharedQueue, forwarder: Arc<Forwarder>) -> Self {
        Self {
            id,
            queue,
            forwarder,
        }
    }

    pub async fn run(self) -> u64 {
        debug!(worker_id = self.id, "Delivery worker starting");
        let mut processed: u64 = 0;

        loop {
            // The lock is held only while waiting, never during delivery.
            let next = self.queue.lock().await.recv().await;
            let Some(record) = next else {
                break;
            };

            let outcome = self.forwarder.forward(&record).await;
            debug!(worker_id = self.id, ?outcome, "Record processed");
            processed += 1;
        }

        info!(worker_id = self.id, processed, "Delivery worker stopped");
        processed
    }
}

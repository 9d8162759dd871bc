/*!
 * Fallback Finalizer
 *
 * Background thread that frees raw regions whose owners dropped them
 * without releasing. Runs out-of-band with respect to the driving thread
 * and only ever sees a region after its owner gave it up.
 */

use super::raw::{FreeReason, HeapCounters, RawRegion};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, trace, warn};

enum FinalizerMessage {
    Finalize(Arc<RawRegion>),
    /// Acknowledged once everything queued before it has been processed
    Drain(flume::Sender<()>),
}

/// Handle to the finalizer queue
///
/// The thread exits once every handle (heap and buffers) is gone.
#[derive(Clone)]
pub(crate) struct Finalizer {
    queue: flume::Sender<FinalizerMessage>,
    counters: Arc<HeapCounters>,
}

impl Finalizer {
    pub(crate) fn spawn(counters: Arc<HeapCounters>) -> Self {
        let (queue, inbox) = flume::unbounded();
        let thread_counters = Arc::clone(&counters);

        let spawned = std::thread::Builder::new()
            .name("external-finalizer".to_string())
            .spawn(move || run(inbox, thread_counters));

        if let Err(e) = spawned {
            // Queue has no receiver now; enqueue falls back to inline frees
            warn!(error = %e, "Could not start finalizer thread, finalizing inline");
        }

        Self { queue, counters }
    }

    /// Queue an abandoned region for reclamation
    pub(crate) fn enqueue(&self, region: Arc<RawRegion>) {
        self.counters
            .pending_finalization
            .fetch_add(1, Ordering::SeqCst);

        if let Err(flume::SendError(message)) = self.queue.send(FinalizerMessage::Finalize(region))
        {
            if let FinalizerMessage::Finalize(region) = message {
                region.free(FreeReason::Finalized);
            }
            self.counters
                .pending_finalization
                .fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Wait until every region queued before this call is finalized
    pub(crate) fn drain(&self) {
        let (ack, done) = flume::bounded(1);
        if self.queue.send(FinalizerMessage::Drain(ack)).is_ok() {
            let _ = done.recv();
        }
    }
}

fn run(inbox: flume::Receiver<FinalizerMessage>, counters: Arc<HeapCounters>) {
    debug!("Finalizer thread started");

    for message in inbox.iter() {
        match message {
            FinalizerMessage::Finalize(region) => {
                let address = region.address();
                if region.free(FreeReason::Finalized) {
                    trace!(
                        address = format_args!("0x{:x}", address),
                        "Finalizer reclaimed abandoned region"
                    );
                }
                counters.pending_finalization.fetch_sub(1, Ordering::SeqCst);
            }
            FinalizerMessage::Drain(ack) => {
                let _ = ack.send(());
            }
        }
    }

    debug!("Finalizer thread stopped");
}

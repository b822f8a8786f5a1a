//! Background baking with latest-request-wins cancellation.
//!
//! Every submission bumps a shared generation counter. A running bake holds a
//! [`BakeTicket`] for the generation it started under and gives up at the next
//! check once a newer generation exists, so a stale result is never delivered.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use pano_capture::PhotoPoint;
use pano_config::BakeOptions;

use crate::bake::{Compositor, bake_with};
use crate::error::BakeError;
use crate::panorama::Panorama;

/// Proof of which bake generation a piece of work belongs to.
#[derive(Debug, Clone)]
pub struct BakeTicket {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl BakeTicket {
    /// A ticket nothing can supersede.
    pub fn detached() -> Self {
        Self {
            generation: 0,
            current: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.generation
    }

    /// `Err(Cancelled)` once a newer bake has been requested.
    pub fn check(&self) -> Result<(), BakeError> {
        if self.is_current() {
            Ok(())
        } else {
            Err(BakeError::Cancelled)
        }
    }
}

/// Issues tickets; issuing one invalidates all earlier ones.
#[derive(Debug, Clone, Default)]
pub struct BakeScheduler {
    current: Arc<AtomicU64>,
}

impl BakeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> BakeTicket {
        let generation = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        BakeTicket {
            generation,
            current: Arc::clone(&self.current),
        }
    }

    /// Invalidate outstanding tickets without starting new work.
    pub fn cancel_all(&self) {
        self.current.fetch_add(1, Ordering::AcqRel);
    }

    pub fn current_generation(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }
}

struct BakeRequest {
    photos: Vec<PhotoPoint>,
    options: BakeOptions,
    ticket: BakeTicket,
}

/// Outcome of one submitted bake.
#[derive(Debug)]
pub struct BakeResult {
    pub generation: u64,
    pub result: Result<Panorama, BakeError>,
    pub elapsed: Duration,
}

/// A dedicated thread that owns a [`Compositor`] and bakes on request.
pub struct BakeWorker {
    scheduler: BakeScheduler,
    request_sender: Option<Sender<BakeRequest>>,
    result_receiver: Receiver<BakeResult>,
    handle: Option<JoinHandle<()>>,
}

impl BakeWorker {
    /// Spawn the worker thread. The compositor is moved onto it.
    pub fn spawn<C>(compositor: C) -> std::io::Result<Self>
    where
        C: Compositor + Send + 'static,
    {
        let scheduler = BakeScheduler::new();
        let (request_sender, request_receiver) = unbounded::<BakeRequest>();
        let (result_sender, result_receiver) = bounded::<BakeResult>(4);

        let handle = std::thread::Builder::new()
            .name("pano-bake".into())
            .spawn(move || {
                let mut compositor = compositor;
                while let Ok(request) = request_receiver.recv() {
                    // Skip straight to the newest queued request.
                    if !request.ticket.is_current() {
                        tracing::debug!(
                            generation = request.ticket.generation(),
                            "Skipping superseded bake"
                        );
                        continue;
                    }
                    let start = Instant::now();
                    let result = bake_with(
                        &mut compositor,
                        &request.photos,
                        &request.options,
                        &request.ticket,
                    );
                    if matches!(result, Err(BakeError::Cancelled)) || !request.ticket.is_current() {
                        tracing::debug!(
                            generation = request.ticket.generation(),
                            "Discarding superseded bake"
                        );
                        continue;
                    }
                    let outcome = BakeResult {
                        generation: request.ticket.generation(),
                        result,
                        elapsed: start.elapsed(),
                    };
                    if result_sender.send(outcome).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            scheduler,
            request_sender: Some(request_sender),
            result_receiver,
            handle: Some(handle),
        })
    }

    /// Queue a bake, superseding any bake still pending or running.
    ///
    /// Returns the generation the result will carry.
    pub fn submit(&self, photos: Vec<PhotoPoint>, options: BakeOptions) -> u64 {
        let ticket = self.scheduler.issue();
        let generation = ticket.generation();
        if let Some(sender) = &self.request_sender {
            if sender
                .send(BakeRequest {
                    photos,
                    options,
                    ticket,
                })
                .is_err()
            {
                tracing::error!(generation, "Bake worker has shut down");
            }
        }
        generation
    }

    /// Drop whatever is pending or running.
    pub fn cancel(&self) {
        self.scheduler.cancel_all();
    }

    /// Completed bakes that are still current. Never blocks.
    pub fn drain_results(&self) -> Vec<BakeResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.result_receiver.try_recv() {
            if result.generation == self.scheduler.current_generation() {
                results.push(result);
            }
        }
        results
    }

    /// Wait up to `timeout` for the result of the current generation.
    pub fn wait(&self, timeout: Duration) -> Option<BakeResult> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.result_receiver.recv_timeout(remaining) {
                Ok(result) if result.generation == self.scheduler.current_generation() => {
                    return Some(result);
                }
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None;
                }
            }
        }
    }
}

impl Drop for BakeWorker {
    fn drop(&mut self) {
        self.scheduler.cancel_all();
        self.request_sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

//! Correlated request/response bridge to the frame encoder.
//!
//! Callers hand a raw RGBA buffer to [`ExportBridge::convert`]. The request is
//! tagged with a unique id, queued to the [`EncoderWorker`], and answered by an
//! event carrying the same id. A dispatcher task routes events back to the
//! waiting caller through a pending map; each entry is removed exactly once,
//! either by its response or by its timeout.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pano_config::ExportConfig;
use tokio::sync::{mpsc, oneshot, watch};

use crate::encode::{FrameEncoder, PngEncoder};
use crate::error::ExportError;
use crate::transform::{ExportOptions, apply_transform};

/// Queued requests before `convert` starts waiting for the worker.
const REQUEST_QUEUE: usize = 16;

/// One frame to transform and encode.
#[derive(Debug)]
pub struct EncodeRequest {
    pub request_id: u64,
    pub buffer: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub options: ExportOptions,
}

/// Messages from the worker back to the bridge.
///
/// Both ends live in this process, so [`BridgeEvent::PngReady`] carries the
/// encoded PNG as raw bytes rather than the base64 text an out-of-process
/// encoder would send.
#[derive(Debug)]
pub enum BridgeEvent {
    /// Liveness handshake; sent once before any request is processed.
    Ready,
    Log {
        request_id: u64,
        step: &'static str,
        detail: String,
    },
    PngReady {
        request_id: u64,
        /// Complete PNG file contents, not base64.
        data: Vec<u8>,
    },
    Error {
        request_id: u64,
        message: String,
    },
}

/// Where an exported panorama was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub path: PathBuf,
    pub bytes: usize,
}

type Reply = oneshot::Sender<Result<Vec<u8>, ExportError>>;

/// Wait for a reply whose sender the dispatcher already took out of the
/// pending map. It either sends or drops the sender, so this cannot hang.
async fn claimed_reply(
    reply_rx: oneshot::Receiver<Result<Vec<u8>, ExportError>>,
) -> Result<Vec<u8>, ExportError> {
    reply_rx.await.unwrap_or(Err(ExportError::BridgeClosed))
}

#[derive(Default)]
struct PendingRequests {
    entries: Mutex<HashMap<u64, Reply>>,
}

impl PendingRequests {
    fn insert(&self, request_id: u64, reply: Reply) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(request_id, reply);
        }
    }

    /// Remove an entry. Only the first caller for an id gets `Some`.
    fn take(&self, request_id: u64) -> Option<Reply> {
        self.entries.lock().ok()?.remove(&request_id)
    }

    fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Drop every reply sender, waking their callers with `BridgeClosed`.
    fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

/// Caller side of the bridge. Cheap to share behind an `Arc`.
pub struct ExportBridge {
    requests: mpsc::Sender<EncodeRequest>,
    ready: watch::Receiver<bool>,
    pending: Arc<PendingRequests>,
    next_id: AtomicU64,
    ready_timeout: Duration,
    request_timeout: Duration,
    output_dir: PathBuf,
    file_name: String,
    options: ExportOptions,
}

/// Encoder side of the bridge. Run it with [`EncoderWorker::run`].
pub struct EncoderWorker {
    requests: mpsc::Receiver<EncodeRequest>,
    events: mpsc::UnboundedSender<BridgeEvent>,
}

/// Create a bridge and its unstarted worker, and spawn the event dispatcher.
///
/// Must be called from within a tokio runtime.
pub fn bridge_channel(config: &ExportConfig) -> (ExportBridge, EncoderWorker) {
    let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (ready_tx, ready_rx) = watch::channel(false);
    let pending = Arc::new(PendingRequests::default());

    tokio::spawn(dispatch_events(event_rx, ready_tx, Arc::clone(&pending)));

    let bridge = ExportBridge {
        requests: request_tx,
        ready: ready_rx,
        pending,
        next_id: AtomicU64::new(1),
        ready_timeout: Duration::from_millis(config.ready_timeout_ms),
        request_timeout: Duration::from_millis(config.request_timeout_ms),
        output_dir: config.output_dir.clone(),
        file_name: config.file_name.clone(),
        options: ExportOptions::from(config),
    };
    let worker = EncoderWorker {
        requests: request_rx,
        events: event_tx,
    };
    (bridge, worker)
}

impl ExportBridge {
    /// Bridge backed by a PNG encoder task.
    pub fn spawn(config: &ExportConfig) -> Self {
        Self::spawn_with(config, PngEncoder::default())
    }

    pub fn spawn_with<E: FrameEncoder>(config: &ExportConfig, encoder: E) -> Self {
        let (bridge, worker) = bridge_channel(config);
        tokio::spawn(worker.run(encoder));
        bridge
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Wait for the worker's ready handshake.
    pub async fn await_ready(&self) -> Result<(), ExportError> {
        let mut ready = self.ready.clone();
        match tokio::time::timeout(self.ready_timeout, ready.wait_for(|r| *r)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(ExportError::BridgeClosed),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.ready_timeout.as_millis() as u64,
                    "Export encoder never reported ready"
                );
                Err(ExportError::NotReady {
                    timeout_ms: self.ready_timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Transform and encode one frame, returning the encoded bytes.
    pub async fn convert(
        &self,
        buffer: Vec<u8>,
        width: u32,
        height: u32,
        options: ExportOptions,
    ) -> Result<Vec<u8>, ExportError> {
        if width == 0 || height == 0 {
            return Err(ExportError::InvalidFrame { width, height });
        }
        self.await_ready().await?;

        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, mut reply_rx) = oneshot::channel();
        self.pending.insert(request_id, reply_tx);
        tracing::debug!(
            request_id,
            width,
            height,
            bytes = buffer.len(),
            "Queueing export request"
        );

        let request = EncodeRequest {
            request_id,
            buffer,
            width,
            height,
            options,
        };
        if self.requests.send(request).await.is_err() {
            self.pending.take(request_id);
            return Err(ExportError::BridgeClosed);
        }

        match tokio::time::timeout(self.request_timeout, &mut reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ExportError::BridgeClosed),
            Err(_) => {
                if self.pending.take(request_id).is_some() {
                    tracing::warn!(request_id, "Export request timed out");
                    return Err(ExportError::RequestTimeout {
                        request_id,
                        timeout_ms: self.request_timeout.as_millis() as u64,
                    });
                }
                // The dispatcher claimed the reply as the deadline fired.
                claimed_reply(reply_rx).await
            }
        }
    }

    /// Encode with the configured orientation fixes and write the file.
    pub async fn export(
        &self,
        rgba: Vec<u8>,
        width: u32,
        height: u32,
    ) -> Result<FileRef, ExportError> {
        let data = self.convert(rgba, width, height, self.options).await?;
        let path = self.output_dir.join(&self.file_name);
        let io_error = |source| ExportError::Io {
            path: path.display().to_string(),
            source,
        };
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(io_error)?;
        tokio::fs::write(&path, &data).await.map_err(io_error)?;
        tracing::info!(path = %path.display(), bytes = data.len(), "Panorama exported");
        Ok(FileRef {
            path,
            bytes: data.len(),
        })
    }
}

impl EncoderWorker {
    /// Announce readiness, then process requests until the bridge is dropped.
    /// Each request is encoded on the blocking pool, so requests overlap.
    pub async fn run<E: FrameEncoder>(mut self, encoder: E) {
        let encoder = Arc::new(encoder);
        if self.events.send(BridgeEvent::Ready).is_err() {
            return;
        }
        while let Some(request) = self.requests.recv().await {
            let encoder = Arc::clone(&encoder);
            let events = self.events.clone();
            tokio::task::spawn_blocking(move || {
                process_request(encoder.as_ref(), request, &events);
            });
        }
        tracing::debug!("Export encoder stopped");
    }
}

fn process_request<E: FrameEncoder + ?Sized>(
    encoder: &E,
    request: EncodeRequest,
    events: &mpsc::UnboundedSender<BridgeEvent>,
) {
    let EncodeRequest {
        request_id,
        mut buffer,
        width,
        height,
        options,
    } = request;
    let log = |step, detail: String| {
        let _ = events.send(BridgeEvent::Log {
            request_id,
            step,
            detail,
        });
    };

    log("received", format!("{width}x{height}, {} bytes", buffer.len()));
    let report = apply_transform(&mut buffer, width, height, &options);
    if let Some((expected, actual)) = report.length_mismatch {
        log(
            "buffer_length_mismatch",
            format!("expected {expected}, got {actual}"),
        );
    }
    if report.flipped {
        log(
            "flip_applied",
            format!("x={} y={}", options.flip_horizontal, options.flip_vertical),
        );
    }
    if report.shift_px > 0 {
        log("yaw_shift_applied", format!("{} px", report.shift_px));
    }

    let event = match encoder.encode(&buffer, width, height) {
        Ok(data) => BridgeEvent::PngReady { request_id, data },
        Err(message) => BridgeEvent::Error {
            request_id,
            message,
        },
    };
    let _ = events.send(event);
}

async fn dispatch_events(
    mut events: mpsc::UnboundedReceiver<BridgeEvent>,
    ready: watch::Sender<bool>,
    pending: Arc<PendingRequests>,
) {
    while let Some(event) = events.recv().await {
        match event {
            BridgeEvent::Ready => {
                tracing::info!("Export encoder ready");
                ready.send_replace(true);
            }
            BridgeEvent::Log {
                request_id,
                step,
                detail,
            } => {
                if step == "buffer_length_mismatch" {
                    tracing::warn!(request_id, %detail, "Buffer length mismatch, continuing");
                } else {
                    tracing::debug!(request_id, step, %detail, "Encoder");
                }
            }
            BridgeEvent::PngReady { request_id, data } => match pending.take(request_id) {
                Some(reply) => {
                    let _ = reply.send(Ok(data));
                }
                None => tracing::debug!(request_id, "Dropping response for a settled request"),
            },
            BridgeEvent::Error {
                request_id,
                message,
            } => {
                tracing::error!(request_id, %message, "Encode failed");
                if let Some(reply) = pending.take(request_id) {
                    let _ = reply.send(Err(ExportError::Encode {
                        request_id,
                        message,
                    }));
                }
            }
        }
    }
    pending.clear();
}

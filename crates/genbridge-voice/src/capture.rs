//! Microphone capture: device abstraction, fixed-size framing, and the
//! bounded frame queue between the capture callback and the uploader.

use crate::error::VoiceError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// Shape of the frames a capture device must deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    /// Samples per frame.
    pub frame_size: usize,
}

/// Source of microphone access.
#[async_trait]
pub trait Microphone: Send + Sync {
    /// Requests access to the capture device.
    ///
    /// # Errors
    ///
    /// [`VoiceError::PermissionDenied`] if access is declined or no device
    /// exists.
    async fn acquire(&self, format: CaptureFormat) -> Result<Box<dyn CaptureDevice>, VoiceError>;
}

/// An acquired microphone. Capture begins on [`start`](Self::start) and the
/// device is given back on [`release`](Self::release) or drop.
pub trait CaptureDevice: Send {
    /// Begins delivering fixed-size frames into `frames`.
    fn start(&mut self, frames: FrameQueue) -> Result<(), VoiceError>;

    /// Stops capture and gives the device back. Idempotent.
    fn release(&mut self);
}

/// Regroups arbitrarily sized sample batches into frames of exactly
/// `frame_size` samples. A trailing partial frame is held until more samples
/// arrive.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    frame_size: usize,
    pending: Vec<f32>,
}

impl FrameAssembler {
    pub fn new(frame_size: usize) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            frame_size,
            pending: Vec::with_capacity(frame_size),
        }
    }

    /// Appends `samples` and returns every frame completed by them.
    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        let mut frames = Vec::new();
        let mut rest = samples;
        while !rest.is_empty() {
            let take = (self.frame_size - self.pending.len()).min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.pending.len() == self.frame_size {
                frames.push(std::mem::replace(
                    &mut self.pending,
                    Vec::with_capacity(self.frame_size),
                ));
            }
        }
        frames
    }

    /// Samples waiting for a full frame.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[derive(Debug, Default)]
struct QueueState {
    frames: VecDeque<Vec<f32>>,
    closed: bool,
}

#[derive(Debug)]
struct QueueInner {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
}

/// Bounded single-consumer frame queue with drop-oldest overflow.
///
/// The producer never blocks: when the consumer falls behind, the oldest
/// buffered frame is discarded and counted.
#[derive(Debug, Clone)]
pub struct FrameQueue {
    inner: Arc<QueueInner>,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                notify: Notify::new(),
                capacity: capacity.max(1),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueues a frame. Returns `false` if the queue is closed.
    pub fn push(&self, frame: Vec<f32>) -> bool {
        {
            let mut state = self.state();
            if state.closed {
                return false;
            }
            if state.frames.len() >= self.inner.capacity {
                state.frames.pop_front();
                let dropped = self.inner.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!(dropped, "capture queue full, dropped oldest frame");
            }
            state.frames.push_back(frame);
        }
        self.inner.notify.notify_one();
        true
    }

    /// Waits for the next frame. Returns `None` once the queue is closed and
    /// drained.
    pub async fn pop(&self) -> Option<Vec<f32>> {
        loop {
            {
                let mut state = self.state();
                if let Some(frame) = state.frames.pop_front() {
                    return Some(frame);
                }
                if state.closed {
                    return None;
                }
            }
            self.inner.notify.notified().await;
        }
    }

    /// Rejects further frames and wakes the consumer.
    pub fn close(&self) {
        self.state().closed = true;
        self.inner.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.state().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct ActiveCapture {
    assembler: FrameAssembler,
    /// Set once capture starts; samples pushed before then are discarded.
    queue: Option<FrameQueue>,
}

#[derive(Debug)]
struct ChannelShared {
    available: AtomicBool,
    active: Mutex<Option<ActiveCapture>>,
}

impl ChannelShared {
    fn active(&self) -> MutexGuard<'_, Option<ActiveCapture>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A microphone whose samples are pushed in by the owner, e.g. a browser
/// streaming its capture over a WebSocket.
///
/// The owner reports whether a device is available; acquiring while it is
/// not fails with [`VoiceError::PermissionDenied`]. Only one capture may be
/// held at a time.
#[derive(Debug, Clone)]
pub struct ChannelMicrophone {
    shared: Arc<ChannelShared>,
}

impl ChannelMicrophone {
    pub fn new(available: bool) -> Self {
        Self {
            shared: Arc::new(ChannelShared {
                available: AtomicBool::new(available),
                active: Mutex::new(None),
            }),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.shared.available.load(Ordering::SeqCst)
    }

    /// Whether a session currently holds the microphone.
    pub fn is_held(&self) -> bool {
        self.shared.active().is_some()
    }

    /// Feeds captured samples. Returns the number of complete frames queued;
    /// samples arriving while nothing is capturing are discarded.
    pub fn push_samples(&self, samples: &[f32]) -> usize {
        let mut active = self.shared.active();
        let Some(capture) = active.as_mut() else {
            return 0;
        };
        let Some(queue) = capture.queue.clone() else {
            return 0;
        };
        let mut queued = 0;
        for frame in capture.assembler.push(samples) {
            if queue.push(frame) {
                queued += 1;
            }
        }
        queued
    }
}

#[async_trait]
impl Microphone for ChannelMicrophone {
    async fn acquire(&self, format: CaptureFormat) -> Result<Box<dyn CaptureDevice>, VoiceError> {
        if !self.is_available() {
            return Err(VoiceError::PermissionDenied(
                "no capture device reported by client".to_string(),
            ));
        }
        let mut active = self.shared.active();
        if active.is_some() {
            return Err(VoiceError::PermissionDenied(
                "microphone already in use".to_string(),
            ));
        }
        *active = Some(ActiveCapture {
            assembler: FrameAssembler::new(format.frame_size),
            queue: None,
        });
        Ok(Box::new(ChannelCapture {
            shared: Some(self.shared.clone()),
        }))
    }
}

struct ChannelCapture {
    shared: Option<Arc<ChannelShared>>,
}

impl CaptureDevice for ChannelCapture {
    fn start(&mut self, frames: FrameQueue) -> Result<(), VoiceError> {
        let shared = self
            .shared
            .as_ref()
            .ok_or_else(|| VoiceError::PermissionDenied("microphone released".to_string()))?;
        match shared.active().as_mut() {
            Some(capture) => {
                capture.queue = Some(frames);
                Ok(())
            }
            None => Err(VoiceError::PermissionDenied(
                "microphone released".to_string(),
            )),
        }
    }

    fn release(&mut self) {
        if let Some(shared) = self.shared.take() {
            if let Some(capture) = shared.active().take() {
                if let Some(queue) = capture.queue {
                    queue.close();
                }
            }
        }
    }
}

impl Drop for ChannelCapture {
    fn drop(&mut self) {
        self.release();
    }
}

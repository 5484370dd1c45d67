// src/proctor/surface.rs

//! The proctored surface: whatever tells the monitor that the student is
//! looking at the exam in full screen, and lets it ask to get back there.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

/// A discrete change reported by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceSignal {
    /// Tab switch, app switch or minimize.
    Hidden,
    Visible,
    FullscreenExited,
    FullscreenEntered,
}

impl SurfaceSignal {
    /// Whether the signal means the student left the proctored surface.
    pub fn is_departure(&self) -> bool {
        matches!(self, SurfaceSignal::Hidden | SurfaceSignal::FullscreenExited)
    }
}

/// Snapshot of the surface flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceState {
    pub visible: bool,
    pub fullscreen: bool,
}

impl SurfaceState {
    pub fn is_active(&self) -> bool {
        self.visible && self.fullscreen
    }
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("full screen request denied: {0}")]
    Denied(String),
}

/// Capability interface the monitor consumes.
#[async_trait]
pub trait ProctorSurface: Send + Sync {
    /// Current flags.
    fn state(&self) -> SurfaceState;

    /// Visible and in full screen.
    fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Asks to (re-)enter full screen.
    async fn request_activation(&self) -> Result<(), SurfaceError>;

    /// Stream of state changes from now on.
    fn subscribe(&self) -> broadcast::Receiver<SurfaceSignal>;
}

/// In-process surface driven by explicit calls. Backs headless sessions
/// and tests; a browser binding would forward its events the same way.
pub struct VirtualSurface {
    visible: AtomicBool,
    fullscreen: AtomicBool,
    deny_activation: AtomicBool,
    tx: broadcast::Sender<SurfaceSignal>,
}

impl Default for VirtualSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualSurface {
    /// Starts visible but not yet in full screen.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            visible: AtomicBool::new(true),
            fullscreen: AtomicBool::new(false),
            deny_activation: AtomicBool::new(false),
            tx,
        }
    }

    /// Makes subsequent `request_activation` calls fail.
    pub fn deny_activation(&self, deny: bool) {
        self.deny_activation.store(deny, Ordering::SeqCst);
    }

    pub fn hide(&self) {
        self.set(&self.visible, false, SurfaceSignal::Hidden);
    }

    pub fn show(&self) {
        self.set(&self.visible, true, SurfaceSignal::Visible);
    }

    pub fn exit_fullscreen(&self) {
        self.set(&self.fullscreen, false, SurfaceSignal::FullscreenExited);
    }

    pub fn enter_fullscreen(&self) {
        self.set(&self.fullscreen, true, SurfaceSignal::FullscreenEntered);
    }

    /// Leaves and returns once: hidden, then visible again.
    pub fn switch_away_and_back(&self) {
        self.hide();
        self.show();
    }

    fn set(&self, flag: &AtomicBool, value: bool, signal: SurfaceSignal) {
        if flag.swap(value, Ordering::SeqCst) != value {
            // no subscribers is fine
            let _ = self.tx.send(signal);
        }
    }
}

#[async_trait]
impl ProctorSurface for VirtualSurface {
    fn state(&self) -> SurfaceState {
        SurfaceState {
            visible: self.visible.load(Ordering::SeqCst),
            fullscreen: self.fullscreen.load(Ordering::SeqCst),
        }
    }

    async fn request_activation(&self) -> Result<(), SurfaceError> {
        if self.deny_activation.load(Ordering::SeqCst) {
            return Err(SurfaceError::Denied("blocked by user agent".to_string()));
        }
        self.enter_fullscreen();
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SurfaceSignal> {
        self.tx.subscribe()
    }
}

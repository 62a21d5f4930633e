//! Rendering surface that route overlays are attached to.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::models::Route;

/// A map surface able to show one route overlay at a time.
///
/// Implementations keep rendering whatever was drawn last until told
/// otherwise, so owners must clear the overlay explicitly.
pub trait MapViewport: Send + Sync {
    /// Draw `route`, replacing any overlay already shown
    fn draw_route(&self, route: &Route);

    /// Remove the overlay, if any
    fn clear_route(&self);
}

/// Viewport that keeps the current overlay in memory.
#[derive(Default)]
pub struct MemoryViewport {
    overlay: Mutex<Option<Route>>,
    draws: AtomicUsize,
    clears: AtomicUsize,
}

impl MemoryViewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The overlay currently shown
    pub fn overlay(&self) -> Option<Route> {
        self.overlay
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn draw_count(&self) -> usize {
        self.draws.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl MapViewport for MemoryViewport {
    fn draw_route(&self, route: &Route) {
        *self.overlay.lock().unwrap_or_else(PoisonError::into_inner) = Some(route.clone());
        self.draws.fetch_add(1, Ordering::SeqCst);
    }

    fn clear_route(&self) {
        *self.overlay.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

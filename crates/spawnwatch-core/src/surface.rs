//! Capabilities the core needs from the rendering and notification side.
//!
//! The engine never draws anything itself. It drives a surface through the
//! traits in this module:
//!
//! - [`VisualSurface`] -- create, update, destroy, and show/hide the visual
//!   for one entity kind. Implemented once per kind.
//! - [`AlertSink`] -- fire an arrival alert for a sighting.
//! - [`StatusSurface`] -- connection indicator and countdown labels, driven
//!   by the scheduler.
//!
//! Handles returned by [`VisualSurface::create_visual`] are owned by the
//! entity store and handed back by value to
//! [`VisualSurface::destroy_visual`], so a handle can only be released once.

use chrono::{DateTime, Utc};
use serde::Serialize;
use spawnwatch_types::{CoverageZone, EncounterId, Sighting, TerritoryMarker};

/// Draws and removes the visual for entities of kind `E`.
pub trait VisualSurface<E> {
    /// Opaque handle to one on-screen object.
    type Handle;

    /// Draw a new visual for `entity` and return its handle.
    fn create_visual(&mut self, entity: &E) -> Self::Handle;

    /// Refresh an existing visual in place after `entity` changed.
    fn update_visual(&mut self, handle: &mut Self::Handle, entity: &E);

    /// Remove the visual from the screen and release the handle.
    fn destroy_visual(&mut self, handle: Self::Handle);

    /// Show or hide a visual without destroying it.
    ///
    /// Only coverage zones are toggled this way; the default does nothing.
    fn set_visual_visibility(&mut self, handle: &mut Self::Handle, visible: bool) {
        let _ = (handle, visible);
    }
}

/// Receives arrival alerts for interesting sightings.
pub trait AlertSink {
    /// Play the audible/visual alert and raise a desktop notification that
    /// links back to the sighting's position.
    fn fire_alert(&mut self, sighting: &Sighting);
}

/// Everything the reconciliation engine drives.
pub trait RenderSurface:
    VisualSurface<Sighting> + VisualSurface<TerritoryMarker> + VisualSurface<CoverageZone> + AlertSink
{
}

impl<T> RenderSurface for T where
    T: VisualSurface<Sighting>
        + VisualSurface<TerritoryMarker>
        + VisualSurface<CoverageZone>
        + AlertSink
{
}

/// State of the link to the map server, shown by the status indicator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No fetch has completed yet.
    Connecting,
    /// The last fetch succeeded.
    Connected {
        /// When the last successful fetch completed.
        at: DateTime<Utc>,
        /// Health metadata from the server, passed through untouched.
        health: Option<serde_json::Value>,
    },
    /// The last fetch failed.
    Disconnected {
        /// When the current run of failures started.
        since: DateTime<Utc>,
        /// Description of the most recent failure.
        reason: String,
    },
}

impl ConnectionStatus {
    /// Whether the last fetch succeeded.
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// Remaining-time text for one rendered sighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountdownLabel {
    /// Sighting the label belongs to.
    pub id: EncounterId,
    /// Display text, e.g. `(04m32s)` or `(expired)`.
    pub text: String,
}

/// Connection indicator and countdown label display.
pub trait StatusSurface {
    /// Update the connection-status indicator.
    fn show_status(&mut self, status: &ConnectionStatus);

    /// Replace the countdown text of every rendered sighting.
    fn show_countdowns(&mut self, labels: &[CountdownLabel]);
}

//! Map surface that reports every visual change through `tracing`.
//!
//! Markers are kept as rendered labels so a front end tailing the log (or
//! an operator) sees exactly what a graphical map would show.

use chrono::Utc;
use spawnwatch_core::label::{ALERT_FOCUS_ZOOM, LabelRenderer, directions_url};
use spawnwatch_core::surface::{
    AlertSink, ConnectionStatus, CountdownLabel, StatusSurface, VisualSurface,
};
use spawnwatch_types::{CoverageZone, Sighting, TerritoryMarker};
use tracing::{debug, info, trace, warn};

/// One drawn marker.
#[derive(Debug)]
pub struct Marker {
    key: String,
    label: String,
    visible: bool,
}

impl Marker {
    /// `kind:id` of the entity this marker draws.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Info-window text currently attached to the marker.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the marker is shown.
    pub const fn is_visible(&self) -> bool {
        self.visible
    }
}

/// Surface logging markers, alerts, and status changes.
#[derive(Debug)]
pub struct LogSurface {
    labels: LabelRenderer,
    markers: usize,
    last_status: Option<ConnectionStatus>,
}

impl LogSurface {
    /// Create a surface rendering labels with `labels`.
    pub const fn new(labels: LabelRenderer) -> Self {
        Self {
            labels,
            markers: 0,
            last_status: None,
        }
    }

    /// Number of markers currently drawn.
    pub const fn marker_count(&self) -> usize {
        self.markers
    }

    fn sighting_label(&self, sighting: &Sighting) -> String {
        self.labels
            .sighting(sighting, Utc::now())
            .unwrap_or_else(|e| {
                warn!(encounter = %sighting.id, error = %e, "sighting label failed to render");
                sighting.display_name()
            })
    }

    fn territory_label(&self, territory: &TerritoryMarker) -> String {
        self.labels.territory(territory).unwrap_or_else(|e| {
            warn!(territory = %territory.id, error = %e, "territory label failed to render");
            territory.faction.name().to_owned()
        })
    }

    fn add(&mut self, key: String, label: String) -> Marker {
        self.markers = self.markers.saturating_add(1);
        debug!(marker = %key, "marker added");
        trace!(marker = %key, label = %label, "marker label");
        Marker {
            key,
            label,
            visible: true,
        }
    }

    fn remove(&mut self, marker: &Marker) {
        self.markers = self.markers.saturating_sub(1);
        debug!(marker = %marker.key(), "marker removed");
    }
}

impl VisualSurface<Sighting> for LogSurface {
    type Handle = Marker;

    fn create_visual(&mut self, entity: &Sighting) -> Marker {
        info!(
            encounter = %entity.id,
            species = %entity.species,
            name = %entity.display_name(),
            latitude = entity.position.latitude,
            longitude = entity.position.longitude,
            expires_at = %entity.expires_at,
            "sighting appeared"
        );
        let label = self.sighting_label(entity);
        self.add(format!("sighting:{}", entity.id), label)
    }

    fn update_visual(&mut self, handle: &mut Marker, entity: &Sighting) {
        debug!(encounter = %entity.id, expires_at = %entity.expires_at, "sighting updated");
        handle.label = self.sighting_label(entity);
        trace!(marker = %handle.key(), label = %handle.label(), "marker label");
    }

    fn destroy_visual(&mut self, handle: Marker) {
        self.remove(&handle);
    }
}

impl VisualSurface<TerritoryMarker> for LogSurface {
    type Handle = Marker;

    fn create_visual(&mut self, entity: &TerritoryMarker) -> Marker {
        info!(
            territory = %entity.id,
            faction = entity.faction.name(),
            strength = entity.strength,
            "territory marker placed"
        );
        let label = self.territory_label(entity);
        self.add(format!("territory:{}", entity.id), label)
    }

    fn update_visual(&mut self, handle: &mut Marker, entity: &TerritoryMarker) {
        debug!(territory = %entity.id, strength = entity.strength, "territory updated");
        handle.label = self.territory_label(entity);
    }

    fn destroy_visual(&mut self, handle: Marker) {
        self.remove(&handle);
    }
}

impl VisualSurface<CoverageZone> for LogSurface {
    type Handle = Marker;

    fn create_visual(&mut self, entity: &CoverageZone) -> Marker {
        let label = format!("scanned {}m around {}", entity.radius_m, entity.position);
        self.add(format!("coverage:{}", entity.key), label)
    }

    fn update_visual(&mut self, handle: &mut Marker, entity: &CoverageZone) {
        handle.label = format!("scanned {}m around {}", entity.radius_m, entity.position);
    }

    fn destroy_visual(&mut self, handle: Marker) {
        self.remove(&handle);
    }

    fn set_visual_visibility(&mut self, handle: &mut Marker, visible: bool) {
        if handle.is_visible() != visible {
            debug!(marker = %handle.key, visible, "coverage visibility changed");
            handle.visible = visible;
        }
    }
}

impl AlertSink for LogSurface {
    fn fire_alert(&mut self, sighting: &Sighting) {
        match self.labels.alert(sighting, Utc::now()) {
            Ok(alert) => info!(
                title = %alert.title,
                body = %alert.body,
                latitude = alert.focus.latitude,
                longitude = alert.focus.longitude,
                zoom = ALERT_FOCUS_ZOOM,
                directions = %directions_url(alert.focus),
                "arrival alert"
            ),
            Err(e) => warn!(encounter = %sighting.id, error = %e, "alert text failed to render"),
        }
    }
}

impl StatusSurface for LogSurface {
    fn show_status(&mut self, status: &ConnectionStatus) {
        let changed = self
            .last_status
            .as_ref()
            .is_none_or(|last| last.is_connected() != status.is_connected());
        match status {
            ConnectionStatus::Connecting => info!("connecting to map server"),
            ConnectionStatus::Connected { health, .. } if changed => {
                info!(health = ?health, markers = self.markers, "connected to map server");
            }
            ConnectionStatus::Connected { .. } => {}
            ConnectionStatus::Disconnected { since, reason } => {
                warn!(since = %since, reason = %reason, "map server unreachable");
            }
        }
        self.last_status = Some(status.clone());
    }

    fn show_countdowns(&mut self, labels: &[CountdownLabel]) {
        for label in labels {
            trace!(encounter = %label.id, countdown = %label.text, "countdown");
        }
    }
}

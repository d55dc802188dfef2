//! Info-window labels and alert text rendered with `minijinja`.
//!
//! Default templates are compiled into the crate. [`LabelRenderer::from_dir`]
//! lets a deployment override any of them from disk without rebuilding;
//! files that are absent fall back to the built-in version.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use minijinja::{Environment, Value, context};
use spawnwatch_types::{Faction, Position, Sighting, TerritoryMarker};

use crate::countdown::{clock_time, countdown_text, remaining};

/// Zoom level a map should use when focusing an alerted sighting.
pub const ALERT_FOCUS_ZOOM: u8 = 15;

const SIGHTING: &str = "sighting.html";
const TERRITORY: &str = "territory.html";
const ALERT_TITLE: &str = "alert_title.txt";
const ALERT_BODY: &str = "alert_body.txt";

const BUILTIN: [(&str, &str, &str); 4] = [
    (SIGHTING, "sighting.html.j2", include_str!("../templates/sighting.html.j2")),
    (TERRITORY, "territory.html.j2", include_str!("../templates/territory.html.j2")),
    (ALERT_TITLE, "alert_title.txt.j2", include_str!("../templates/alert_title.txt.j2")),
    (ALERT_BODY, "alert_body.txt.j2", include_str!("../templates/alert_body.txt.j2")),
];

/// Errors raised while loading or rendering label templates.
#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    /// A template failed to compile or render.
    #[error("template error: {source}")]
    Template {
        /// The underlying template error.
        #[from]
        source: minijinja::Error,
    },

    /// An override template could not be read.
    #[error("failed to read template {}: {source}", .path.display())]
    Io {
        /// Path of the override file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Text of a desktop notification for a newly arrived sighting.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertText {
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
    /// Where clicking the notification should centre the map.
    pub focus: Position,
}

/// Renders labels for map visuals and alerts.
#[derive(Debug)]
pub struct LabelRenderer {
    env: Environment<'static>,
}

impl LabelRenderer {
    /// Renderer using the built-in templates.
    pub fn new() -> Result<Self, LabelError> {
        let mut env = Environment::new();
        for (name, _, source) in BUILTIN {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    /// Renderer preferring templates found in `dir`.
    ///
    /// Each template is looked up by its file name (e.g.
    /// `sighting.html.j2`); missing files use the built-in template.
    pub fn from_dir(dir: &Path) -> Result<Self, LabelError> {
        let mut env = Environment::new();
        for (name, file, source) in BUILTIN {
            let path = dir.join(file);
            match std::fs::read_to_string(&path) {
                Ok(custom) => {
                    tracing::debug!(template = name, path = %path.display(), "using template override");
                    env.add_template_owned(name, custom)?;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    env.add_template(name, source)?;
                }
                Err(source) => return Err(LabelError::Io { path, source }),
            }
        }
        Ok(Self { env })
    }

    /// Info-window HTML for a sighting.
    pub fn sighting(&self, sighting: &Sighting, now: DateTime<Utc>) -> Result<String, LabelError> {
        let position = sighting.position;
        let rendered = self.env.get_template(SIGHTING)?.render(context! {
            name => sighting.display_name(),
            species => sighting.species.0,
            clock => clock_time(sighting.expires_at),
            countdown => countdown_text(sighting.expires_at, now),
            expires_at_ms => sighting.expires_at.timestamp_millis(),
            latitude => position.latitude,
            longitude => position.longitude,
            directions => Value::from_safe_string(directions_url(position)),
        })?;
        Ok(rendered)
    }

    /// Info-window HTML for a territory marker.
    pub fn territory(&self, territory: &TerritoryMarker) -> Result<String, LabelError> {
        let position = territory.position;
        let rendered = self.env.get_template(TERRITORY)?.render(context! {
            faction => territory.faction.name(),
            contested => territory.faction != Faction::Uncontested,
            strength => territory.strength,
            latitude => position.latitude,
            longitude => position.longitude,
            directions => Value::from_safe_string(directions_url(position)),
        })?;
        Ok(rendered)
    }

    /// Notification text for a newly arrived sighting.
    pub fn alert(&self, sighting: &Sighting, now: DateTime<Utc>) -> Result<AlertText, LabelError> {
        let name = sighting.display_name();
        let title = self
            .env
            .get_template(ALERT_TITLE)?
            .render(context! { name => &name })?;
        let body = self.env.get_template(ALERT_BODY)?.render(context! {
            name => &name,
            remaining => remaining(sighting.expires_at, now).unwrap_or_else(|| "00m00s".to_owned()),
        })?;
        Ok(AlertText {
            title,
            body,
            focus: sighting.position,
        })
    }
}

/// Directions link from the viewer's location to `position`.
pub fn directions_url(position: Position) -> String {
    format!(
        "https://www.google.com/maps/dir/Current+Location/{},{}",
        position.latitude, position.longitude
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::{in_seconds, sighting, t0, territory};

    #[test]
    fn sighting_label_has_name_link_and_countdown() {
        let renderer = LabelRenderer::new().unwrap();
        let mut s = sighting("a1", 4, in_seconds(272));
        s.name = Some("Charmander".to_owned());

        let html = renderer.sighting(&s, t0()).unwrap();

        assert!(html.contains("<b>Charmander</b>"));
        assert!(html.contains("#4</a>"));
        assert!(html.contains("(04m32s)"));
        assert!(html.contains("https://www.google.com/maps/dir/Current+Location/10,20"));
    }

    #[test]
    fn sighting_names_are_escaped() {
        let renderer = LabelRenderer::new().unwrap();
        let mut s = sighting("a1", 4, in_seconds(60));
        s.name = Some("<script>".to_owned());

        let html = renderer.sighting(&s, t0()).unwrap();

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn territory_label_depends_on_control() {
        let renderer = LabelRenderer::new().unwrap();

        let held = renderer.territory(&territory("g1", Faction::Valor, 1200)).unwrap();
        assert!(held.contains("Team Valor"));
        assert!(held.contains("Prestige: 1200"));

        let open = renderer.territory(&territory("g2", Faction::Uncontested, 0)).unwrap();
        assert!(open.contains("Uncontested"));
        assert!(!open.contains("Prestige"));
    }

    #[test]
    fn alert_text_names_species_and_time_left() {
        let renderer = LabelRenderer::new().unwrap();
        let alert = renderer.alert(&sighting("a1", 131, in_seconds(605)), t0()).unwrap();

        assert_eq!(alert.title, "A wild #131 has appeared");
        assert_eq!(alert.body, "Disappears in 10m05s");
        assert_eq!(alert.focus, Position::new(10.0, 20.0));
    }

    #[test]
    fn overrides_replace_only_present_templates() {
        let dir = std::env::temp_dir().join(format!("spawnwatch_labels_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("alert_title.txt.j2"), "{{ name }} spotted!").unwrap();

        let renderer = LabelRenderer::from_dir(&dir).unwrap();
        let alert = renderer.alert(&sighting("a1", 25, in_seconds(60)), t0()).unwrap();

        assert_eq!(alert.title, "#25 spotted!");
        assert_eq!(alert.body, "Disappears in 01m00s");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}

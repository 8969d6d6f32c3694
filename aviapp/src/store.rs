use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use avigeo::{CourseMask, Frame, MediaInfo, Mode, Route, Zone};

/// Supplier of immutable route data.
///
/// Main frames come back sorted ascending by id, child frames keyed by id.
/// Malformed rows never reach the matcher: they are rejected here, at load
/// time.
pub trait RouteStore: Send + Sync {
    fn load(&self, route_id: i32) -> Result<Route>;

    /// Route ids and display names available for selection.
    fn available_routes(&self) -> Result<Vec<(i32, String)>>;
}

#[derive(Debug, Deserialize)]
struct RouteFile {
    routes: Vec<RouteRecord>,
}

#[derive(Debug, Deserialize)]
struct RouteRecord {
    id: i32,
    #[serde(default)]
    name: String,
    #[serde(default)]
    frames: Vec<FrameRecord>,
    #[serde(default)]
    children: Vec<ChildRecord>,
}

#[derive(Debug, Deserialize)]
struct FrameRecord {
    id: i32,
    zone: Option<ZoneRecord>,
    media: MediaRecord,
}

#[derive(Debug, Deserialize)]
struct ChildRecord {
    id: i32,
    media: MediaRecord,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum ZoneRecord {
    Circle {
        lat: f64,
        lon: f64,
        radius_m: f64,
        #[serde(default)]
        course_mask: u8,
    },
    Rectangle {
        lat_start: f64,
        lon_start: f64,
        lat_end: f64,
        lon_end: f64,
        #[serde(default)]
        course_mask: u8,
    },
}

#[derive(Debug, Deserialize)]
struct MediaRecord {
    filename: String,
    #[serde(default)]
    play_mode: u8,
    #[serde(default = "no_child")]
    id_next: i32,
    #[serde(default)]
    pause_secs: u32,
}

fn no_child() -> i32 {
    -1
}

impl ZoneRecord {
    fn build(self) -> avigeo::Result<Zone> {
        match self {
            Self::Circle {
                lat,
                lon,
                radius_m,
                course_mask,
            } => Zone::circle(lat, lon, CourseMask::from_bits(course_mask), radius_m),
            Self::Rectangle {
                lat_start,
                lon_start,
                lat_end,
                lon_end,
                course_mask,
            } => Zone::rectangle(
                lat_start,
                lon_start,
                CourseMask::from_bits(course_mask),
                lat_end,
                lon_end,
            ),
        }
    }
}

impl MediaRecord {
    fn build(self) -> avigeo::Result<MediaInfo> {
        Ok(MediaInfo {
            filename: self.filename,
            mode: Mode::try_from(self.play_mode)?,
            id_next: (self.id_next >= 0).then_some(self.id_next),
            pause_secs: self.pause_secs,
        })
    }
}

/// Route store backed by a single YAML file holding every route.
pub struct YamlRouteStore {
    path: PathBuf,
}

impl YamlRouteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_file(&self) -> Result<RouteFile> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read route file {}", self.path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("malformed route file {}", self.path.display()))
    }

    fn build_route(record: RouteRecord) -> Result<Route> {
        let route_id = record.id;
        let mut frames = Vec::with_capacity(record.frames.len());

        for frame in record.frames {
            let frame_id = frame.id;
            let zone = match frame.zone.map(ZoneRecord::build).transpose() {
                Ok(zone) => zone,
                Err(e) => {
                    warn!(route_id, frame_id, error = %e, "skipping frame with bad zone");
                    continue;
                }
            };
            let media = match frame.media.build() {
                Ok(media) => media,
                Err(e) => {
                    warn!(route_id, frame_id, error = %e, "skipping frame with bad media");
                    continue;
                }
            };
            frames.push(Frame {
                id: frame_id,
                zone,
                media,
            });
        }

        let mut children = HashMap::with_capacity(record.children.len());
        for child in record.children {
            let child_id = child.id;
            match child.media.build() {
                Ok(media) => {
                    children.insert(child_id, media);
                }
                Err(e) => {
                    warn!(route_id, child_id, error = %e, "skipping child with bad media");
                }
            }
        }

        let route = Route::new(route_id, frames, children)?;
        info!(
            route_id,
            frames = route.frames().len(),
            children = route.child_count(),
            "route loaded"
        );
        Ok(route)
    }
}

impl RouteStore for YamlRouteStore {
    fn load(&self, route_id: i32) -> Result<Route> {
        let file = self.read_file()?;
        let Some(record) = file.routes.into_iter().find(|r| r.id == route_id) else {
            bail!("route {route_id} not found in {}", self.path.display());
        };
        Self::build_route(record)
    }

    fn available_routes(&self) -> Result<Vec<(i32, String)>> {
        let file = self.read_file()?;
        Ok(file
            .routes
            .into_iter()
            .map(|r| {
                let name = if r.name.is_empty() {
                    format!("route {}", r.id)
                } else {
                    r.name
                };
                (r.id, name)
            })
            .collect())
    }
}

/// Check that every media file the route references exists under the media
/// directory. Missing files are logged; the first one fails the check.
pub fn media_content_present(route: &Route, media_dir: &Path) -> bool {
    for filename in route.media_files() {
        let path = media_dir.join(filename);
        if !path.is_file() {
            warn!(path = %path.display(), "media file is missing");
            return false;
        }
    }
    true
}

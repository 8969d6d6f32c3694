use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;

use avigeo::GpsFix;

/// Append-only position log. Rotation is an external concern.
///
/// One line per fix: an UTC timestamp followed by the stable track-line
/// rendering of the fix, so a recorded track can be replayed directly by
/// [`ReplaySource`](crate::ReplaySource).
pub struct TrackLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl TrackLog {
    /// Log for the given route: the route id is inserted before the file
    /// extension, `gps.track` becoming e.g. `gps12.track`.
    pub fn for_route(base: &Path, route_id: i32) -> Self {
        let path = match (base.file_stem(), base.extension()) {
            (Some(stem), Some(ext)) => base.with_file_name(format!(
                "{}{}.{}",
                stem.to_string_lossy(),
                route_id,
                ext.to_string_lossy()
            )),
            _ => base.to_path_buf(),
        };
        debug!(path = %path.display(), "track log");
        Self {
            path,
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, fix: &GpsFix) -> Result<()> {
        let mut guard = self.file.lock();
        if guard.is_none() {
            *guard = Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?,
            );
        }
        if let Some(file) = guard.as_mut() {
            writeln!(file, "{} {}", Utc::now().format("%Y-%m-%dT%H:%M:%SZ"), fix)?;
        }
        Ok(())
    }
}

/// Latest-fix snapshot plus the track log, shared between the announcement
/// task and the UI layer.
pub struct Navigator {
    current: Mutex<GpsFix>,
    track: TrackLog,
}

impl Navigator {
    pub fn new(track: TrackLog) -> Self {
        Self {
            current: Mutex::new(GpsFix::invalid()),
            track,
        }
    }

    /// Store the newest fix and hand it back for processing.
    pub fn update(&self, fix: GpsFix) -> GpsFix {
        *self.current.lock() = fix.clone();
        fix
    }

    /// Read-only snapshot for display: validity, latitude, longitude.
    pub fn position(&self) -> (bool, f64, f64) {
        let fix = self.current.lock();
        (fix.valid, fix.lat, fix.lon)
    }

    pub fn is_valid(&self) -> bool {
        self.current.lock().valid
    }

    pub fn log_position(&self, fix: &GpsFix) -> Result<()> {
        self.track.append(fix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_id_is_inserted_before_the_extension() {
        let log = TrackLog::for_route(Path::new("/data/gps.track"), 12);
        assert_eq!(log.path(), Path::new("/data/gps12.track"));
    }

    #[test]
    fn extensionless_base_is_kept_as_is() {
        let log = TrackLog::for_route(Path::new("/data/gpstrack"), 12);
        assert_eq!(log.path(), Path::new("/data/gpstrack"));
    }

    #[test]
    fn appended_lines_carry_the_fix() {
        let dir = tempfile::tempdir().unwrap();
        let log = TrackLog::for_route(&dir.path().join("gps.track"), 3);
        let fix = GpsFix::new(55.5, 37.5, 42.0, 180.0);

        log.append(&fix).unwrap();
        log.append(&GpsFix::invalid()).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("vld: 1, lat: 55.500000"));
        assert!(lines[1].contains("vld: 0"));
    }

    #[test]
    fn navigator_snapshot_follows_updates() {
        let dir = tempfile::tempdir().unwrap();
        let navi = Navigator::new(TrackLog::for_route(&dir.path().join("gps.track"), 1));

        assert_eq!(navi.position().0, false);
        navi.update(GpsFix::new(55.5, 37.5, 42.0, 180.0));
        assert_eq!(navi.position(), (true, 55.5, 37.5));
        assert!(navi.is_valid());
    }
}

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{bail, Context, Result};
use tracing::warn;

use avigeo::GpsFix;

/// Source of GPS samples, polled once per task tick.
///
/// Implementations must not block longer than roughly one tick; a receiver
/// with no fresh data returns its last known (or an invalid) fix.
pub trait PositionSource: Send + Sync {
    fn read(&self) -> Result<GpsFix>;
}

/// Position source replaying a recorded track file, line by line.
///
/// Accepts both raw fix lines and track-log lines with a leading timestamp
/// (everything before `vld:` is ignored). Malformed lines are skipped with
/// a warning. The replay loops once the file is exhausted.
pub struct ReplaySource {
    fixes: Vec<GpsFix>,
    index: AtomicUsize,
}

impl ReplaySource {
    pub fn new(fixes: Vec<GpsFix>) -> Result<Self> {
        if fixes.is_empty() {
            bail!("replay source needs at least one fix");
        }
        Ok(Self {
            fixes,
            index: AtomicUsize::new(0),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read replay file {}", path.display()))?;

        let mut fixes = Vec::new();
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            // Track-log lines carry a timestamp prefix before the fix.
            let fix_part = match line.find("vld:") {
                Some(pos) => &line[pos..],
                None => line,
            };
            match fix_part.parse::<GpsFix>() {
                Ok(fix) => fixes.push(fix),
                Err(e) => warn!(
                    file = %path.display(),
                    line = number + 1,
                    error = %e,
                    "skipping malformed replay line"
                ),
            }
        }

        if fixes.is_empty() {
            bail!("no usable fixes in replay file {}", path.display());
        }
        Ok(Self {
            fixes,
            index: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }
}

impl PositionSource for ReplaySource {
    fn read(&self) -> Result<GpsFix> {
        let i = self.index.fetch_add(1, Ordering::Relaxed);
        Ok(self.fixes[i % self.fixes.len()].clone())
    }
}

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::zone::Zone;

/// Interruption policy attached to a media item, governing how it interacts
/// with audio already in progress. "Parent" variants additionally chain the
/// child frame referenced by `id_next` once their own audio completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    /// A competing announcement is dropped while this one plays.
    Uninterrupted = 0,
    /// A competing announcement is appended to the pending queue.
    Queued = 1,
    /// A competing announcement stops this one and plays instead.
    Interrupted = 2,
    /// Interruptible, and chains its child after completion.
    InterruptedParent = 3,
    /// Uninterruptible, and chains its child after completion.
    UninterruptedParent = 4,
}

impl Mode {
    pub fn is_parent(self) -> bool {
        matches!(self, Self::InterruptedParent | Self::UninterruptedParent)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninterrupted => "UNINTERRUPTED",
            Self::Queued => "QUEUED",
            Self::Interrupted => "INTERRUPTED",
            Self::InterruptedParent => "INTERRUPTED_PARENT",
            Self::UninterruptedParent => "UNINTERRUPTED_PARENT",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for Mode {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Self::Uninterrupted),
            1 => Ok(Self::Queued),
            2 => Ok(Self::Interrupted),
            3 => Ok(Self::InterruptedParent),
            4 => Ok(Self::UninterruptedParent),
            other => Err(Error::UnsupportedMode(other)),
        }
    }
}

/// An audio item to announce: file name relative to the media directory,
/// playback mode, optional chained child frame id and pre-roll pause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub filename: String,
    pub mode: Mode,
    pub id_next: Option<i32>,
    pub pause_secs: u32,
}

impl MediaInfo {
    pub fn new(filename: impl Into<String>, mode: Mode) -> Self {
        Self {
            filename: filename.into(),
            mode,
            id_next: None,
            pause_secs: 0,
        }
    }
}

/// A main route record: a zone to watch plus the media announced on entry.
///
/// A frame without a zone is kept for completeness but never matches.
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: i32,
    pub zone: Option<Zone>,
    pub media: MediaInfo,
}

/// Immutable per-route data: main frames sorted ascending by id plus the
/// child-frame side table. A route is wholly replaced on reload, never
/// mutated in place.
#[derive(Debug)]
pub struct Route {
    id: i32,
    main: Vec<Frame>,
    children: HashMap<i32, MediaInfo>,
}

impl Route {
    pub fn new(id: i32, mut main: Vec<Frame>, children: HashMap<i32, MediaInfo>) -> Result<Self> {
        main.sort_by_key(|f| f.id);

        for pair in main.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(Error::DuplicateFrameId(pair[0].id));
            }
        }
        for child_id in children.keys() {
            if main.binary_search_by_key(child_id, |f| f.id).is_ok() {
                return Err(Error::ChildIdCollision(*child_id));
            }
        }

        Ok(Self { id, main, children })
    }

    /// Placeholder route used before any route has been selected.
    pub fn empty() -> Self {
        Self {
            id: -1,
            main: Vec::new(),
            children: HashMap::new(),
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn frames(&self) -> &[Frame] {
        &self.main
    }

    pub fn is_empty(&self) -> bool {
        self.main.is_empty()
    }

    /// Child-frame lookup; `None` is an ordinary outcome, not an error.
    pub fn child(&self, id: i32) -> Option<&MediaInfo> {
        self.children.get(&id)
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Every media file the route references, mains and children alike.
    pub fn media_files(&self) -> impl Iterator<Item = &str> {
        self.main
            .iter()
            .map(|f| f.media.filename.as_str())
            .chain(self.children.values().map(|m| m.filename.as_str()))
    }
}

/// Shared handle to the currently selected route.
///
/// Route data is read-only once loaded; the only guarded operation is the
/// swap of one route for another during reload. Readers clone the `Arc` and
/// keep matching against their snapshot without further locking.
#[derive(Debug)]
pub struct RouteHandle {
    inner: RwLock<Arc<Route>>,
}

impl RouteHandle {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Arc::new(Route::empty())),
        }
    }

    pub fn with_route(route: Arc<Route>) -> Self {
        Self {
            inner: RwLock::new(route),
        }
    }

    pub fn current(&self) -> Arc<Route> {
        Arc::clone(&self.inner.read())
    }

    /// Replace the selected route, returning the previous one.
    pub fn swap(&self, route: Arc<Route>) -> Arc<Route> {
        std::mem::replace(&mut *self.inner.write(), route)
    }
}

impl Default for RouteHandle {
    fn default() -> Self {
        Self::new()
    }
}

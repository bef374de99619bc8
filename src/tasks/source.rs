//! Artwork source strategies. The controller is parameterized by one of
//! these instead of being subclassed per variant: a library directory that
//! rotates randomly, or a single pinned file.

use std::ffi::OsStr;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Result;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use tokio::sync::mpsc::Sender;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::Error;
use crate::events::ControlEvent;
use crate::region::Rotation;

/// What to decode next: a file plus its storage-to-display rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtworkDescriptor {
    pub path: PathBuf,
    pub rotation: Rotation,
}

impl ArtworkDescriptor {
    pub fn for_path(path: PathBuf) -> Self {
        let rotation = read_rotation(&path);
        Self { path, rotation }
    }
}

/// Supplies the next artwork to display. `force_reload` asks for the
/// artwork currently showing (after a settings change) rather than an
/// advance.
pub trait ArtworkSource: Send {
    fn produce_next(&mut self, force_reload: bool) -> Result<Option<ArtworkDescriptor>>;

    /// The backing store changed; drop any cached listing.
    fn refresh(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Rotates randomly through the images below a library directory.
pub struct LibrarySource {
    root: PathBuf,
    entries: Vec<PathBuf>,
    current: Option<PathBuf>,
    rng: StdRng,
}

impl LibrarySource {
    pub fn new(root: &Path) -> Result<Self, Error> {
        if !root.is_dir() {
            return Err(Error::BadLibrary(root.display().to_string()));
        }
        let entries = scan_library(root);
        info!(count = entries.len(), root = %root.display(), "scanned artwork library");
        Ok(Self {
            root: root.to_path_buf(),
            entries,
            current: None,
            rng: StdRng::from_os_rng(),
        })
    }
}

impl ArtworkSource for LibrarySource {
    fn produce_next(&mut self, force_reload: bool) -> Result<Option<ArtworkDescriptor>> {
        if force_reload && let Some(current) = &self.current {
            return Ok(Some(ArtworkDescriptor::for_path(current.clone())));
        }
        if self.entries.is_empty() {
            return Ok(None);
        }
        // Avoid an immediate repeat when there is any alternative.
        let candidates: Vec<&PathBuf> = self
            .entries
            .iter()
            .filter(|p| self.entries.len() == 1 || Some(*p) != self.current.as_ref())
            .collect();
        let chosen = candidates
            .choose(&mut self.rng)
            .map(|p| (*p).clone())
            .or_else(|| self.entries.first().cloned());
        let Some(path) = chosen else {
            return Ok(None);
        };
        self.current = Some(path.clone());
        debug!(path = %path.display(), "selected next artwork");
        Ok(Some(ArtworkDescriptor::for_path(path)))
    }

    fn refresh(&mut self) -> Result<()> {
        self.entries = scan_library(&self.root);
        debug!(count = self.entries.len(), "library rescanned");
        Ok(())
    }
}

/// Always produces the same pinned file (single-artwork and preview runs).
pub struct FixedSource {
    path: PathBuf,
}

impl FixedSource {
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ArtworkSource for FixedSource {
    fn produce_next(&mut self, _force_reload: bool) -> Result<Option<ArtworkDescriptor>> {
        Ok(Some(ArtworkDescriptor::for_path(self.path.clone())))
    }
}

fn scan_library(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().to_path_buf())
        .filter(|path| is_image(path))
        .collect()
}

#[inline]
pub fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(OsStr::to_str)
            .map(|s| s.to_ascii_lowercase()),
        Some(ref e) if ["jpg", "jpeg", "png", "webp"].contains(&e.as_str())
    )
}

/// Reads the EXIF orientation of `path` as a rotation, defaulting to zero
/// when the metadata is missing or unreadable.
pub fn read_rotation(path: &Path) -> Rotation {
    fn orientation(path: &Path) -> Option<u16> {
        let file = File::open(path).ok()?;
        let mut buf = BufReader::new(file);
        let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
        let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
        field.value.get_uint(0).map(|v| v as u16)
    }
    let rotation = Rotation::from_exif_orientation(orientation(path).unwrap_or(1));
    if rotation != Rotation::Deg0 {
        debug!(degrees = rotation.degrees(), path = %path.display(), "exif rotation");
    }
    rotation
}

/// Watches the library for new artwork and reports arrivals as
/// [`ControlEvent::ArtworkArrived`].
pub fn watch_library(
    root: &Path,
    events: Sender<ControlEvent>,
) -> notify::Result<RecommendedWatcher> {
    let mut watcher = recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            let relevant = matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) && event.paths.iter().any(|p| is_image(p));
            if relevant {
                // Dropped sends are fine: one queued arrival event already
                // forces a rescan.
                let _ = events.try_send(ControlEvent::ArtworkArrived);
            }
        }
        Err(err) => warn!("library watch error: {err}"),
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    info!(watching = %root.display(), "library watcher initialized");
    Ok(watcher)
}

/// Deterministic variant of [`LibrarySource`] used by tests.
#[cfg(test)]
pub fn library_with_seed(root: &Path, seed: u64) -> Result<LibrarySource, Error> {
    let mut source = LibrarySource::new(root)?;
    source.rng = StdRng::seed_from_u64(seed);
    Ok(source)
}

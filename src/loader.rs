use std::{fs, path::Path};

use crate::cliff::{CliffRow, CliffSeries};
use crate::config::Config;
use crate::sprite::{self, Catalog, PlacementRow, Sprite, SpriteDef};
use crate::track::TrackRow;
use crate::{LoadError, Track};

pub fn read_ron<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    profiling::scope!("Read data");
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ron::de::from_bytes(&bytes).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Sprite definitions; falls back to the built-in set when the file is unusable.
pub fn load_catalog(path: &Path) -> Catalog {
    match read_ron::<Vec<SpriteDef>>(path) {
        Ok(defs) if defs.is_empty() => {
            log::warn!("No sprites in {}, using the built-in set", path.display());
            Catalog::builtin()
        }
        Ok(defs) => {
            log::info!("Loaded {} sprite definitions from {}", defs.len(), path.display());
            Catalog::new(defs)
        }
        Err(e) => {
            log::warn!("Using built-in sprites: {}", e);
            Catalog::builtin()
        }
    }
}

/// A fully built track waiting to be activated.
pub struct LoadedTrack {
    pub track: Track,
    pub sprites: Vec<Sprite>,
}

/// Builds a track from rows already in memory. Cliff and sprite rows are optional.
pub fn build_track(
    rows: &[TrackRow],
    cliffs: Option<&[CliffRow]>,
    placement: Option<&[PlacementRow]>,
    config: &Config,
    catalog: &Catalog,
) -> Result<LoadedTrack, LoadError> {
    let mut track = Track::from_rows(rows, config.track.segment_length)?;
    if let Some(rows) = cliffs {
        track.set_cliffs(CliffSeries::build(rows, track.len()));
    }
    track.enforce_wrap_continuity(config.track.wrap_margin);
    let sprites = match placement.map(|rows| sprite::place(rows, catalog, &track)) {
        Some(Ok(sprites)) => sprites,
        Some(Err(e)) => {
            log::warn!("Track has no sprites: {}", e);
            Vec::new()
        }
        None => Vec::new(),
    };
    Ok(LoadedTrack { track, sprites })
}

/// Reads the three description files named by `config.track`.
///
/// Only a broken track description is an error; broken cliffs load flat and
/// broken sprite placement loads empty.
pub fn load_track(config: &Config, catalog: &Catalog) -> Result<LoadedTrack, LoadError> {
    let source = &config.track;
    log::info!("Loading track: {}", source.track);
    let rows = read_ron::<Vec<TrackRow>>(Path::new(&source.track))?;
    let cliffs = read_ron::<Vec<CliffRow>>(Path::new(&source.cliffs))
        .map_err(|e| log::warn!("Flat cliffs: {}", e))
        .ok();
    let placement = read_ron::<Vec<PlacementRow>>(Path::new(&source.sprites))
        .map_err(|e| log::warn!("Track has no sprites: {}", e))
        .ok();
    let loaded = build_track(&rows, cliffs.as_deref(), placement.as_deref(), config, catalog)?;
    log::info!(
        "Track ready: {} segments, {} sprites",
        loaded.track.len(),
        loaded.sprites.len()
    );
    Ok(loaded)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadTicket(u64);

/// Hands out load tickets; only the most recent one may complete.
#[derive(Debug, Default)]
pub struct LoadSlot {
    issued: u64,
}

impl LoadSlot {
    /// Starts a new load, invalidating any pending one.
    pub fn request(&mut self) -> LoadTicket {
        self.issued += 1;
        LoadTicket(self.issued)
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.0 == self.issued
    }

    pub fn complete<T>(&self, ticket: LoadTicket, result: Result<T, LoadError>) -> Result<T, LoadError> {
        if self.is_current(ticket) {
            result
        } else {
            Err(LoadError::Stale(ticket.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write(dir: &Path, name: &str, text: &str) -> String {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn config_in(dir: &Path, track: &str, cliffs: &str, sprites: &str) -> Config {
        let mut config = Config::default();
        config.track.track = write(dir, "track.ron", track);
        config.track.cliffs = write(dir, "cliffs.ron", cliffs);
        config.track.sprites = write(dir, "sprites.ron", sprites);
        config
    }

    const TRACK: &str = "[(kind: Straight, length: 10), (kind: Curve, length: 20, curve: 3.0, rail: Both)]";

    #[test]
    fn loads_all_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(
            dir.path(),
            TRACK,
            "[(side: Both, length: 30, a: (0.5, 400.0), b: (1.0, 800.0))]",
            "[(pool: [\"car01\"], segments: (0, 30), lanes: (-2.0, -1.5), every: 5)]",
        );
        let loaded = load_track(&config, &Catalog::builtin()).unwrap();
        assert_eq!(loaded.track.len(), 30);
        assert_eq!(loaded.sprites.len(), 6);
        assert!(loaded.track.cliff_surface_height_at(3000.0, -1.5) > 0.0);
    }

    #[test]
    fn broken_cliffs_and_sprites_degrade() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(
            dir.path(),
            TRACK,
            "[(side: Sideways)]",
            "[(pool: [\"ufo\"], segments: (0, 30), lanes: (0.0, 0.0))]",
        );
        let loaded = load_track(&config, &Catalog::builtin()).unwrap();
        assert_eq!(loaded.track.len(), 30);
        assert!(loaded.sprites.is_empty());
        assert_eq!(loaded.track.cliff_surface_height_at(3000.0, -1.5), 0.0);
    }

    #[test]
    fn broken_or_empty_track_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), "[(kind: Straight, length: 0)]", "[]", "[]");
        assert!(matches!(load_track(&config, &Catalog::builtin()), Err(LoadError::EmptyTrack)));
        let config = config_in(dir.path(), "[(kind: Straight", "[]", "[]");
        assert!(matches!(load_track(&config, &Catalog::builtin()), Err(LoadError::Parse { .. })));
        let mut config = Config::default();
        config.track.track = dir.path().join("absent.ron").to_string_lossy().into_owned();
        assert!(matches!(load_track(&config, &Catalog::builtin()), Err(LoadError::Io { .. })));
    }

    #[test]
    fn empty_catalog_file_uses_builtin_sprites() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "catalog.ron", "[]");
        let catalog = load_catalog(Path::new(&path));
        assert!(catalog.find("player").is_some());
    }

    #[test]
    fn newer_request_makes_older_stale() {
        let mut slot = LoadSlot::default();
        let first = slot.request();
        let second = slot.request();
        assert!(matches!(slot.complete(first, Ok(1)), Err(LoadError::Stale(1))));
        assert_eq!(slot.complete(second, Ok(2)).unwrap(), 2);
    }
}

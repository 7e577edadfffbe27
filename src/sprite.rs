use std::collections::HashMap;

use rand::{Rng as _, SeedableRng as _};

use crate::{LoadError, Track};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
pub enum SpriteKind {
    #[default]
    Static,
    Animated,
    /// Collected on contact.
    Trigger,
    /// Pushed on contact.
    Solid,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
pub enum Interaction {
    /// Stays in place and visible.
    #[default]
    Static,
    /// Disappears.
    Toggle,
    PlayAnimation,
}

/// Texture coordinates of an atlas cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UvRect {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

impl UvRect {
    pub const FULL: Self = Self {
        u0: 0.0,
        v0: 0.0,
        u1: 1.0,
        v1: 1.0,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
pub struct AtlasLayout {
    pub columns: u32,
    pub rows: u32,
    pub frames: u32,
}

impl AtlasLayout {
    pub const SINGLE: Self = Self {
        columns: 1,
        rows: 1,
        frames: 1,
    };

    pub fn frame_count(&self) -> u32 {
        self.frames.clamp(1, self.columns.max(1) * self.rows.max(1))
    }

    /// Frame index of a grid cell, clamped into the populated frames.
    pub fn frame_at(&self, column: u32, row: u32) -> u32 {
        let column = column.min(self.columns.max(1) - 1);
        let row = row.min(self.rows.max(1) - 1);
        (row * self.columns.max(1) + column).min(self.frame_count() - 1)
    }

    pub fn frame_rect(&self, frame: u32) -> UvRect {
        let columns = self.columns.max(1);
        let rows = self.rows.max(1);
        let frame = frame.min(self.frame_count() - 1);
        let (column, row) = (frame % columns, frame / columns);
        let (w, h) = (1.0 / columns as f32, 1.0 / rows as f32);
        UvRect {
            u0: column as f32 * w,
            v0: row as f32 * h,
            u1: (column + 1) as f32 * w,
            v1: (row + 1) as f32 * h,
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct SpriteDef {
    pub name: String,
    /// Texture key, the sprite name when absent.
    #[serde(default)]
    pub texture: Option<String>,
    #[serde(default)]
    pub kind: SpriteKind,
    #[serde(default)]
    pub interaction: Interaction,
    /// World-space size.
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub atlas: Option<AtlasLayout>,
    #[serde(default)]
    pub fps: f32,
    /// Fraction of player speed lost on contact with a solid sprite.
    #[serde(default)]
    pub slowdown: f32,
    #[serde(default = "SpriteDef::default_mass")]
    pub mass: f32,
}

impl SpriteDef {
    fn default_mass() -> f32 {
        1.0
    }

    pub fn new(name: &str, width: f32, height: f32) -> Self {
        Self {
            name: name.to_string(),
            texture: None,
            kind: SpriteKind::Static,
            interaction: Interaction::Static,
            width,
            height,
            atlas: None,
            fps: 0.0,
            slowdown: 0.0,
            mass: 1.0,
        }
    }

    pub fn texture_name(&self) -> &str {
        self.texture.as_deref().unwrap_or(&self.name)
    }

    pub fn layout(&self) -> AtlasLayout {
        self.atlas.unwrap_or(AtlasLayout::SINGLE)
    }

    /// Half of the world width, in road half-widths.
    pub fn half_width(&self, scale: f32, road_width: f32) -> f32 {
        0.5 * self.width * scale / road_width.max(1.0)
    }
}

/// Sprite definitions addressed by index, looked up by name.
#[derive(Clone, Debug)]
pub struct Catalog {
    defs: Vec<SpriteDef>,
    names: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(defs: Vec<SpriteDef>) -> Self {
        let mut names = HashMap::with_capacity(defs.len());
        for (i, def) in defs.iter().enumerate() {
            if names.insert(def.name.clone(), i).is_some() {
                log::warn!("Sprite '{}' is defined twice, the later one wins", def.name);
            }
        }
        Self { defs, names }
    }

    /// Minimal set for running without a catalog file.
    pub fn builtin() -> Self {
        let mut player = SpriteDef::new("player", 360.0, 200.0);
        player.atlas = Some(AtlasLayout {
            columns: 5,
            rows: 3,
            frames: 15,
        });
        let mut car = SpriteDef::new("car01", 340.0, 220.0);
        car.atlas = Some(AtlasLayout {
            columns: 5,
            rows: 3,
            frames: 15,
        });
        let mut truck = SpriteDef::new("truck01", 460.0, 420.0);
        truck.atlas = car.atlas;
        Self::new(vec![player, car, truck])
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn def(&self, index: usize) -> Option<&SpriteDef> {
        self.defs.get(index)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// A decorative or interactive object placed on the track.
#[derive(Clone, Debug)]
pub struct Sprite {
    pub def: usize,
    pub s: f32,
    pub n: f32,
    pub scale: f32,
    pub frame: u32,
    pub collected: bool,
    pub hidden: bool,
    pub playing: bool,
    pub anim_time: f32,
    pub push_s: f32,
    pub push_n: f32,
    pub last_hit: f64,
    pub segment: usize,
}

impl Sprite {
    pub fn new(def: usize, s: f32, n: f32, scale: f32, frame: u32) -> Self {
        Self {
            def,
            s,
            n,
            scale,
            frame,
            collected: false,
            hidden: false,
            playing: false,
            anim_time: 0.0,
            push_s: 0.0,
            push_n: 0.0,
            last_hit: f64::NEG_INFINITY,
            segment: 0,
        }
    }

    pub fn is_pushed(&self) -> bool {
        self.push_s != 0.0 || self.push_n != 0.0
    }

    /// Advances animation and push drift; returns true when `s` moved.
    pub fn advance(&mut self, def: &SpriteDef, dt: f32, push_decay: f32) -> bool {
        let frames = def.layout().frame_count();
        let looping = def.kind == SpriteKind::Animated;
        if (looping || self.playing) && def.fps > 0.0 && frames > 1 {
            self.anim_time += dt;
            let step = (self.anim_time * def.fps) as u32;
            if looping {
                self.frame = step % frames;
            } else if step >= frames {
                self.frame = frames - 1;
                self.playing = false;
            } else {
                self.frame = step;
            }
        }
        if !self.is_pushed() {
            return false;
        }
        self.s += self.push_s * dt;
        self.n += self.push_n * dt;
        let decay = (-push_decay * dt).exp();
        self.push_s *= decay;
        self.push_n *= decay;
        if self.push_s.abs() < 1.0 && self.push_n.abs() < 1.0e-3 {
            self.push_s = 0.0;
            self.push_n = 0.0;
        }
        true
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
pub enum Distribution {
    #[default]
    Uniform,
    /// Scale and atlas frame grow toward the middle of the run.
    Taper,
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct PlacementRow {
    pub pool: Vec<String>,
    /// `[start, end)` segment range.
    pub segments: (u32, u32),
    pub lanes: (f32, f32),
    #[serde(default = "PlacementRow::one")]
    pub repeat: u32,
    #[serde(default = "PlacementRow::one")]
    pub every: u32,
    #[serde(default)]
    pub jitter: f32,
    #[serde(default = "PlacementRow::unit_scale")]
    pub scale: (f32, f32),
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub distribution: Distribution,
}

impl PlacementRow {
    fn one() -> u32 {
        1
    }

    fn unit_scale() -> (f32, f32) {
        (1.0, 1.0)
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Expands placement rows into sprites; any unknown name rejects the whole set.
pub fn place(rows: &[PlacementRow], catalog: &Catalog, track: &Track) -> Result<Vec<Sprite>, LoadError> {
    let mut sprites = Vec::new();
    let segment_length = track.segment_length();
    for row in rows {
        let pool = row
            .pool
            .iter()
            .map(|name| catalog.find(name).ok_or_else(|| LoadError::UnknownSprite(name.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        let end = row.segments.1.min(track.len() as u32);
        let start = row.segments.0;
        if pool.is_empty() || end <= start {
            continue;
        }
        let mut rng = rand_pcg::Pcg32::seed_from_u64(row.seed);
        let span = end - start;
        for segment in (start..end).step_by(row.every.max(1) as usize) {
            let along = if span > 1 {
                (segment - start) as f32 / (span - 1) as f32
            } else {
                0.5
            };
            let centre = 1.0 - (2.0 * along - 1.0).abs();
            for _ in 0..row.repeat {
                let def = pool[rng.random_range(0..pool.len())];
                let frames = catalog.def(def).map_or(1, |def| def.layout().frame_count());
                let lane = lerp(row.lanes.0, row.lanes.1, rng.random::<f32>())
                    + row.jitter * (2.0 * rng.random::<f32>() - 1.0);
                let offset = (0.5 + row.jitter * (rng.random::<f32>() - 0.5)).clamp(0.0, 0.999);
                let (scale, frame) = match row.distribution {
                    Distribution::Uniform => (
                        lerp(row.scale.0, row.scale.1, rng.random::<f32>()),
                        rng.random_range(0..frames),
                    ),
                    Distribution::Taper => (
                        lerp(row.scale.0, row.scale.1, centre),
                        (centre * (frames - 1) as f32).round() as u32,
                    ),
                };
                let s = (segment as f32 + offset) * segment_length;
                sprites.push(Sprite::new(def, s, lane, scale, frame));
            }
        }
    }
    Ok(sprites)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        let mut tree = SpriteDef::new("tree", 600.0, 900.0);
        tree.atlas = Some(AtlasLayout {
            columns: 2,
            rows: 2,
            frames: 3,
        });
        Catalog::new(vec![tree, SpriteDef::new("rock", 200.0, 150.0)])
    }

    fn row(distribution: Distribution) -> PlacementRow {
        PlacementRow {
            pool: vec!["tree".to_string(), "rock".to_string()],
            segments: (10, 20),
            lanes: (-2.0, -1.5),
            repeat: 2,
            every: 2,
            jitter: 0.0,
            scale: (0.5, 1.5),
            seed: 42,
            distribution,
        }
    }

    #[test]
    fn atlas_rects_follow_grid() {
        let layout = AtlasLayout {
            columns: 4,
            rows: 2,
            frames: 6,
        };
        let r = layout.frame_rect(5);
        assert_eq!((r.u0, r.v0, r.u1, r.v1), (0.25, 0.5, 0.5, 1.0));
        // frames past the populated count clamp to the last one
        assert_eq!(layout.frame_rect(7), r);
        assert_eq!(layout.frame_at(3, 1), 5);
        assert_eq!(layout.frame_at(9, 9), 5);
        assert_eq!(AtlasLayout::SINGLE.frame_rect(3), UvRect::FULL);
    }

    #[test]
    fn placement_is_seeded() {
        let track = Track::flat(40, 200.0);
        let catalog = catalog();
        let a = place(&[row(Distribution::Uniform)], &catalog, &track).unwrap();
        let b = place(&[row(Distribution::Uniform)], &catalog, &track).unwrap();
        assert_eq!(a.len(), 10);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!((x.def, x.s, x.n, x.scale, x.frame), (y.def, y.s, y.n, y.scale, y.frame));
            assert!(x.n >= -2.0 && x.n <= -1.5);
            assert!(x.s >= 2000.0 && x.s < 4000.0);
        }
    }

    #[test]
    fn taper_peaks_in_the_middle() {
        let track = Track::flat(40, 200.0);
        let sprites = place(&[row(Distribution::Taper)], &catalog(), &track).unwrap();
        let first = sprites.first().unwrap().scale;
        let middle = sprites
            .iter()
            .map(|s| s.scale)
            .fold(f32::MIN, f32::max);
        assert!(middle > first);
        assert_eq!(first, 0.5);
    }

    #[test]
    fn unknown_sprite_rejects_the_set() {
        let mut bad = row(Distribution::Uniform);
        bad.pool.push("ufo".to_string());
        let track = Track::flat(40, 200.0);
        assert!(matches!(
            place(&[bad], &catalog(), &track),
            Err(LoadError::UnknownSprite(name)) if name == "ufo"
        ));
    }

    #[test]
    fn one_shot_animation_stops_on_last_frame() {
        let mut def = SpriteDef::new("coin", 100.0, 100.0);
        def.atlas = Some(AtlasLayout {
            columns: 4,
            rows: 1,
            frames: 4,
        });
        def.fps = 10.0;
        let mut sprite = Sprite::new(0, 0.0, 0.0, 1.0, 0);
        sprite.playing = true;
        for _ in 0..10 {
            sprite.advance(&def, 0.1, 1.0);
        }
        assert_eq!(sprite.frame, 3);
        assert!(!sprite.playing);
    }
}

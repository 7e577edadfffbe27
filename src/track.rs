use std::ops::Range;

use crate::cliff::{CliffParams, CliffSeries, Side};
use crate::easing::Easing;
use crate::LoadError;

pub const MIN_ROAD_WIDTH: f32 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
pub enum BoostKind {
    /// Grants a boost while driving through.
    Drive,
    /// Launches the vehicle with a boost.
    Jump,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoostZone {
    pub id: u32,
    pub kind: BoostKind,
    pub min: f32,
    pub max: f32,
    pub visible: bool,
}

impl BoostZone {
    pub fn contains(&self, lateral: f32) -> bool {
        lateral >= self.min && lateral <= self.max
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
pub enum Rail {
    #[default]
    None,
    Left,
    Right,
    Both,
}

impl Rail {
    pub fn guards(self, side: Side) -> bool {
        matches!(
            (self, side),
            (Self::Both, _) | (Self::Left, Side::Left) | (Self::Right, Side::Right)
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LapGate {
    /// Seconds credited when crossed during a race.
    pub time_bonus: f32,
}

#[derive(Clone, Debug, Default)]
pub struct Features {
    pub rail: Rail,
    pub boost_zones: Vec<BoostZone>,
    pub gate: Option<LapGate>,
}

#[derive(Clone, Debug)]
pub struct Segment {
    pub index: usize,
    pub curve: f32,
    pub y0: f32,
    pub y1: f32,
    pub features: Features,
    /// Indices into the simulation's traffic list.
    pub cars: Vec<usize>,
    /// Indices into the simulation's sprite list.
    pub sprites: Vec<usize>,
}

impl Segment {
    fn new(index: usize, curve: f32, y0: f32, y1: f32) -> Self {
        Self {
            index,
            curve,
            y0,
            y1,
            features: Features::default(),
            cars: Vec::new(),
            sprites: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
pub enum SegmentKind {
    Straight,
    Curve,
    Hill,
    SharpHill,
    /// Constant curvature from the first segment.
    Arc,
}

impl SegmentKind {
    fn curve_easing(self) -> Easing {
        match self {
            Self::Straight | Self::Curve => Easing::SMOOTH,
            Self::Hill | Self::SharpHill | Self::Arc => Easing::LINEAR,
        }
    }

    fn height_easing(self) -> Easing {
        match self {
            Self::Hill => Easing::SMOOTH,
            Self::SharpHill => Easing::SHARP,
            Self::Straight | Self::Curve | Self::Arc => Easing::LINEAR,
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct BoostRow {
    /// First segment of the run covered by the zone.
    pub start: u32,
    /// One past the last covered segment; zero covers the rest of the run.
    #[serde(default)]
    pub end: u32,
    pub kind: BoostKind,
    #[serde(default = "BoostRow::full_width")]
    pub lanes: (f32, f32),
    #[serde(default = "BoostRow::visible_default")]
    pub visible: bool,
}

impl BoostRow {
    fn full_width() -> (f32, f32) {
        (-1.0, 1.0)
    }

    fn visible_default() -> bool {
        true
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct TrackRow {
    pub kind: SegmentKind,
    pub length: u32,
    #[serde(default)]
    pub curve: f32,
    /// Elevation change in segment lengths.
    #[serde(default)]
    pub height: f32,
    /// Overrides the kind's easing of its primary quantity.
    #[serde(default)]
    pub easing: Option<Easing>,
    #[serde(default)]
    pub rail: Rail,
    #[serde(default)]
    pub boost: Option<BoostRow>,
    /// Lap gate on the first segment, with its time bonus.
    #[serde(default)]
    pub gate: Option<f32>,
    #[serde(default = "TrackRow::default_repeat")]
    pub repeat: u32,
}

impl TrackRow {
    fn default_repeat() -> u32 {
        1
    }

    pub fn new(kind: SegmentKind, length: u32) -> Self {
        Self {
            kind,
            length,
            curve: 0.0,
            height: 0.0,
            easing: None,
            rail: Rail::None,
            boost: None,
            gate: None,
            repeat: 1,
        }
    }

    fn easings(&self) -> (Easing, Easing) {
        let (curve, height) = (self.kind.curve_easing(), self.kind.height_easing());
        match (self.easing, self.kind) {
            (None, _) => (curve, height),
            (Some(e), SegmentKind::Straight | SegmentKind::Curve) => (e, height),
            (Some(e), _) => (curve, e),
        }
    }
}

/// Elevation and its first two derivatives along the track.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GroundProfile {
    pub y: f32,
    pub slope: f32,
    pub curvature: f32,
}

impl GroundProfile {
    /// Signed curvature of the elevation curve; negative over a crest.
    pub fn bend(&self) -> f32 {
        self.curvature / (1.0 + self.slope * self.slope).powf(1.5)
    }
}

/// Closed loop of fixed-length segments plus their cliff cross-sections.
#[derive(Clone, Debug)]
pub struct Track {
    segments: Vec<Segment>,
    segment_length: f32,
    pub cliffs: CliffSeries,
}

impl Track {
    pub fn from_rows(rows: &[TrackRow], segment_length: f32) -> Result<Self, LoadError> {
        let mut segments = Vec::new();
        let mut curve = 0.0;
        let mut height = 0.0;
        let mut next_zone = 0;
        for row in rows {
            let (curve_easing, height_easing) = row.easings();
            for _ in 0..row.repeat {
                if row.length == 0 {
                    continue;
                }
                let (curve_from, height_from) = (curve, height);
                let height_to = height_from + row.height * segment_length;
                let zone = row.boost.as_ref().map(|boost| {
                    next_zone += 1;
                    let end = if boost.end == 0 { row.length } else { boost.end };
                    (
                        boost.start..end.min(row.length),
                        BoostZone {
                            id: next_zone,
                            kind: boost.kind,
                            min: boost.lanes.0.min(boost.lanes.1),
                            max: boost.lanes.0.max(boost.lanes.1),
                            visible: boost.visible,
                        },
                    )
                });
                for i in 0..row.length {
                    let t = (i + 1) as f32 / row.length as f32;
                    curve = match row.kind {
                        SegmentKind::Arc => row.curve,
                        _ => curve_easing.lerp(curve_from, row.curve, t),
                    };
                    let y1 = height_easing.lerp(height_from, height_to, t);
                    let mut segment = Segment::new(segments.len(), curve, height, y1);
                    height = y1;
                    segment.features.rail = row.rail;
                    if let Some((span, zone)) = &zone {
                        if span.contains(&i) {
                            segment.features.boost_zones.push(*zone);
                        }
                    }
                    if i == 0 {
                        segment.features.gate = row.gate.map(|time_bonus| LapGate { time_bonus });
                    }
                    segments.push(segment);
                }
            }
        }
        if segments.is_empty() {
            return Err(LoadError::EmptyTrack);
        }
        let cliffs = CliffSeries::flat(segments.len());
        Ok(Self {
            segments,
            segment_length,
            cliffs,
        })
    }

    /// A level, straight loop.
    pub fn flat(segment_count: usize, segment_length: f32) -> Self {
        let segment_count = segment_count.max(1);
        Self {
            segments: (0..segment_count)
                .map(|i| Segment::new(i, 0.0, 0.0, 0.0))
                .collect(),
            segment_length,
            cliffs: CliffSeries::flat(segment_count),
        }
    }

    pub fn set_cliffs(&mut self, cliffs: CliffSeries) {
        if cliffs.sample_count() == self.cliffs.sample_count() {
            self.cliffs = cliffs;
        } else {
            log::warn!(
                "Cliff series has {} samples, expected {}",
                cliffs.sample_count(),
                self.cliffs.sample_count()
            );
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment_length(&self) -> f32 {
        self.segment_length
    }

    /// Total distance around the loop.
    pub fn length(&self) -> f32 {
        self.segments.len() as f32 * self.segment_length
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn wrap(&self, s: f32) -> f32 {
        let length = self.length();
        let wrapped = s.rem_euclid(length);
        // rem_euclid can round up to `length` for tiny negative inputs
        if wrapped >= length {
            0.0
        } else {
            wrapped
        }
    }

    /// Signed shortest distance from `from` to `to` around the loop.
    pub fn delta(&self, from: f32, to: f32) -> f32 {
        let length = self.length();
        let mut d = (to - from).rem_euclid(length);
        if d > 0.5 * length {
            d -= length;
        }
        d
    }

    pub fn index_of(&self, s: f32) -> usize {
        let index = (self.wrap(s) / self.segment_length) as usize;
        index.min(self.segments.len() - 1)
    }

    pub fn wrap_index(&self, index: i64) -> usize {
        index.rem_euclid(self.segments.len() as i64) as usize
    }

    pub fn segment_at(&self, index: i64) -> &Segment {
        &self.segments[self.wrap_index(index)]
    }

    pub fn segment_at_mut(&mut self, index: i64) -> &mut Segment {
        let index = self.wrap_index(index);
        &mut self.segments[index]
    }

    pub fn segment_at_distance(&self, s: f32) -> &Segment {
        &self.segments[self.index_of(s)]
    }

    /// Fraction of the way through its segment that `s` lies.
    pub fn fraction_of(&self, s: f32) -> f32 {
        let local = self.wrap(s) / self.segment_length;
        (local - local.floor()).clamp(0.0, 1.0)
    }

    pub fn elevation_at(&self, s: f32) -> f32 {
        let segment = self.segment_at_distance(s);
        let t = self.fraction_of(s);
        segment.y0 + (segment.y1 - segment.y0) * t
    }

    /// Elevation with symmetric finite-difference slope and curvature.
    pub fn ground_profile_at(&self, s: f32) -> GroundProfile {
        let h = self.segment_length;
        let y = self.elevation_at(s);
        let ahead = self.elevation_at(s + h);
        let behind = self.elevation_at(s - h);
        GroundProfile {
            y,
            slope: (ahead - behind) / (2.0 * h),
            curvature: (ahead - 2.0 * y + behind) / (h * h),
        }
    }

    /// Mean curvature over the next `count` segments after `s`.
    pub fn curve_ahead(&self, s: f32, count: u32) -> f32 {
        if count == 0 {
            return self.segment_at_distance(s).curve;
        }
        let base = self.index_of(s) as i64;
        let sum: f32 = (1..=count as i64)
            .map(|k| self.segment_at(base + k).curve)
            .sum();
        sum / count as f32
    }

    pub fn cliff_params_at(&self, segment: usize, t: f32) -> CliffParams {
        self.cliffs.params_at(segment, t)
    }

    /// Extra height of the cliff surface once `lateral` leaves the paved road.
    pub fn cliff_surface_height_at(&self, s: f32, lateral: f32) -> f32 {
        let beyond = lateral.abs() - 1.0;
        if beyond <= 0.0 {
            return 0.0;
        }
        let params = self.cliff_params_at(self.index_of(s), self.fraction_of(s));
        params.side(Side::of(lateral)).height_at(beyond)
    }

    /// Cliff rise per half-width at `lateral`, zero on the road.
    pub fn cliff_slope_at(&self, s: f32, lateral: f32) -> f32 {
        let beyond = lateral.abs() - 1.0;
        if beyond <= 0.0 {
            return 0.0;
        }
        let params = self.cliff_params_at(self.index_of(s), self.fraction_of(s));
        params.side(Side::of(lateral)).slope_at(beyond)
    }

    pub fn surface_height_at(&self, s: f32, lateral: f32) -> f32 {
        self.elevation_at(s) + self.cliff_surface_height_at(s, lateral)
    }

    /// Closes the elevation loop and smooths the cliff seam over `margin` segments.
    pub fn enforce_wrap_continuity(&mut self, margin: usize) {
        let count = self.segments.len();
        let mismatch = self.segments[count - 1].y1 - self.segments[0].y0;
        if mismatch != 0.0 {
            let span = margin.clamp(1, count);
            for k in 0..span {
                let segment = &mut self.segments[count - span + k];
                segment.y0 -= mismatch * Easing::SMOOTH.apply(k as f32 / span as f32);
                segment.y1 -= mismatch * Easing::SMOOTH.apply((k + 1) as f32 / span as f32);
            }
            self.segments[count - 1].y1 = self.segments[0].y0;
        }
        self.cliffs.enforce_wrap_continuity(margin);
    }

    /// Moves car `id` between per-segment lists.
    pub fn move_car(&mut self, id: usize, from: usize, to: usize) {
        if from == to {
            return;
        }
        self.segments[from].cars.retain(|&car| car != id);
        self.segments[to].cars.push(id);
    }

    pub fn move_sprite(&mut self, id: usize, from: usize, to: usize) {
        if from == to {
            return;
        }
        self.segments[from].sprites.retain(|&sprite| sprite != id);
        self.segments[to].sprites.push(id);
    }

    pub fn clear_entities(&mut self) {
        for segment in self.segments.iter_mut() {
            segment.cars.clear();
            segment.sprites.clear();
        }
    }
}

/// Clamps `lateral` into `bounds`, reporting whether the clamp engaged.
pub fn clamp_lateral(lateral: f32, bounds: &Range<f32>) -> (f32, bool) {
    let clamped = lateral.clamp(bounds.start, bounds.end);
    (clamped, clamped != lateral)
}

/// A 0..1 road-width ratio to lane units, -1 at the left edge and +1 at the right.
pub fn ratio_to_lane(ratio: f32) -> f32 {
    2.0 * ratio - 1.0
}

pub fn lateral_to_world(lateral: f32, road_width: f32) -> f32 {
    lateral * road_width
}

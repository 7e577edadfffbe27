use crate::easing::Easing;

/// Dense cross-section samples per segment.
pub const SAMPLES_PER_SEGMENT: usize = 4;

const MIN_EXTENT: f32 = 1.0e-4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn of(lateral: f32) -> Self {
        if lateral < 0.0 {
            Self::Left
        } else {
            Self::Right
        }
    }

    pub fn sign(self) -> f32 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }
}

/// One section of a cliff: lateral extent in road half-widths, rise in world units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CliffPoint {
    pub dx: f32,
    pub dy: f32,
}

impl CliffPoint {
    fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            dx: self.dx + (other.dx - self.dx) * t,
            dy: self.dy + (other.dy - self.dy) * t,
        }
    }
}

/// Silhouette of one side: section A starts at the road edge, B continues from A.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CliffProfile {
    pub a: CliffPoint,
    pub b: CliffPoint,
}

impl CliffProfile {
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            a: self.a.lerp(other.a, t),
            b: self.b.lerp(other.b, t),
        }
    }

    fn ease(&self, target: &Self, easing: Easing, t: f32) -> Self {
        self.lerp(target, easing.apply(t))
    }

    pub fn is_flat(&self) -> bool {
        self.a.dx.abs() < MIN_EXTENT && self.b.dx.abs() < MIN_EXTENT
    }

    /// Height of the surface `beyond` half-widths past the road edge.
    pub fn height_at(&self, beyond: f32) -> f32 {
        if beyond <= 0.0 {
            return 0.0;
        }
        if beyond <= self.a.dx {
            return self.a.dy * beyond / self.a.dx.max(MIN_EXTENT);
        }
        let rest = beyond - self.a.dx.max(0.0);
        let ratio = if self.b.dx > MIN_EXTENT {
            (rest / self.b.dx).min(1.0)
        } else {
            1.0
        };
        self.a.dy + self.b.dy * ratio
    }

    /// Rise per half-width of the section containing `beyond`.
    pub fn slope_at(&self, beyond: f32) -> f32 {
        if beyond <= 0.0 {
            0.0
        } else if beyond <= self.a.dx {
            self.a.dy / self.a.dx.max(MIN_EXTENT)
        } else if beyond <= self.a.dx.max(0.0) + self.b.dx {
            self.b.dy / self.b.dx.max(MIN_EXTENT)
        } else {
            0.0
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CliffParams {
    pub left: CliffProfile,
    pub right: CliffProfile,
}

impl CliffParams {
    pub fn side(&self, side: Side) -> &CliffProfile {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
pub enum CliffSide {
    Left,
    Right,
    Both,
}

impl CliffSide {
    fn covers(self, side: Side) -> bool {
        matches!(
            (self, side),
            (Self::Both, _) | (Self::Left, Side::Left) | (Self::Right, Side::Right)
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
pub enum CliffMode {
    /// Targets are deltas from the running offset.
    #[default]
    Relative,
    Absolute,
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct CliffRow {
    pub side: CliffSide,
    pub length: u32,
    #[serde(default)]
    pub easing: Easing,
    /// `(lateral, height)` of section A.
    #[serde(default)]
    pub a: (f32, f32),
    #[serde(default)]
    pub b: (f32, f32),
    #[serde(default)]
    pub mode: CliffMode,
    #[serde(default = "CliffRow::default_repeat")]
    pub repeat: u32,
}

impl CliffRow {
    fn default_repeat() -> u32 {
        1
    }

    fn target(&self, from: &CliffProfile) -> CliffProfile {
        let a = CliffPoint {
            dx: self.a.0,
            dy: self.a.1,
        };
        let b = CliffPoint {
            dx: self.b.0,
            dy: self.b.1,
        };
        match self.mode {
            CliffMode::Absolute => CliffProfile { a, b },
            CliffMode::Relative => CliffProfile {
                a: CliffPoint {
                    dx: from.a.dx + a.dx,
                    dy: from.a.dy + a.dy,
                },
                b: CliffPoint {
                    dx: from.b.dx + b.dx,
                    dy: from.b.dy + b.dy,
                },
            },
        }
    }
}

#[derive(Default)]
struct Cursor {
    profile: CliffProfile,
    position: usize,
}

/// Circular cross-section samples for both sides of the track.
#[derive(Clone, Debug)]
pub struct CliffSeries {
    left: Vec<CliffProfile>,
    right: Vec<CliffProfile>,
}

impl CliffSeries {
    pub fn flat(segment_count: usize) -> Self {
        let count = segment_count * SAMPLES_PER_SEGMENT;
        Self {
            left: vec![CliffProfile::default(); count],
            right: vec![CliffProfile::default(); count],
        }
    }

    /// Replays the rows into dense samples, chaining each row from the running offset.
    /// Samples past the last instruction hold the last written value.
    pub fn build(rows: &[CliffRow], segment_count: usize) -> Self {
        let mut series = Self::flat(segment_count);
        let total = series.sample_count();
        for side in [Side::Left, Side::Right] {
            let samples = series.side_mut(side);
            let mut cursor = Cursor::default();
            for row in rows.iter().filter(|row| row.side.covers(side)) {
                for _ in 0..row.repeat {
                    let count = row.length as usize * SAMPLES_PER_SEGMENT;
                    if count == 0 {
                        continue;
                    }
                    let target = row.target(&cursor.profile);
                    for k in 0..count {
                        let position = cursor.position + k;
                        if position >= total {
                            break;
                        }
                        let t = (k + 1) as f32 / count as f32;
                        samples[position] = cursor.profile.ease(&target, row.easing, t);
                    }
                    cursor.position += count;
                    cursor.profile = target;
                }
            }
            for sample in samples.iter_mut().skip(cursor.position) {
                *sample = cursor.profile;
            }
        }
        series
    }

    pub fn sample_count(&self) -> usize {
        self.left.len()
    }

    pub fn samples(&self, side: Side) -> &[CliffProfile] {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut Vec<CliffProfile> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// Blends head and tail toward their common midpoint so the loop seam is smooth.
    pub fn enforce_wrap_continuity(&mut self, margin_segments: usize) {
        let total = self.sample_count();
        let margin = (margin_segments * SAMPLES_PER_SEGMENT).min(total / 2);
        if margin == 0 {
            return;
        }
        for side in [Side::Left, Side::Right] {
            let samples = self.side_mut(side);
            let seam = samples[0].lerp(&samples[total - 1], 0.5);
            for j in 0..margin {
                let w = Easing::SMOOTH.apply((j + 1) as f32 / margin as f32);
                let tail = total - margin + j;
                samples[tail] = samples[tail].lerp(&seam, w);
                let head_w = 1.0 - Easing::SMOOTH.apply(j as f32 / margin as f32);
                samples[j] = samples[j].lerp(&seam, head_w);
            }
        }
    }

    /// Interpolated profile pair at fraction `t` of segment `segment`.
    pub fn params_at(&self, segment: usize, t: f32) -> CliffParams {
        let total = self.sample_count();
        if total == 0 {
            return CliffParams::default();
        }
        let position = (segment * SAMPLES_PER_SEGMENT) as f32
            + t.clamp(0.0, 1.0) * SAMPLES_PER_SEGMENT as f32;
        let i0 = position.floor() as usize % total;
        let i1 = (i0 + 1) % total;
        let f = position.fract();
        CliffParams {
            left: self.left[i0].lerp(&self.left[i1], f),
            right: self.right[i0].lerp(&self.right[i1], f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(side: CliffSide, length: u32, a: (f32, f32), b: (f32, f32)) -> CliffRow {
        CliffRow {
            side,
            length,
            easing: Easing::LINEAR,
            a,
            b,
            mode: CliffMode::Relative,
            repeat: 1,
        }
    }

    #[test]
    fn sample_count_matches_segments() {
        let series = CliffSeries::build(&[], 10);
        assert_eq!(series.sample_count(), 10 * SAMPLES_PER_SEGMENT);
        assert!(series.samples(Side::Left).iter().all(|p| p.is_flat()));
    }

    #[test]
    fn rows_chain_and_hold() {
        let rows = [
            row(CliffSide::Left, 2, (1.0, 400.0), (0.0, 0.0)),
            row(CliffSide::Left, 2, (1.0, 400.0), (2.0, -100.0)),
        ];
        let series = CliffSeries::build(&rows, 10);
        let left = series.samples(Side::Left);
        let end_first = left[2 * SAMPLES_PER_SEGMENT - 1];
        assert_eq!(end_first.a, CliffPoint { dx: 1.0, dy: 400.0 });
        let end_second = left[4 * SAMPLES_PER_SEGMENT - 1];
        assert_eq!(end_second.a, CliffPoint { dx: 2.0, dy: 800.0 });
        assert_eq!(end_second.b, CliffPoint { dx: 2.0, dy: -100.0 });
        // uncovered tail holds the last value
        assert_eq!(left[left.len() - 1], end_second);
        // the other side is untouched
        assert!(series.samples(Side::Right).iter().all(|p| p.is_flat()));
    }

    #[test]
    fn absolute_mode_ignores_cursor() {
        let mut second = row(CliffSide::Both, 1, (0.5, 50.0), (0.0, 0.0));
        second.mode = CliffMode::Absolute;
        let rows = [row(CliffSide::Both, 1, (3.0, 900.0), (0.0, 0.0)), second];
        let series = CliffSeries::build(&rows, 4);
        let p = series.params_at(1, 1.0);
        assert_eq!(p.right.a, CliffPoint { dx: 0.5, dy: 50.0 });
    }

    #[test]
    fn params_interpolate_within_segment() {
        let rows = [row(CliffSide::Right, 1, (1.0, 400.0), (0.0, 0.0))];
        let series = CliffSeries::build(&rows, 4);
        let start = series.params_at(0, 0.0).right.a.dy;
        let mid = series.params_at(0, 0.5).right.a.dy;
        let end = series.params_at(0, 1.0).right.a.dy;
        assert!(start < mid && mid < end, "{} {} {}", start, mid, end);
    }

    #[test]
    fn wrap_fixup_closes_seam() {
        let rows = [row(CliffSide::Both, 10, (2.0, 1000.0), (1.0, 500.0))];
        let mut series = CliffSeries::build(&rows, 10);
        let samples = series.samples(Side::Left);
        assert!((samples[samples.len() - 1].a.dy - samples[0].a.dy).abs() > 500.0);
        series.enforce_wrap_continuity(3);
        let samples = series.samples(Side::Left);
        let last = samples[samples.len() - 1];
        assert!((last.a.dy - samples[0].a.dy).abs() < 1e-3);
        assert!((last.b.dx - samples[0].b.dx).abs() < 1e-3);
    }

    #[test]
    fn profile_height_is_piecewise() {
        let profile = CliffProfile {
            a: CliffPoint { dx: 1.0, dy: 200.0 },
            b: CliffPoint { dx: 2.0, dy: 100.0 },
        };
        assert_eq!(profile.height_at(0.0), 0.0);
        assert_eq!(profile.height_at(0.5), 100.0);
        assert_eq!(profile.height_at(1.0), 200.0);
        assert_eq!(profile.height_at(2.0), 250.0);
        assert_eq!(profile.height_at(10.0), 300.0);
        assert_eq!(profile.slope_at(0.5), 200.0);
        assert_eq!(profile.slope_at(2.0), 50.0);
        assert_eq!(profile.slope_at(5.0), 0.0);
    }
}

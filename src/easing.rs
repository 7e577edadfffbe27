/// Shape of the easing polynomial.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
pub enum Family {
    #[default]
    Linear,
    /// Quadratic.
    Smooth,
    /// Cubic.
    Sharp,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
pub enum Mode {
    In,
    Out,
    #[default]
    InOut,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct Easing {
    pub family: Family,
    pub mode: Mode,
}

impl Easing {
    pub const LINEAR: Self = Self::new(Family::Linear, Mode::InOut);
    pub const SMOOTH: Self = Self::new(Family::Smooth, Mode::InOut);
    pub const SHARP: Self = Self::new(Family::Sharp, Mode::InOut);

    pub const fn new(family: Family, mode: Mode) -> Self {
        Self { family, mode }
    }

    /// Maps `t` in [0, 1] onto [0, 1]; monotonic for every family and mode.
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        let power = match self.family {
            Family::Linear => return t,
            Family::Smooth => 2,
            Family::Sharp => 3,
        };
        match self.mode {
            Mode::In => t.powi(power),
            Mode::Out => 1.0 - (1.0 - t).powi(power),
            Mode::InOut => {
                if t < 0.5 {
                    0.5 * (2.0 * t).powi(power)
                } else {
                    1.0 - 0.5 * (2.0 - 2.0 * t).powi(power)
                }
            }
        }
    }

    /// Interpolates from `from` to `to` at eased position `t`.
    pub fn lerp(&self, from: f32, to: f32, t: f32) -> f32 {
        from + (to - from) * self.apply(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Easing; 9] = [
        Easing::new(Family::Linear, Mode::In),
        Easing::new(Family::Linear, Mode::Out),
        Easing::new(Family::Linear, Mode::InOut),
        Easing::new(Family::Smooth, Mode::In),
        Easing::new(Family::Smooth, Mode::Out),
        Easing::new(Family::Smooth, Mode::InOut),
        Easing::new(Family::Sharp, Mode::In),
        Easing::new(Family::Sharp, Mode::Out),
        Easing::new(Family::Sharp, Mode::InOut),
    ];

    #[test]
    fn endpoints_are_fixed() {
        for easing in ALL {
            assert_eq!(easing.apply(0.0), 0.0, "{:?}", easing);
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-6, "{:?}", easing);
        }
    }

    #[test]
    fn monotonic() {
        for easing in ALL {
            let mut last = 0.0;
            for i in 0..=100 {
                let v = easing.apply(i as f32 / 100.0);
                assert!(v + 1e-6 >= last, "{:?} decreased at {}", easing, i);
                last = v;
            }
        }
    }

    #[test]
    fn in_out_is_symmetric() {
        let e = Easing::SHARP;
        assert!((e.apply(0.5) - 0.5).abs() < 1e-6);
        assert!((e.apply(0.25) + e.apply(0.75) - 1.0).abs() < 1e-6);
    }
}

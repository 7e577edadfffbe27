use nalgebra::Point2;

use crate::config::{self, Config};
use crate::physics::Vehicle;
use crate::track::{self, Track};

const MIN_SMOOTH_TIME: f32 = 1.0e-4;

/// Critically damped spring toward `target`, stable for any `dt`.
pub fn smooth_damp(current: f32, target: f32, speed: &mut f32, smooth_time: f32, dt: f32) -> f32 {
    let omega = 2.0 / smooth_time.max(MIN_SMOOTH_TIME);
    let x = omega * dt;
    let decay = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);
    let change = current - target;
    let temp = (*speed + omega * change) * dt;
    *speed = (*speed - omega * temp) * decay;
    let next = target + (change + temp) * decay;
    if (target > current) == (next > target) && next != target {
        *speed = 0.0;
        return target;
    }
    next
}

/// Smoothed height and roll that trail the player between frames.
#[derive(Clone, Debug, Default)]
pub struct CameraRig {
    pub y: f32,
    y_speed: f32,
    pub roll: f32,
    roll_speed: f32,
    settled: bool,
}

impl CameraRig {
    /// Jump straight to the target on the next update.
    pub fn snap(&mut self) {
        self.settled = false;
    }

    pub fn update(&mut self, config: &config::Camera, track: &Track, player: &Vehicle, dt: f32) {
        let mut target = player.y + config.height;
        if player.grounded {
            let behind = player.s - config.trailing_segments * track.segment_length();
            let floor = track.surface_height_at(behind, player.n) + config.height;
            target += (floor - target) * config.floor_blend;
        }
        let tilt = -config.roll_steer * player.steer_rate - config.roll_curve * track.curve_ahead(player.s, 3);
        let roll_target = tilt.clamp(-config.roll_max, config.roll_max);
        if !self.settled {
            self.settled = true;
            self.y = target;
            self.y_speed = 0.0;
            self.roll = roll_target;
            self.roll_speed = 0.0;
            return;
        }
        self.y = smooth_damp(self.y, target, &mut self.y_speed, config.smooth_time, dt);
        self.roll = smooth_damp(self.roll, roll_target, &mut self.roll_speed, config.roll_smooth_time, dt);
    }

    pub fn frame(&self, config: &Config, track: &Track, player: &Vehicle, width: u32, height: u32) -> CameraFrame {
        let camera = &config.camera;
        let half_width = 0.5 * width as f32;
        let half_height = 0.5 * height as f32;
        CameraFrame {
            pos: nalgebra::Vector3::new(
                track::lateral_to_world(player.n, config.lanes.road_width),
                self.y,
                player.s - camera.trailing_segments * track.segment_length(),
            ),
            depth: 1.0 / (0.5 * camera.fov.to_radians()).tan(),
            near_z: camera.near_z,
            half_width,
            half_height,
            roll: self.roll,
            pivot: Point2::new(half_width, height as f32 * camera.roll_pivot),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projected {
    pub point: Point2<f32>,
    /// `depth / z`; multiply world sizes by this and `half_width` for pixels.
    pub scale: f32,
    pub z: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CameraFrame {
    /// Lateral world x, height, and unwrapped track distance.
    pub pos: nalgebra::Vector3<f32>,
    pub depth: f32,
    pub near_z: f32,
    pub half_width: f32,
    pub half_height: f32,
    pub roll: f32,
    pub pivot: Point2<f32>,
}

impl CameraFrame {
    pub fn project(&self, world: nalgebra::Vector3<f32>) -> Option<Projected> {
        let rel = world - self.pos;
        if rel.z <= self.near_z {
            return None;
        }
        let scale = self.depth / rel.z;
        Some(Projected {
            point: Point2::new(
                self.half_width * (1.0 + scale * rel.x),
                self.half_height - scale * rel.y * self.half_height,
            ),
            scale,
            z: rel.z,
        })
    }

    /// Pixels covered by `size` world units at `scale`.
    pub fn pixels(&self, size: f32, scale: f32) -> f32 {
        size * scale * self.half_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> CameraFrame {
        CameraFrame {
            pos: nalgebra::Vector3::new(0.0, 1000.0, 0.0),
            depth: 1.0,
            near_z: 10.0,
            half_width: 320.0,
            half_height: 240.0,
            roll: 0.0,
            pivot: Point2::new(320.0, 400.0),
        }
    }

    #[test]
    fn projects_through_the_view_center() {
        let frame = frame();
        let ahead = frame.project(nalgebra::Vector3::new(0.0, 1000.0, 500.0)).unwrap();
        assert_eq!(ahead.point, Point2::new(320.0, 240.0));
        let below = frame.project(nalgebra::Vector3::new(500.0, 0.0, 1000.0)).unwrap();
        assert_eq!(below.scale, 1.0e-3);
        assert_eq!(below.point, Point2::new(480.0, 480.0));
        assert!(frame.project(nalgebra::Vector3::new(0.0, 0.0, 10.0)).is_none());
        assert!(frame.project(nalgebra::Vector3::new(0.0, 0.0, -50.0)).is_none());
    }

    #[test]
    fn smooth_damp_settles_without_overshoot() {
        let mut speed = 0.0;
        let mut value = 0.0;
        for _ in 0..240 {
            value = smooth_damp(value, 100.0, &mut speed, 0.2, 1.0 / 60.0);
            assert!(value <= 100.0);
        }
        assert!((value - 100.0).abs() < 0.01);
    }

    #[test]
    fn roll_is_clamped() {
        let config = Config::default();
        let track = Track::flat(10, 200.0);
        let mut player = Vehicle::new(0.0, 0.0, 0.0);
        player.steer_rate = -1000.0;
        let mut rig = CameraRig::default();
        rig.update(&config.camera, &track, &player, 1.0 / 60.0);
        assert_eq!(rig.roll, config.camera.roll_max);
        assert_eq!(rig.y, config.camera.height);
    }
}

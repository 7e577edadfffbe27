use crate::cliff::Side;
use crate::config::{self, Config};
use crate::input::Intent;
use crate::track::{self, BoostKind, Track};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DriftPhase {
    #[default]
    Idle,
    Drifting {
        direction: i8,
    },
}

/// Drift sub-state of the vehicle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Drift {
    pub phase: DriftPhase,
    pub charge: f32,
    /// Set once `charge` reaches the threshold; releasing then grants a boost.
    pub allowed_boost: bool,
    /// Steer direction captured at launch, 0 when none.
    pub pending: i8,
}

impl Drift {
    pub fn is_drifting(&self) -> bool {
        matches!(self.phase, DriftPhase::Drifting { .. })
    }

    pub fn direction(&self) -> i8 {
        match self.phase {
            DriftPhase::Drifting { direction } => direction,
            DriftPhase::Idle => 0,
        }
    }

    pub fn cancel(&mut self) {
        *self = Self::default();
    }

    pub fn launch(&mut self, hop_held: bool, steer: i8) {
        let direction = match self.phase {
            DriftPhase::Drifting { direction } => direction,
            DriftPhase::Idle => steer,
        };
        self.pending = if hop_held { direction } else { 0 };
    }

    pub fn land(&mut self, hop_held: bool) {
        let pending = self.pending;
        *self = Self::default();
        if hop_held && pending != 0 {
            self.phase = DriftPhase::Drifting { direction: pending };
        }
    }

    /// Charges while the gesture is held. Returns true when an armed drift is released.
    pub fn update(&mut self, dt: f32, hop_held: bool, steer: i8, threshold: f32) -> bool {
        if !self.is_drifting() {
            return false;
        }
        if !hop_held || steer == 0 {
            let armed = self.allowed_boost;
            *self = Self::default();
            return armed;
        }
        self.charge = (self.charge + dt).min(threshold);
        if self.charge >= threshold {
            self.allowed_boost = true;
        }
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoostSource {
    Manual,
    Zone,
    Jump,
    Drift,
}

/// What happened during one physics step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepEvents {
    pub launched: bool,
    pub hopped: bool,
    pub landed: bool,
    pub boost: Option<BoostSource>,
    /// Side of a guardrail the lane clamp pushed against.
    pub rail: Option<Side>,
}

#[derive(Clone, Debug)]
pub struct Vehicle {
    pub s: f32,
    pub n: f32,
    pub y: f32,
    pub grounded: bool,
    /// Tangential speed while grounded.
    pub v: f32,
    pub vx: f32,
    pub vy: f32,
    pub next_hop_time: f64,
    pub manual_boost_ready: f64,
    pub boost_timer: f32,
    pub boost_flash: f32,
    pub drift: Drift,
    /// Boost zone the vehicle is currently inside.
    pub zone: Option<u32>,
    /// Lateral rate of the last step, in half-widths per second.
    pub steer_rate: f32,
    pub slope: f32,
    pub airtime: f32,
    pub rail_contact: bool,
    pub last_rail_hit: f64,
    pub last_hit: f64,
    hop_held: bool,
    boost_held: bool,
}

impl Vehicle {
    pub fn new(s: f32, n: f32, y: f32) -> Self {
        Self {
            s,
            n,
            y,
            grounded: true,
            v: 0.0,
            vx: 0.0,
            vy: 0.0,
            next_hop_time: 0.0,
            manual_boost_ready: 0.0,
            boost_timer: 0.0,
            boost_flash: 0.0,
            drift: Drift::default(),
            zone: None,
            steer_rate: 0.0,
            slope: 0.0,
            airtime: 0.0,
            rail_contact: false,
            last_rail_hit: f64::NEG_INFINITY,
            last_hit: f64::NEG_INFINITY,
            hop_held: false,
            boost_held: false,
        }
    }

    /// Speed along the track, whichever mode the vehicle is in.
    pub fn forward_speed(&self) -> f32 {
        if self.grounded {
            self.v
        } else {
            self.vx
        }
    }

    pub fn set_forward_speed(&mut self, speed: f32) {
        if self.grounded {
            self.v = speed;
        } else {
            self.vx = speed;
        }
    }

    pub fn is_boosting(&self) -> bool {
        self.boost_timer > 0.0
    }

    pub fn top_speed(&self, physics: &config::Physics) -> f32 {
        if self.is_boosting() {
            physics.top_speed * physics.boost_multiplier
        } else {
            physics.top_speed
        }
    }

    /// Timed top-speed multiplier plus an immediate impulse.
    pub fn grant_boost(&mut self, physics: &config::Physics, duration: f32) {
        self.boost_timer = self.boost_timer.max(duration);
        self.boost_flash = physics.boost_flash;
        let top = physics.top_speed * physics.boost_multiplier;
        if self.grounded {
            self.v = (self.v + physics.boost_impulse).min(top);
        } else {
            self.vx = (self.vx + physics.boost_impulse).min(top);
        }
    }

    /// Leaves the ground along the tangent of `slope`, adding `lift` upward.
    pub fn launch(&mut self, slope: f32, lift: f32, hop_held: bool, steer: i8) {
        let cos = 1.0 / (1.0 + slope * slope).sqrt();
        self.vx = self.v * cos;
        self.vy = self.v * slope * cos + lift;
        self.grounded = false;
        self.airtime = 0.0;
        self.drift.launch(hop_held, steer);
    }

    /// Puts the vehicle back on the road, keeping cooldown timestamps.
    pub fn respawn(&mut self, s: f32, n: f32, y: f32) {
        *self = Self {
            next_hop_time: self.next_hop_time,
            manual_boost_ready: self.manual_boost_ready,
            last_rail_hit: self.last_rail_hit,
            last_hit: self.last_hit,
            ..Self::new(s, n, y)
        };
    }
}

fn tangent(slope: f32) -> (f32, f32) {
    let cos = 1.0 / (1.0 + slope * slope).sqrt();
    (cos, slope * cos)
}

/// Clamps `n` into the drivable band; guardrails narrow it to the paved road.
fn clamp_to_lanes(vehicle: &mut Vehicle, track: &Track, lanes: &config::Lanes, half_width: f32) -> Option<Side> {
    let rail = track.segment_at_distance(vehicle.s).features.rail;
    let inset = half_width.clamp(0.0, 0.9);
    let low = if rail.guards(Side::Left) {
        -1.0 + inset
    } else {
        lanes.bounds.start
    };
    let high = if rail.guards(Side::Right) {
        1.0 - inset
    } else {
        lanes.bounds.end
    };
    let (n, clamped) = track::clamp_lateral(vehicle.n, &(low.min(high)..high.max(low)));
    vehicle.n = n;
    let side = Side::of(n);
    (clamped && rail.guards(side)).then_some(side)
}

/// Advances the vehicle by one fixed step of `config.physics.dt`.
pub fn step(
    vehicle: &mut Vehicle,
    track: &Track,
    config: &Config,
    intent: &Intent,
    time: f64,
    half_width: f32,
) -> StepEvents {
    profiling::scope!("physics::step");
    let mut events = StepEvents::default();
    if track.is_empty() {
        return events;
    }
    let p = &config.physics;
    let dt = p.dt;
    let steer = intent.steer_direction();
    let speed_fraction = (vehicle.forward_speed() / p.top_speed.max(1.0)).clamp(-1.0, 1.0);

    let prev_n = vehicle.n;
    let was_above = vehicle.y >= track.surface_height_at(vehicle.s, prev_n) - p.landing_tolerance;
    let drift_factor = match vehicle.drift.phase {
        DriftPhase::Drifting { direction } if direction == steer => p.drift_steer_with,
        DriftPhase::Drifting { .. } => p.drift_steer_against,
        DriftPhase::Idle => 1.0,
    };
    let grip = if vehicle.grounded { 1.0 } else { p.air_steer };
    vehicle.n += p.steer_rate * speed_fraction.abs() * intent.steer * drift_factor * grip * dt;
    vehicle.n -= p.path_correction * track.curve_ahead(vehicle.s, p.path_lookahead) * speed_fraction * dt;
    if vehicle.grounded && vehicle.n.abs() > 1.0 {
        let steepness =
            track.cliff_slope_at(vehicle.s, vehicle.n).abs() / config.lanes.road_width.max(track::MIN_ROAD_WIDTH);
        let push = (p.cliff_push * steepness * dt).min(p.cliff_push_cap);
        vehicle.n -= vehicle.n.signum() * push;
    }
    events.rail = clamp_to_lanes(vehicle, track, &config.lanes, half_width);
    if !vehicle.grounded {
        // a cliff face rising above the car stops sideways motion in the air
        let reach = vehicle.y + p.landing_tolerance;
        if track.surface_height_at(vehicle.s, vehicle.n) > reach && track.surface_height_at(vehicle.s, prev_n) <= reach {
            vehicle.n = prev_n;
        }
    }
    vehicle.steer_rate = (vehicle.n - prev_n) / dt;

    vehicle.boost_timer = (vehicle.boost_timer - dt).max(0.0);
    vehicle.boost_flash = (vehicle.boost_flash - dt).max(0.0);
    if intent.boost && !vehicle.boost_held && time >= vehicle.manual_boost_ready {
        vehicle.manual_boost_ready = time + p.manual_boost_cooldown as f64;
        vehicle.grant_boost(p, p.manual_boost_duration);
        events.boost = Some(BoostSource::Manual);
    }
    vehicle.boost_held = intent.boost;
    let hop_pressed = intent.hop && !vehicle.hop_held;
    vehicle.hop_held = intent.hop;

    if vehicle.grounded {
        drive(vehicle, track, p, intent, steer, time, hop_pressed, &mut events);
    } else {
        fly(vehicle, track, p, intent, was_above, &mut events);
    }
    vehicle.s = track.wrap(vehicle.s);
    events
}

#[allow(clippy::too_many_arguments)]
fn drive(
    vehicle: &mut Vehicle,
    track: &Track,
    p: &config::Physics,
    intent: &Intent,
    steer: i8,
    time: f64,
    hop_pressed: bool,
    events: &mut StepEvents,
) {
    let dt = p.dt;
    let ground = track.ground_profile_at(vehicle.s);
    let (cos, sin) = tangent(ground.slope);
    let top = vehicle.top_speed(p);
    let before = vehicle.v;
    let mut accel = intent.throttle * p.accel - intent.brake * p.brake - p.gravity * sin - p.roll_drag * before;
    if vehicle.n.abs() > 1.0 {
        accel -= p.off_road_drag * before;
    }
    let coasting = intent.throttle == 0.0 && intent.brake == 0.0 && before != 0.0;
    if coasting {
        accel -= p.coast_decel * before.signum();
    }
    let mut v = before + accel * dt;
    if coasting && v.signum() != before.signum() {
        v = 0.0;
    }
    vehicle.v = v.clamp(-top, top);
    vehicle.s += vehicle.v * cos * dt;
    vehicle.slope = ground.slope;

    if hop_pressed && time >= vehicle.next_hop_time {
        vehicle.next_hop_time = time + p.hop_cooldown as f64;
        vehicle.launch(ground.slope, p.hop_impulse, intent.hop, steer);
        events.hopped = true;
        events.launched = true;
        return;
    }

    let zone = track
        .segment_at_distance(vehicle.s)
        .features
        .boost_zones
        .iter()
        .find(|zone| zone.contains(vehicle.n))
        .copied();
    match zone {
        Some(zone) if vehicle.zone != Some(zone.id) => {
            vehicle.zone = Some(zone.id);
            vehicle.grant_boost(p, p.zone_boost_duration);
            match zone.kind {
                BoostKind::Drive => events.boost = Some(BoostSource::Zone),
                BoostKind::Jump => {
                    events.boost = Some(BoostSource::Jump);
                    events.launched = true;
                    vehicle.launch(ground.slope, p.jump_impulse, intent.hop, steer);
                    return;
                }
            }
        }
        Some(_) => {}
        None => vehicle.zone = None,
    }

    if vehicle.drift.update(dt, intent.hop, steer, p.drift_charge_threshold) {
        vehicle.grant_boost(p, p.drift_boost_duration);
        events.boost = Some(BoostSource::Drift);
    }

    // leave the ground when gravity cannot hold the car on a crest
    let ahead = track.ground_profile_at(vehicle.s);
    let bend = ahead.bend();
    let (cos_ahead, _) = tangent(ahead.slope);
    if bend < 0.0 && vehicle.v * vehicle.v * -bend > p.gravity * cos_ahead {
        vehicle.launch(ahead.slope, 0.0, intent.hop, steer);
        events.launched = true;
        return;
    }
    vehicle.y = track.surface_height_at(vehicle.s, vehicle.n);
}

/// `was_above` tells whether the car started the step on or over the surface under it.
fn fly(vehicle: &mut Vehicle, track: &Track, p: &config::Physics, intent: &Intent, was_above: bool, events: &mut StepEvents) {
    let dt = p.dt;
    vehicle.vy -= p.gravity * dt;
    vehicle.vx -= p.air_drag * vehicle.vx * dt;
    vehicle.s += vehicle.vx * dt;
    vehicle.y += vehicle.vy * dt;
    vehicle.airtime += dt;

    let ground = track.ground_profile_at(vehicle.s);
    let surface = ground.y + track.cliff_surface_height_at(vehicle.s, vehicle.n);
    // vertical speed measured against the ground tangent
    let closing = vehicle.vy - ground.slope * vehicle.vx;
    if was_above && vehicle.y <= surface && closing <= p.landing_tolerance {
        let (cos, _) = tangent(ground.slope);
        let top = vehicle.top_speed(p);
        vehicle.v = ((vehicle.vx + vehicle.vy * ground.slope) * cos).clamp(-top, top);
        vehicle.vx = 0.0;
        vehicle.vy = 0.0;
        vehicle.y = surface;
        vehicle.slope = ground.slope;
        vehicle.grounded = true;
        vehicle.drift.land(intent.hop);
        events.landed = true;
    }
}

/// True once an airborne vehicle has dropped well below the surface under it.
pub fn fell_through(vehicle: &Vehicle, track: &Track, physics: &config::Physics) -> bool {
    !vehicle.grounded && vehicle.y < track.surface_height_at(vehicle.s, vehicle.n) - physics.fall_threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cliff::{CliffRow, CliffSeries};
    use crate::track::{BoostRow, SegmentKind, TrackRow};

    fn with_left_cliff(rows: &str) -> Track {
        let mut track = Track::flat(100, 200.0);
        let rows: Vec<CliffRow> = ron::de::from_str(rows).unwrap();
        track.set_cliffs(CliffSeries::build(&rows, track.len()));
        track
    }

    fn held(steer: f32, hop: bool) -> Intent {
        Intent {
            throttle: 1.0,
            steer,
            hop,
            ..Default::default()
        }
    }

    #[test]
    fn drift_charge_caps_and_arms_once() {
        let mut drift = Drift::default();
        drift.launch(true, 1);
        drift.land(true);
        assert_eq!(drift.phase, DriftPhase::Drifting { direction: 1 });

        let threshold = 0.8;
        let mut armed_at = None;
        for tick in 0..40 {
            assert!(!drift.update(0.1, true, 1, threshold));
            assert!(drift.charge <= threshold);
            if drift.allowed_boost && armed_at.is_none() {
                armed_at = Some(tick);
                assert_eq!(drift.charge, threshold);
            }
            if armed_at.is_some() {
                assert!(drift.allowed_boost);
            } else {
                assert!(drift.charge < threshold);
            }
        }
        assert!(armed_at.is_some());
        // releasing hop grants the boost and resets
        assert!(drift.update(0.1, false, 1, threshold));
        assert_eq!(drift, Drift::default());
    }

    #[test]
    fn unarmed_release_grants_nothing() {
        let mut drift = Drift::default();
        drift.launch(true, -1);
        drift.land(true);
        assert!(!drift.update(0.1, true, -1, 1.0));
        assert!(!drift.update(0.1, true, 0, 1.0));
        assert!(!drift.is_drifting());
    }

    #[test]
    fn landing_without_hop_stays_idle() {
        let mut drift = Drift::default();
        drift.launch(true, 1);
        drift.land(false);
        assert!(!drift.is_drifting());
        drift.launch(false, 1);
        drift.land(true);
        assert!(!drift.is_drifting());
    }

    #[test]
    fn hop_lands_into_a_drift() {
        let config = Config::default();
        let track = Track::flat(10, config.track.segment_length);
        let mut vehicle = Vehicle::new(0.0, 0.0, 0.0);
        vehicle.v = 5000.0;
        let mut time = 0.0;
        let mut events = Vec::new();
        for _ in 0..120 {
            events.push(step(&mut vehicle, &track, &config, &held(1.0, true), time, 0.1));
            time += config.physics.dt as f64;
        }
        assert!(events[0].hopped);
        // holding the key does not hop again
        assert_eq!(events.iter().filter(|e| e.hopped).count(), 1);
        assert!(events.iter().any(|e| e.landed));
        assert!(vehicle.grounded);
        assert_eq!(vehicle.drift.direction(), 1);
    }

    #[test]
    fn manual_boost_respects_cooldown() {
        let config = Config::default();
        let track = Track::flat(10, config.track.segment_length);
        let mut vehicle = Vehicle::new(0.0, 0.0, 0.0);
        let press = Intent {
            boost: true,
            ..Default::default()
        };
        let release = Intent::default();
        let dt = config.physics.dt as f64;
        let first = step(&mut vehicle, &track, &config, &press, 0.0, 0.1);
        assert_eq!(first.boost, Some(BoostSource::Manual));
        assert!(vehicle.is_boosting());
        step(&mut vehicle, &track, &config, &release, dt, 0.1);
        let early = step(&mut vehicle, &track, &config, &press, 2.0 * dt, 0.1);
        assert_eq!(early.boost, None);
        step(&mut vehicle, &track, &config, &release, 3.0 * dt, 0.1);
        let later = config.physics.manual_boost_cooldown as f64 + dt;
        let again = step(&mut vehicle, &track, &config, &press, later, 0.1);
        assert_eq!(again.boost, Some(BoostSource::Manual));
    }

    #[test]
    fn crest_throws_the_car_and_it_lands() {
        let config = Config::default();
        let mut up = TrackRow::new(SegmentKind::Hill, 10);
        up.height = 6.0;
        let mut down = TrackRow::new(SegmentKind::Hill, 10);
        down.height = -6.0;
        let track = Track::from_rows(&[up, down], config.track.segment_length).unwrap();
        let mut vehicle = Vehicle::new(0.0, 0.0, 0.0);
        vehicle.v = config.physics.top_speed;
        let mut launched = false;
        let mut landed = false;
        let mut time = 0.0;
        for _ in 0..600 {
            let events = step(&mut vehicle, &track, &config, &held(0.0, false), time, 0.1);
            launched |= events.launched;
            landed |= launched && events.landed;
            assert!(!fell_through(&vehicle, &track, &config.physics));
            time += config.physics.dt as f64;
        }
        assert!(launched);
        assert!(landed);
    }

    #[test]
    fn airborne_car_is_stopped_by_a_cliff_face() {
        let config = Config::default();
        let track = with_left_cliff("[(side: Left, length: 1, mode: Absolute, a: (0.3, 3000.0))]");
        let tolerance = config.physics.landing_tolerance;
        let mut vehicle = Vehicle::new(1000.0, -0.9, 0.0);
        vehicle.v = 6000.0;
        let mut time = 0.0;
        let mut hopped = false;
        let mut landed = false;
        for tick in 0..120 {
            let intent = Intent {
                throttle: 1.0,
                steer: -1.0,
                hop: tick == 0,
                ..Default::default()
            };
            let events = step(&mut vehicle, &track, &config, &intent, time, 0.1);
            hopped |= events.hopped;
            landed |= hopped && events.landed;
            assert!(!fell_through(&vehicle, &track, &config.physics));
            let surface = track.surface_height_at(vehicle.s, vehicle.n);
            assert!(vehicle.y >= surface - 2.0 * tolerance, "tick {}: y={} surface={}", tick, vehicle.y, surface);
            time += config.physics.dt as f64;
        }
        assert!(hopped);
        assert!(landed);
    }

    #[test]
    fn cliff_push_is_capped_per_step() {
        let config = Config::default();
        let cap = config.physics.cliff_push_cap;
        let idle = Intent::default();

        let steep = with_left_cliff("[(side: Left, length: 1, mode: Absolute, a: (0.3, 3000.0))]");
        let mut vehicle = Vehicle::new(1000.0, -1.2, 0.0);
        step(&mut vehicle, &steep, &config, &idle, 0.0, 0.1);
        assert!((vehicle.n - (-1.2 + cap)).abs() < 1e-5);

        let gentle = with_left_cliff("[(side: Left, length: 1, mode: Absolute, a: (1.0, 200.0))]");
        let mut vehicle = Vehicle::new(1000.0, -1.2, 0.0);
        step(&mut vehicle, &gentle, &config, &idle, 0.0, 0.1);
        let push = vehicle.n + 1.2;
        assert!(push > 0.0 && push < cap, "push {}", push);

        let open = Track::flat(100, 200.0);
        let mut vehicle = Vehicle::new(1000.0, -1.2, 0.0);
        step(&mut vehicle, &open, &config, &idle, 0.0, 0.1);
        assert_eq!(vehicle.n, -1.2);
    }

    #[test]
    fn jump_zone_launches_and_boosts_once() {
        let config = Config::default();
        let mut ramp = TrackRow::new(SegmentKind::Straight, 40);
        ramp.boost = Some(BoostRow {
            start: 0,
            end: 0,
            kind: BoostKind::Jump,
            lanes: (-1.0, 1.0),
            visible: true,
        });
        let rows = [
            TrackRow::new(SegmentKind::Straight, 5),
            ramp,
            TrackRow::new(SegmentKind::Straight, 20),
        ];
        let track = Track::from_rows(&rows, config.track.segment_length).unwrap();
        let zone_end = 45.0 * config.track.segment_length;
        let mut vehicle = Vehicle::new(900.0, 0.0, 0.0);
        vehicle.v = 4000.0;
        let mut time = 0.0;
        let mut all = Vec::new();
        for _ in 0..80 {
            all.push(step(&mut vehicle, &track, &config, &held(0.0, false), time, 0.1));
            time += config.physics.dt as f64;
        }
        let jumps = all.iter().filter(|e| e.boost == Some(BoostSource::Jump)).count();
        assert_eq!(jumps, 1);
        assert_eq!(all.iter().filter(|e| e.launched).count(), 1);
        assert!(all.iter().any(|e| e.landed));
        // landed back inside the same zone without another grant
        assert!(vehicle.grounded);
        assert!(vehicle.s < zone_end);
        assert!(vehicle.zone.is_some());
    }

    #[test]
    fn guardrail_clamps_to_the_paved_edge() {
        let config = Config::default();
        let mut row = TrackRow::new(SegmentKind::Straight, 10);
        row.rail = track::Rail::Both;
        let track = Track::from_rows(&[row], config.track.segment_length).unwrap();
        let mut vehicle = Vehicle::new(0.0, 0.95, 0.0);
        vehicle.v = 6000.0;
        let events = step(&mut vehicle, &track, &config, &held(1.0, false), 0.0, 0.1);
        assert_eq!(events.rail, Some(Side::Right));
        assert!((vehicle.n - 0.9).abs() < 1e-6);
    }
}

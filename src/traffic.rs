use std::ops::Range;

use rand::{Rng as _, SeedableRng as _};

use crate::config::{Config, NpcCategory};
use crate::physics::Vehicle;
use crate::sprite::Catalog;
use crate::Track;

#[derive(Clone, Debug)]
pub struct NpcCar {
    pub def: usize,
    pub category: NpcCategory,
    pub s: f32,
    pub n: f32,
    pub speed: f32,
    /// In road half-widths.
    pub half_width: f32,
    pub push_s: f32,
    pub push_n: f32,
    pub segment: usize,
    pub last_hit: f64,
    pub near_miss_ready: bool,
}

fn sample(rng: &mut rand_pcg::Pcg32, range: &Range<f32>) -> f32 {
    if range.start < range.end {
        rng.random_range(range.clone())
    } else {
        range.start
    }
}

/// Scatters `config.traffic.count` cars around the loop and registers them with their segments.
pub fn spawn(config: &Config, catalog: &Catalog, track: &mut Track) -> Vec<NpcCar> {
    let kinds = config
        .traffic
        .cars
        .iter()
        .filter_map(|car| match catalog.find(&car.sprite) {
            Some(def) => Some((def, car)),
            None => {
                log::warn!("Traffic sprite '{}' is not in the catalog", car.sprite);
                None
            }
        })
        .collect::<Vec<_>>();
    if kinds.is_empty() || track.is_empty() {
        return Vec::new();
    }

    let mut rng = rand_pcg::Pcg32::seed_from_u64(config.traffic.seed);
    let road_width = config.lanes.road_width;
    let mut cars = Vec::with_capacity(config.traffic.count);
    for id in 0..config.traffic.count {
        let (def, kind) = kinds[rng.random_range(0..kinds.len())];
        let s = track.wrap(rng.random::<f32>() * track.length());
        let segment = track.index_of(s);
        track.segment_at_mut(segment as i64).cars.push(id);
        cars.push(NpcCar {
            def,
            category: kind.category,
            s,
            n: sample(&mut rng, &config.lanes.npc_bounds),
            speed: sample(&mut rng, &kind.speed),
            half_width: catalog.def(def).map_or(0.0, |def| def.half_width(1.0, road_width)),
            push_s: 0.0,
            push_n: 0.0,
            segment,
            last_hit: f64::NEG_INFINITY,
            near_miss_ready: true,
        });
    }
    log::info!("Spawned {} traffic cars", cars.len());
    cars
}

fn away(dn: f32) -> f32 {
    if dn >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// Lateral steering for car `index`: dodge slower traffic ahead, else return into the NPC band.
fn avoidance(index: usize, cars: &[NpcCar], player: &Vehicle, player_half_width: f32, track: &Track, config: &Config) -> f32 {
    let traffic = &config.traffic;
    let me = &cars[index];
    let segment_length = track.segment_length();
    let reach = traffic.look_ahead as f32 * segment_length;
    let dodge = |gap: f32, other_n: f32, other_speed: f32, other_half_width: f32| -> Option<f32> {
        if gap <= 0.0 || gap > reach || other_speed >= me.speed {
            return None;
        }
        let dn = me.n - other_n;
        if dn.abs() >= me.half_width + other_half_width {
            return None;
        }
        let urgency = (me.speed - other_speed) / me.speed.max(1.0);
        Some(away(dn) * traffic.avoid_strength * urgency * segment_length / gap.max(segment_length))
    };

    let mut steer = 0.0;
    let mut avoiding = false;
    let base = me.segment as i64;
    for k in 0..=traffic.look_ahead as i64 {
        for &other in &track.segment_at(base + k).cars {
            if other == index {
                continue;
            }
            let car = &cars[other];
            if let Some(push) = dodge(track.delta(me.s, car.s), car.n, car.speed, car.half_width) {
                steer += push;
                avoiding = true;
            }
        }
    }
    if let Some(push) = dodge(
        track.delta(me.s, player.s),
        player.n,
        player.forward_speed(),
        player_half_width,
    ) {
        steer += push;
        avoiding = true;
    }

    if !avoiding {
        let band = &config.lanes.npc_bounds;
        if me.n < band.start {
            steer = traffic.return_rate;
        } else if me.n > band.end {
            steer = -traffic.return_rate;
        }
    }
    steer
}

/// Moves every car by one step and keeps the per-segment lists in sync.
pub fn tick(cars: &mut [NpcCar], player: &Vehicle, player_half_width: f32, track: &mut Track, config: &Config, dt: f32) {
    profiling::scope!("traffic::tick");
    let decay = (-config.collision.push_decay * dt).exp();
    let bounds = &config.lanes.bounds;
    for index in 0..cars.len() {
        let steer = avoidance(index, cars, player, player_half_width, track, config);
        let car = &mut cars[index];
        car.n = (car.n + (steer + car.push_n) * dt).clamp(bounds.start.min(bounds.end), bounds.end.max(bounds.start));
        car.s = track.wrap(car.s + (car.speed + car.push_s) * dt);
        car.push_s *= decay;
        car.push_n *= decay;
        if car.push_s.abs() < 1.0 && car.push_n.abs() < 1.0e-3 {
            car.push_s = 0.0;
            car.push_n = 0.0;
        }
        let segment = track.index_of(car.s);
        if segment != car.segment {
            track.move_car(index, car.segment, segment);
            car.segment = segment;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::SpriteDef;

    fn car(s: f32, n: f32, speed: f32, segment: usize) -> NpcCar {
        NpcCar {
            def: 0,
            category: NpcCategory::Car,
            s,
            n,
            speed,
            half_width: 0.1,
            push_s: 0.0,
            push_n: 0.0,
            segment,
            last_hit: f64::NEG_INFINITY,
            near_miss_ready: true,
        }
    }

    fn setup(cars: &[NpcCar]) -> Track {
        let mut track = Track::flat(50, 200.0);
        for (id, car) in cars.iter().enumerate() {
            track.segment_at_mut(car.segment as i64).cars.push(id);
        }
        track
    }

    #[test]
    fn faster_car_steers_around_slower_one() {
        let config = Config::default();
        let mut cars = vec![car(1000.0, 0.05, 6000.0, 5), car(1600.0, 0.0, 2000.0, 8)];
        let mut track = setup(&cars);
        let parked = Vehicle::new(9000.0, 0.0, 0.0);
        tick(&mut cars, &parked, 0.1, &mut track, &config, 1.0 / 60.0);
        assert!(cars[0].n > 0.05);
        // the slow car has nobody to dodge and stays inside the band
        assert_eq!(cars[1].n, 0.0);
    }

    #[test]
    fn faster_car_steers_around_a_slower_player() {
        let config = Config::default();
        let mut cars = vec![car(1000.0, -0.05, 6000.0, 5)];
        let mut track = setup(&cars);
        let mut player = Vehicle::new(1500.0, 0.0, 0.0);
        player.v = 2000.0;
        tick(&mut cars, &player, 0.1, &mut track, &config, 1.0 / 60.0);
        assert!(cars[0].n < -0.05);

        // a player pulling away is ignored
        let mut cars = vec![car(1000.0, -0.05, 6000.0, 5)];
        let mut track = setup(&cars);
        player.v = 9000.0;
        tick(&mut cars, &player, 0.1, &mut track, &config, 1.0 / 60.0);
        assert_eq!(cars[0].n, -0.05);
    }

    #[test]
    fn cars_outside_the_band_drift_back() {
        let config = Config::default();
        let mut cars = vec![car(0.0, 1.5, 3000.0, 0)];
        let mut track = setup(&cars);
        let player = Vehicle::new(5000.0, 0.0, 0.0);
        tick(&mut cars, &player, 0.1, &mut track, &config, 0.5);
        assert!((cars[0].n - (1.5 - config.traffic.return_rate * 0.5)).abs() < 1e-5);
    }

    #[test]
    fn crossing_a_boundary_moves_segment_membership() {
        let config = Config::default();
        let mut cars = vec![car(190.0, 0.0, 3000.0, 0)];
        let mut track = setup(&cars);
        let player = Vehicle::new(5000.0, 0.0, 0.0);
        tick(&mut cars, &player, 0.1, &mut track, &config, 0.1);
        assert_eq!(cars[0].segment, 2);
        assert!(track.segment_at(0).cars.is_empty());
        assert_eq!(track.segment_at(2).cars, [0]);
    }

    #[test]
    fn spawn_registers_every_car() {
        let config = Config::default();
        let catalog = Catalog::new(vec![SpriteDef::new("car01", 300.0, 200.0)]);
        let mut track = Track::flat(100, 200.0);
        let cars = spawn(&config, &catalog, &mut track);
        // truck01 is missing from this catalog, so only one kind is used
        assert_eq!(cars.len(), config.traffic.count);
        let listed: usize = track.segments().iter().map(|s| s.cars.len()).sum();
        assert_eq!(listed, cars.len());
        for (id, car) in cars.iter().enumerate() {
            assert!(track.segment_at(car.segment as i64).cars.contains(&id));
            assert!(config.lanes.npc_bounds.contains(&car.n));
        }
    }
}

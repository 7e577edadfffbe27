use crate::camera::{CameraFrame, CameraRig};
use crate::collision;
use crate::config::Config;
use crate::input::Intent;
use crate::loader::LoadedTrack;
use crate::metrics::Metrics;
use crate::particles::Particles;
use crate::physics::{self, BoostSource, Vehicle};
use crate::race::Race;
use crate::sprite::{Catalog, Sprite};
use crate::track::LapGate;
use crate::traffic::{self, NpcCar};
use crate::Track;

/// Notifications for whoever hosts the simulation. Called synchronously from inside a step.
pub trait SimHooks {
    fn on_scene_reset_requested(&mut self) {}
    fn on_respawn_requested(&mut self, _s: f32, _n: f32) {}
    fn on_race_finished(&mut self, _elapsed_ms: u64) {}
    fn on_pickup_collected(&mut self, _sprite: usize) {}
}

pub struct NoHooks;
impl SimHooks for NoHooks {}

/// Fixed-step accumulator fed with wall-clock frame times.
#[derive(Clone, Debug)]
pub struct FrameClock {
    dt: f32,
    max_frame: f32,
    accumulator: f32,
}

impl FrameClock {
    pub fn new(dt: f32, max_frame: f32) -> Self {
        Self {
            dt: dt.max(1.0e-4),
            max_frame: max_frame.max(dt),
            accumulator: 0.0,
        }
    }

    /// Adds a frame's elapsed time and returns how many steps to run.
    pub fn advance(&mut self, elapsed: f32) -> u32 {
        self.accumulator += elapsed.clamp(0.0, self.max_frame);
        let mut steps = 0;
        while self.accumulator >= self.dt {
            self.accumulator -= self.dt;
            steps += 1;
        }
        steps
    }

    /// Leftover fraction of a step.
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.dt
    }
}

/// All mutable simulation state, owned in one place.
pub struct Simulation {
    pub config: Config,
    pub catalog: Catalog,
    pub track: Track,
    pub player: Vehicle,
    pub player_def: usize,
    pub npcs: Vec<NpcCar>,
    pub sprites: Vec<Sprite>,
    pub race: Race,
    pub metrics: Metrics,
    pub camera: CameraRig,
    pub particles: Particles,
    pub time: f64,
    clock: FrameClock,
    hooks: Box<dyn SimHooks>,
    /// Sprites as placed, for scene resets.
    placed: Vec<Sprite>,
    reset_held: bool,
}

impl Simulation {
    pub fn new(config: Config, catalog: Catalog, loaded: LoadedTrack, hooks: Box<dyn SimHooks>) -> Self {
        let player_def = catalog.find(&config.collision.player_sprite).unwrap_or_else(|| {
            log::warn!("Player sprite '{}' is not in the catalog", config.collision.player_sprite);
            0
        });
        let clock = FrameClock::new(config.physics.dt, config.physics.max_frame);
        let race = Race::new(&config.race, 0.0, loaded.track.length());
        let particles = Particles::new(&config.particles);
        let mut sim = Self {
            player_def,
            catalog,
            track: loaded.track,
            player: Vehicle::new(0.0, 0.0, 0.0),
            npcs: Vec::new(),
            sprites: Vec::new(),
            race,
            metrics: Metrics::default(),
            camera: CameraRig::default(),
            particles,
            time: 0.0,
            clock,
            hooks,
            placed: loaded.sprites,
            reset_held: false,
            config,
        };
        sim.reseed();
        sim.camera.update(&sim.config.camera, &sim.track, &sim.player, 0.0);
        sim
    }

    pub fn player_half_width(&self) -> f32 {
        self.catalog
            .def(self.player_def)
            .map_or(0.0, |def| def.half_width(1.0, self.config.lanes.road_width))
    }

    /// Rebuilds every per-segment list and the entities in them.
    fn reseed(&mut self) {
        self.track.clear_entities();
        self.sprites = self.placed.clone();
        for (id, sprite) in self.sprites.iter_mut().enumerate() {
            sprite.s = self.track.wrap(sprite.s);
            sprite.segment = self.track.index_of(sprite.s);
            self.track.segment_at_mut(sprite.segment as i64).sprites.push(id);
        }
        self.npcs = traffic::spawn(&self.config, &self.catalog, &mut self.track);
        self.particles.clear();
        self.camera.snap();
    }

    /// Swaps in a freshly loaded track; everything picks it up on the next step.
    pub fn activate(&mut self, loaded: LoadedTrack) {
        log::info!("Activating track with {} segments", loaded.track.len());
        let fraction = self.player.s / self.track.length();
        self.track = loaded.track;
        self.placed = loaded.sprites;
        self.reseed();
        let s = self.track.wrap(fraction * self.track.length());
        let y = self.track.surface_height_at(s, self.player.n);
        self.player.respawn(s, self.player.n, y);
        self.race.reset(s, self.track.length());
    }

    /// Back to the start line with fresh traffic and sprites.
    pub fn reset(&mut self) {
        log::info!("Resetting scene");
        self.reseed();
        let y = self.track.surface_height_at(0.0, 0.0);
        self.player = Vehicle::new(0.0, 0.0, y);
        self.race.reset(0.0, self.track.length());
    }

    /// Drops the player at the centre of its current segment.
    pub fn respawn(&mut self) {
        let segment_length = self.track.segment_length();
        let s = (self.track.index_of(self.player.s) as f32 + 0.5) * segment_length;
        let n = 0.0;
        log::info!("Respawning at {:.0}", s);
        self.hooks.on_respawn_requested(s, n);
        let y = self.track.surface_height_at(s, n);
        self.player.respawn(s, n, y);
        self.metrics.respawns += 1;
        self.camera.snap();
    }

    pub fn start_race(&mut self) {
        self.race.start();
    }

    /// Runs as many fixed steps as `elapsed` allows, then updates the camera once.
    pub fn frame(&mut self, elapsed: f32, intent: &Intent) -> u32 {
        let steps = self.clock.advance(elapsed);
        for _ in 0..steps {
            self.step(intent);
        }
        let dt = elapsed.clamp(0.0, self.config.physics.max_frame);
        self.camera.update(&self.config.camera, &self.track, &self.player, dt);
        steps
    }

    pub fn step(&mut self, intent: &Intent) {
        profiling::scope!("Simulation::step");
        let dt = self.config.physics.dt;
        let intent = intent.for_phase(&self.race.phase);
        if intent.reset && !self.reset_held {
            self.hooks.on_scene_reset_requested();
            self.reset();
        }
        self.reset_held = intent.reset;

        let half_width = self.player_half_width();
        let prev_s = self.player.s;
        let prev_segment = self.track.index_of(prev_s);
        let events = physics::step(&mut self.player, &self.track, &self.config, &intent, self.time, half_width);
        collision::guardrail(
            &mut self.player,
            events.rail,
            &self.config.collision,
            dt,
            self.time,
            &mut self.metrics,
        );
        if events.hopped || events.boost == Some(BoostSource::Jump) {
            self.metrics.jumps += 1;
        }
        match events.boost {
            Some(BoostSource::Drift) => {
                self.metrics.boosts += 1;
                self.metrics.drift_boosts += 1;
            }
            Some(_) => self.metrics.boosts += 1,
            None => {}
        }

        let contacts = collision::resolve(
            &mut self.player,
            half_width,
            prev_s,
            &self.track,
            &mut self.npcs,
            &mut self.sprites,
            &self.catalog,
            &self.config,
            self.time,
        );
        self.metrics.npc_hits += contacts.npc_hits;
        self.metrics.near_misses += contacts.near_misses;
        self.metrics.sprite_hits += contacts.sprite_hits;
        self.metrics.pickups += contacts.pickups.len() as u32;
        for &id in &contacts.pickups {
            self.hooks.on_pickup_collected(id);
        }

        traffic::tick(&mut self.npcs, &self.player, half_width, &mut self.track, &self.config, dt);
        self.advance_sprites(dt);
        self.particles.update(dt, &self.player, &self.config.particles);

        let gate = self.entered_gate(prev_s, prev_segment);
        if let Some(elapsed) = self.race.update(dt, self.player.s, self.track.length(), gate) {
            self.hooks.on_race_finished((elapsed * 1000.0).round() as u64);
        }

        if !self.player.grounded {
            self.metrics.airtime += dt;
        }
        self.metrics.top_speed = self.metrics.top_speed.max(self.player.forward_speed());
        if physics::fell_through(&self.player, &self.track, &self.config.physics) {
            self.respawn();
        }
        self.time += dt as f64;
    }

    fn advance_sprites(&mut self, dt: f32) {
        let decay = self.config.collision.push_decay;
        for (id, sprite) in self.sprites.iter_mut().enumerate() {
            let Some(def) = self.catalog.def(sprite.def) else {
                continue;
            };
            if !sprite.advance(def, dt, decay) {
                continue;
            }
            sprite.s = self.track.wrap(sprite.s);
            let segment = self.track.index_of(sprite.s);
            self.track.move_sprite(id, sprite.segment, segment);
            sprite.segment = segment;
        }
    }

    /// First lap gate among the segments entered moving forward this step.
    fn entered_gate(&self, prev_s: f32, prev_segment: usize) -> Option<LapGate> {
        let current = self.track.index_of(self.player.s);
        if current == prev_segment || self.track.delta(prev_s, self.player.s) <= 0.0 {
            return None;
        }
        let count = self.track.len();
        let crossed = (current + count - prev_segment) % count;
        (1..=crossed as i64).find_map(|k| self.track.segment_at(prev_segment as i64 + k).features.gate)
    }

    pub fn camera_frame(&self, width: u32, height: u32) -> CameraFrame {
        self.camera.frame(&self.config, &self.track, &self.player, width, height)
    }
}

use rand::{Rng as _, SeedableRng as _};

use crate::config;
use crate::physics::Vehicle;
use crate::pool::Pool;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParticleKind {
    Smoke,
    Spark,
}

#[derive(Clone, Debug)]
pub struct Particle {
    pub kind: ParticleKind,
    pub s: f32,
    pub n: f32,
    /// Absolute height.
    pub y: f32,
    pub vy: f32,
    pub vn: f32,
    pub age: f32,
    pub life: f32,
    pub size: f32,
}

impl Particle {
    /// Fraction of its life left, 1 when fresh.
    pub fn fade(&self) -> f32 {
        (1.0 - self.age / self.life.max(1.0e-3)).clamp(0.0, 1.0)
    }
}

/// Drift smoke and scrape sparks behind the player.
pub struct Particles {
    pool: Pool<Particle>,
    smoke_due: f32,
    spark_due: f32,
    rng: rand_pcg::Pcg32,
}

impl Particles {
    pub fn new(config: &config::Particles) -> Self {
        Self {
            pool: Pool::with_capacity(config.capacity),
            smoke_due: 0.0,
            spark_due: 0.0,
            rng: rand_pcg::Pcg32::seed_from_u64(0x5eed),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.pool.iter().map(|(_, particle)| particle)
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn clear(&mut self) {
        self.pool.clear();
        self.smoke_due = 0.0;
        self.spark_due = 0.0;
    }

    fn emit(&mut self, kind: ParticleKind, player: &Vehicle, config: &config::Particles) {
        let spread = self.rng.random::<f32>() - 0.5;
        let particle = Particle {
            kind,
            s: player.s,
            n: player.n + 0.1 * spread,
            y: player.y,
            vy: match kind {
                ParticleKind::Smoke => config.smoke_rise,
                ParticleKind::Spark => config.spark_rise * self.rng.random::<f32>(),
            },
            vn: spread,
            age: 0.0,
            life: config.life,
            size: match kind {
                ParticleKind::Smoke => config.size,
                ParticleKind::Spark => config.spark_scale * config.size,
            },
        };
        // a full pool just drops the particle
        let _ = self.pool.insert(particle);
    }

    pub fn update(&mut self, dt: f32, player: &Vehicle, config: &config::Particles) {
        profiling::scope!("Particles::update");
        self.pool.retain(|particle| {
            particle.age += dt;
            particle.y += particle.vy * dt;
            particle.n += particle.vn * dt;
            particle.age < particle.life
        });

        if player.grounded && player.drift.is_drifting() {
            self.smoke_due += config.smoke_rate * dt;
        } else {
            self.smoke_due = 0.0;
        }
        if player.rail_contact || player.boost_flash > 0.0 {
            self.spark_due += config.spark_rate * dt;
        } else {
            self.spark_due = 0.0;
        }
        while self.smoke_due >= 1.0 {
            self.smoke_due -= 1.0;
            self.emit(ParticleKind::Smoke, player, config);
        }
        while self.spark_due >= 1.0 {
            self.spark_due -= 1.0;
            self.emit(ParticleKind::Spark, player, config);
        }
    }
}

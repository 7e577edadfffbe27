use crate::cliff::Side;
use crate::config::{self, Config};
use crate::metrics::Metrics;
use crate::physics::Vehicle;
use crate::sprite::{Catalog, Interaction, Sprite, SpriteKind};
use crate::traffic::NpcCar;
use crate::Track;

/// Push given to whatever the player runs into.
///
/// Zero for a stationary or reversing player and for a non-positive top speed,
/// otherwise grows with speed and with how centred the hit was.
pub fn push_impulse(speed: f32, top_speed: f32, centered: f32, strength: f32) -> f32 {
    if speed <= 0.0 || top_speed <= 0.0 {
        return 0.0;
    }
    strength * (speed / top_speed) * (0.5 + 0.5 * centered.clamp(0.0, 1.0))
}

/// Outcome of one collision pass.
#[derive(Debug, Default)]
pub struct Contacts {
    pub npc_hits: u32,
    pub near_misses: u32,
    pub sprite_hits: u32,
    /// Sprites collected this step.
    pub pickups: Vec<usize>,
}

fn side_sign(dn: f32) -> f32 {
    if dn >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// Longitudinal window the player swept this step, relative to its current position.
struct Sweep {
    behind: f32,
    ahead: f32,
}

impl Sweep {
    fn contains(&self, gap: f32) -> bool {
        gap >= -self.behind && gap <= self.ahead
    }
}

/// Resolves contacts against everything in the segments the hitbox crossed since `prev_s`.
#[allow(clippy::too_many_arguments)]
pub fn resolve(
    player: &mut Vehicle,
    player_half_width: f32,
    prev_s: f32,
    track: &Track,
    cars: &mut [NpcCar],
    sprites: &mut [Sprite],
    catalog: &Catalog,
    config: &Config,
    time: f64,
) -> Contacts {
    profiling::scope!("collision::resolve");
    let mut contacts = Contacts::default();
    if track.is_empty() {
        return contacts;
    }
    let rules = &config.collision;
    let segment_length = track.segment_length();
    let travelled = track.delta(prev_s, player.s);
    let reach = rules.hit_depth * segment_length;
    let sweep = Sweep {
        behind: travelled.max(0.0) + reach,
        ahead: reach - travelled.min(0.0),
    };

    for car in cars.iter_mut() {
        if !car.near_miss_ready && track.delta(player.s, car.s).abs() > rules.near_miss_reset * segment_length {
            car.near_miss_ready = true;
        }
    }

    let first = track.index_of(player.s - sweep.behind) as i64;
    let last = first + ((sweep.behind + sweep.ahead) / segment_length).ceil() as i64;
    let count = track.len() as i64;
    for index in first..=last.min(first + count - 1) {
        let segment = track.segment_at(index);
        for &id in &segment.cars {
            hit_car(player, player_half_width, &mut cars[id], track, &sweep, rules, &config.physics, time, &mut contacts);
        }
        for &id in &segment.sprites {
            let Some(def) = catalog.def(sprites[id].def) else {
                continue;
            };
            let sprite = &mut sprites[id];
            if sprite.hidden || !sweep.contains(track.delta(player.s, sprite.s)) {
                continue;
            }
            let dn = sprite.n - player.n;
            let overlap = player_half_width + def.half_width(sprite.scale, config.lanes.road_width);
            if dn.abs() >= overlap {
                continue;
            }
            match def.kind {
                SpriteKind::Trigger if !sprite.collected => {
                    sprite.collected = true;
                    match def.interaction {
                        Interaction::Toggle => sprite.hidden = true,
                        Interaction::PlayAnimation => {
                            sprite.playing = true;
                            sprite.anim_time = 0.0;
                        }
                        Interaction::Static => {}
                    }
                    log::debug!("Collected '{}' ({})", def.name, id);
                    contacts.pickups.push(id);
                }
                SpriteKind::Solid if time - sprite.last_hit >= rules.sprite_hit_cooldown as f64 => {
                    sprite.last_hit = time;
                    let speed = player.forward_speed();
                    let centered = 1.0 - dn.abs() / overlap;
                    let impulse = push_impulse(speed, config.physics.top_speed, centered, rules.push_strength)
                        / def.mass.max(0.1);
                    sprite.push_s += impulse * rules.push_forward_share;
                    sprite.push_n += impulse * rules.push_lateral_share * side_sign(dn);
                    player.set_forward_speed(speed * (1.0 - def.slowdown.clamp(0.0, 1.0)));
                    contacts.sprite_hits += 1;
                    log::debug!("Hit '{}' at {:.0}", def.name, speed);
                }
                _ => {}
            }
        }
    }
    contacts
}

#[allow(clippy::too_many_arguments)]
fn hit_car(
    player: &mut Vehicle,
    player_half_width: f32,
    car: &mut NpcCar,
    track: &Track,
    sweep: &Sweep,
    rules: &config::Collision,
    physics: &config::Physics,
    time: f64,
    contacts: &mut Contacts,
) {
    let gap = track.delta(player.s, car.s);
    let speed = player.forward_speed();
    let dn = car.n - player.n;
    let overlap = player_half_width + car.half_width;
    if dn.abs() < overlap {
        if sweep.contains(gap) && speed > car.speed && time - car.last_hit >= rules.npc_hit_cooldown as f64 {
            car.last_hit = time;
            let centered = 1.0 - dn.abs() / overlap;
            let impulse = push_impulse(speed, physics.top_speed, centered, rules.push_strength) / car.category.mass();
            car.push_s += impulse * rules.push_forward_share;
            car.push_n += impulse * rules.push_lateral_share * side_sign(dn);
            player.set_forward_speed(car.speed);
            player.drift.cancel();
            contacts.npc_hits += 1;
            log::debug!("Hit car at {:.0} (car {:.0})", speed, car.speed);
        }
        return;
    }
    let clearance = dn.abs() - overlap;
    if car.near_miss_ready
        && clearance < rules.near_miss_gap
        && speed - car.speed >= rules.near_miss_min_margin
        && gap.abs() <= rules.near_miss_window * track.segment_length()
    {
        car.near_miss_ready = false;
        contacts.near_misses += 1;
        log::debug!("Near miss, clearance {:.2}", clearance);
    }
}

/// Applies guardrail contact reported by the lane clamp.
pub fn guardrail(
    player: &mut Vehicle,
    rail: Option<Side>,
    rules: &config::Collision,
    dt: f32,
    time: f64,
    metrics: &mut Metrics,
) {
    player.rail_contact = rail.is_some();
    if rail.is_none() {
        return;
    }
    player.set_forward_speed(player.forward_speed() * (-rules.rail_speed_decay * dt).exp());
    player.drift.cancel();
    metrics.rail_contact_time += dt;
    if time - player.last_rail_hit >= rules.rail_hit_cooldown as f64 {
        player.last_rail_hit = time;
        metrics.rail_hits += 1;
    }
}

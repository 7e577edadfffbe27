use std::ops::Range;

use crate::texture::Color;

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct Track {
    pub track: String,
    pub cliffs: String,
    pub sprites: String,
    pub segment_length: f32,
    /// Segments blended at the loop seam by `Track::enforce_wrap_continuity`.
    pub wrap_margin: usize,
}

impl Default for Track {
    fn default() -> Self {
        Self {
            track: "data/tracks/coast/track.ron".to_string(),
            cliffs: "data/tracks/coast/cliffs.ron".to_string(),
            sprites: "data/tracks/coast/sprites.ron".to_string(),
            segment_length: 200.0,
            wrap_margin: 8,
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct Lanes {
    /// Half width of the paved road in world units.
    pub road_width: f32,
    /// Lateral bounds for the player when no guardrail stops it.
    pub bounds: Range<f32>,
    /// Lateral band NPC traffic tries to stay within.
    pub npc_bounds: Range<f32>,
}

impl Default for Lanes {
    fn default() -> Self {
        Self {
            road_width: 2000.0,
            bounds: -2.5..2.5,
            npc_bounds: -0.8..0.8,
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct Physics {
    pub dt: f32,
    /// Longest wall-clock frame fed to the fixed-step accumulator.
    pub max_frame: f32,
    pub top_speed: f32,
    pub accel: f32,
    pub brake: f32,
    pub coast_decel: f32,
    pub roll_drag: f32,
    pub off_road_drag: f32,
    pub gravity: f32,
    pub air_drag: f32,
    pub steer_rate: f32,
    pub air_steer: f32,
    pub drift_steer_with: f32,
    pub drift_steer_against: f32,
    pub path_correction: f32,
    pub path_lookahead: u32,
    pub cliff_push: f32,
    pub cliff_push_cap: f32,
    pub hop_impulse: f32,
    pub hop_cooldown: f32,
    pub jump_impulse: f32,
    pub boost_multiplier: f32,
    pub boost_impulse: f32,
    pub manual_boost_duration: f32,
    pub manual_boost_cooldown: f32,
    pub zone_boost_duration: f32,
    pub drift_boost_duration: f32,
    pub drift_charge_threshold: f32,
    pub boost_flash: f32,
    /// Distance below the surface at which a falling vehicle is respawned.
    pub fall_threshold: f32,
    pub landing_tolerance: f32,
}

impl Default for Physics {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,
            max_frame: 0.25,
            top_speed: 12000.0,
            accel: 2400.0,
            brake: 9000.0,
            coast_decel: 1200.0,
            roll_drag: 0.15,
            off_road_drag: 1.2,
            gravity: 6000.0,
            air_drag: 0.05,
            steer_rate: 2.0,
            air_steer: 0.5,
            drift_steer_with: 1.4,
            drift_steer_against: 0.6,
            path_correction: 0.1,
            path_lookahead: 5,
            cliff_push: 3.0,
            cliff_push_cap: 0.05,
            hop_impulse: 1400.0,
            hop_cooldown: 0.35,
            jump_impulse: 3500.0,
            boost_multiplier: 1.35,
            boost_impulse: 1500.0,
            manual_boost_duration: 1.2,
            manual_boost_cooldown: 3.0,
            zone_boost_duration: 1.0,
            drift_boost_duration: 1.0,
            drift_charge_threshold: 0.8,
            boost_flash: 0.25,
            fall_threshold: 1500.0,
            landing_tolerance: 1.0,
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct Collision {
    pub player_sprite: String,
    pub npc_hit_cooldown: f32,
    pub sprite_hit_cooldown: f32,
    /// Longitudinal reach of the hitbox, in segments.
    pub hit_depth: f32,
    /// Widest lateral gap, in road half-widths, that still counts as a near miss.
    pub near_miss_gap: f32,
    pub near_miss_min_margin: f32,
    /// Forward window in segments.
    pub near_miss_window: f32,
    /// Longitudinal gap in segments that re-arms a near miss.
    pub near_miss_reset: f32,
    pub push_strength: f32,
    pub push_forward_share: f32,
    pub push_lateral_share: f32,
    pub push_decay: f32,
    pub rail_speed_decay: f32,
    pub rail_hit_cooldown: f32,
}

impl Default for Collision {
    fn default() -> Self {
        Self {
            player_sprite: "player".to_string(),
            npc_hit_cooldown: 0.6,
            sprite_hit_cooldown: 0.4,
            hit_depth: 0.5,
            near_miss_gap: 0.25,
            near_miss_min_margin: 1200.0,
            near_miss_window: 1.5,
            near_miss_reset: 4.0,
            push_strength: 4000.0,
            push_forward_share: 0.8,
            push_lateral_share: 0.0004,
            push_decay: 2.5,
            rail_speed_decay: 3.0,
            rail_hit_cooldown: 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
pub enum NpcCategory {
    #[default]
    Car,
    Van,
    Truck,
}

impl NpcCategory {
    /// Relative resistance to being pushed.
    pub fn mass(self) -> f32 {
        match self {
            Self::Car => 1.0,
            Self::Van => 1.6,
            Self::Truck => 3.0,
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct TrafficCar {
    pub sprite: String,
    #[serde(default)]
    pub category: NpcCategory,
    pub speed: Range<f32>,
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct Traffic {
    pub count: usize,
    pub seed: u64,
    pub cars: Vec<TrafficCar>,
    pub look_ahead: u32,
    pub avoid_strength: f32,
    pub return_rate: f32,
}

impl Default for Traffic {
    fn default() -> Self {
        Self {
            count: 24,
            seed: 7,
            cars: vec![
                TrafficCar {
                    sprite: "car01".to_string(),
                    category: NpcCategory::Car,
                    speed: 3000.0..7000.0,
                },
                TrafficCar {
                    sprite: "truck01".to_string(),
                    category: NpcCategory::Truck,
                    speed: 2000.0..4000.0,
                },
            ],
            look_ahead: 20,
            avoid_strength: 2.0,
            return_rate: 0.3,
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct Race {
    pub sectors: u32,
    pub laps: u32,
    pub countdown: f32,
    pub finish_hold: f32,
}

impl Default for Race {
    fn default() -> Self {
        Self {
            sectors: 32,
            laps: 3,
            countdown: 3.0,
            finish_hold: 3.0,
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct Camera {
    pub height: f32,
    /// Horizontal field of view in degrees.
    pub fov: f32,
    pub trailing_segments: f32,
    pub near_z: f32,
    pub smooth_time: f32,
    pub floor_blend: f32,
    pub roll_steer: f32,
    pub roll_curve: f32,
    pub roll_max: f32,
    pub roll_smooth_time: f32,
    /// Pivot of the roll, as a fraction of the viewport height.
    pub roll_pivot: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            height: 1000.0,
            fov: 100.0,
            trailing_segments: 4.5,
            near_z: 50.0,
            smooth_time: 0.15,
            floor_blend: 0.5,
            roll_steer: 0.04,
            roll_curve: 0.02,
            roll_max: 0.12,
            roll_smooth_time: 0.2,
            roll_pivot: 0.85,
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct Render {
    pub draw_distance: u32,
    /// `(until, stride)` bands: segments closer than `until` are batched by `stride`.
    pub stride: Vec<(u32, u32)>,
    /// Target on-screen size of one road cell.
    pub row_px: f32,
    pub col_px: f32,
    /// Minimum and maximum cells per batch.
    pub rows: Range<u32>,
    pub cols: Range<u32>,
    pub fog_density: f32,
    pub fog_color: Color,
    pub sky_color: Color,
    pub ground_color: Color,
    /// Overlay for boost zones marked visible.
    pub boost_color: Color,
    /// Billboards shorter than this many pixels are culled.
    pub min_sprite_px: f32,
    /// Viewing angle, in radians, that maps onto the outermost atlas column.
    pub view_angle_span: f32,
    /// Road slopes within this of level use the middle atlas row.
    pub level_slope: f32,
    pub draw_list_capacity: usize,
    pub road_texture: String,
    pub cliff_textures: (String, String),
}

impl Default for Render {
    fn default() -> Self {
        Self {
            draw_distance: 300,
            stride: vec![(40, 1), (100, 4), (180, 8), (260, 16), (u32::MAX, 20)],
            row_px: 24.0,
            col_px: 96.0,
            rows: 1..12,
            cols: 1..8,
            fog_density: 4.0,
            fog_color: Color::rgb(0x9d, 0xb8, 0xd9),
            sky_color: Color::rgb(0x72, 0xd7, 0xee),
            ground_color: Color::rgb(0x10, 0x7a, 0x3c),
            boost_color: Color::rgb(0xff, 0x8c, 0x1a),
            min_sprite_px: 2.0,
            view_angle_span: 0.6,
            level_slope: 0.02,
            draw_list_capacity: 16384,
            road_texture: "road".to_string(),
            cliff_textures: ("cliff_a".to_string(), "cliff_b".to_string()),
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct Particles {
    pub capacity: usize,
    pub smoke_rate: f32,
    pub spark_rate: f32,
    pub life: f32,
    pub size: f32,
    pub smoke_rise: f32,
    /// Sparks rise at a random speed up to this.
    pub spark_rise: f32,
    /// Spark size relative to `size`.
    pub spark_scale: f32,
    /// Drift smoke billboard; sparks are drawn as solid quads.
    pub texture: String,
    pub spark_color: Color,
}

impl Default for Particles {
    fn default() -> Self {
        Self {
            capacity: 256,
            smoke_rate: 30.0,
            spark_rate: 20.0,
            life: 0.6,
            size: 120.0,
            smoke_rise: 300.0,
            spark_rise: 900.0,
            spark_scale: 0.25,
            texture: "smoke".to_string(),
            spark_color: Color::rgb(255, 200, 80),
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub track: Track,
    pub catalog: String,
    pub lanes: Lanes,
    pub physics: Physics,
    pub collision: Collision,
    pub traffic: Traffic,
    pub race: Race,
    pub camera: Camera,
    pub render: Render,
    pub particles: Particles,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            track: Track::default(),
            catalog: "data/sprites.ron".to_string(),
            lanes: Lanes::default(),
            physics: Physics::default(),
            collision: Collision::default(),
            traffic: Traffic::default(),
            race: Race::default(),
            camera: Camera::default(),
            render: Render::default(),
            particles: Particles::default(),
        }
    }
}

impl Config {
    pub fn load(path: &std::path::Path) -> Result<Self, crate::LoadError> {
        crate::loader::read_ron(path)
    }
}

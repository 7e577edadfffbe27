use std::ffi::{c_char, c_void, CString};
use std::path::Path;

use switchback::{
    config::Config,
    input::{self, Gamepad, Keyboard},
    loader::{self, LoadSlot},
    render::Renderer,
    sim::{SimHooks, Simulation},
    sprite::UvRect,
    texture::{Color, RenderTarget, TextureId, TextureState},
    LoadError,
};

/// Drawing callbacks supplied by the host. Colors are `0xAARRGGBB`.
#[repr(C)]
pub struct SwitchbackTarget {
    pub user: *mut c_void,
    pub size: extern "C" fn(user: *mut c_void, width: *mut u32, height: *mut u32),
    pub begin_frame: extern "C" fn(user: *mut c_void, clear: u32, fog: u32),
    pub set_camera_roll: extern "C" fn(user: *mut c_void, angle: f32, pivot_x: f32, pivot_y: f32),
    /// `corners` holds 4 `(x, y)` pairs: bottom left, bottom right, top right, top left.
    /// `uv` holds `u0, v0, u1, v1`.
    pub draw_textured_quad:
        extern "C" fn(user: *mut c_void, texture: u32, corners: *const f32, uv: *const f32, fog: f32),
    pub draw_solid_quad: extern "C" fn(user: *mut c_void, corners: *const f32, color: u32),
    /// Returns 0 with `id` filled when ready, 1 while loading, anything else when missing.
    pub request_texture: extern "C" fn(user: *mut c_void, name: *const c_char, id: *mut u32) -> i32,
}

impl RenderTarget for SwitchbackTarget {
    fn size(&self) -> (u32, u32) {
        let (mut width, mut height) = (0, 0);
        (self.size)(self.user, &mut width, &mut height);
        (width, height)
    }

    fn begin_frame(&mut self, clear: Color, fog: Color) {
        (self.begin_frame)(self.user, clear.to_argb(), fog.to_argb());
    }

    fn set_camera_roll(&mut self, angle: f32, pivot: nalgebra::Point2<f32>) {
        (self.set_camera_roll)(self.user, angle, pivot.x, pivot.y);
    }

    fn draw_textured_quad(&mut self, texture: TextureId, corners: &[nalgebra::Point2<f32>; 4], uv: &UvRect, fog: f32) {
        let flat = flatten(corners);
        let uv = [uv.u0, uv.v0, uv.u1, uv.v1];
        (self.draw_textured_quad)(self.user, texture, flat.as_ptr(), uv.as_ptr(), fog);
    }

    fn draw_solid_quad(&mut self, corners: &[nalgebra::Point2<f32>; 4], color: Color) {
        let flat = flatten(corners);
        (self.draw_solid_quad)(self.user, flat.as_ptr(), color.to_argb());
    }

    fn request_texture(&mut self, name: &str) -> TextureState {
        let Ok(name) = CString::new(name) else {
            return TextureState::Missing;
        };
        let mut id = 0;
        match (self.request_texture)(self.user, name.as_ptr(), &mut id) {
            0 => TextureState::Ready(id),
            1 => TextureState::Pending,
            _ => TextureState::Missing,
        }
    }
}

fn flatten(corners: &[nalgebra::Point2<f32>; 4]) -> [f32; 8] {
    let mut flat = [0.0; 8];
    for (i, point) in corners.iter().enumerate() {
        flat[2 * i] = point.x;
        flat[2 * i + 1] = point.y;
    }
    flat
}

/// Optional notifications; any entry may be null.
#[repr(C)]
pub struct SwitchbackCallbacks {
    pub user: *mut c_void,
    pub on_scene_reset_requested: Option<extern "C" fn(user: *mut c_void)>,
    pub on_respawn_requested: Option<extern "C" fn(user: *mut c_void, s: f32, n: f32)>,
    pub on_race_finished: Option<extern "C" fn(user: *mut c_void, elapsed_ms: u64)>,
    pub on_pickup_collected: Option<extern "C" fn(user: *mut c_void, sprite: u32)>,
}

impl SimHooks for SwitchbackCallbacks {
    fn on_scene_reset_requested(&mut self) {
        if let Some(callback) = self.on_scene_reset_requested {
            callback(self.user);
        }
    }
    fn on_respawn_requested(&mut self, s: f32, n: f32) {
        if let Some(callback) = self.on_respawn_requested {
            callback(self.user, s, n);
        }
    }
    fn on_race_finished(&mut self, elapsed_ms: u64) {
        if let Some(callback) = self.on_race_finished {
            callback(self.user, elapsed_ms);
        }
    }
    fn on_pickup_collected(&mut self, sprite: usize) {
        if let Some(callback) = self.on_pickup_collected {
            callback(self.user, sprite as u32);
        }
    }
}

/// Driver input for one frame. Boolean fields are 0 or 1.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct SwitchbackInput {
    pub throttle: f32,
    pub brake: f32,
    pub steer: f32,
    pub hop: u8,
    pub boost: u8,
    pub reset: u8,
}

/// Snapshot of the counters a HUD shows.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct SwitchbackStatus {
    pub speed: f32,
    pub laps: u32,
    pub race_elapsed: f32,
    pub racing: u8,
    pub boosting: u8,
    pub near_misses: u32,
    pub npc_hits: u32,
    pub rail_hits: u32,
    pub pickups: u32,
    pub boosts: u32,
    pub respawns: u32,
    pub draw_overflow: u32,
}

/// Opaque handle owned by the host between `switchback_init` and `switchback_exit`.
pub struct Context {
    sim: Simulation,
    renderer: Renderer,
    target: SwitchbackTarget,
    slot: LoadSlot,
}

impl Context {
    pub(crate) fn new(config_path: &Path, target: SwitchbackTarget, callbacks: SwitchbackCallbacks) -> Result<Self, LoadError> {
        log::info!("Initializing from {}", config_path.display());
        let config = Config::load(config_path)?;
        let catalog = loader::load_catalog(Path::new(&config.catalog));
        let mut slot = LoadSlot::default();
        let ticket = slot.request();
        let loaded = slot.complete(ticket, loader::load_track(&config, &catalog))?;
        let renderer = Renderer::new(&config.render);
        let sim = Simulation::new(config, catalog, loaded, Box::new(callbacks));
        Ok(Self {
            sim,
            renderer,
            target,
            slot,
        })
    }

    pub(crate) fn frame(&mut self, elapsed: f32, input: &SwitchbackInput) -> u32 {
        let pad = Gamepad {
            steer: input.steer,
            throttle: input.throttle,
            brake: input.brake,
            hop: input.hop != 0,
            boost: input.boost != 0,
            reset: input.reset != 0,
        };
        let intent = input::merge(&Keyboard::default(), &pad);
        let steps = self.sim.frame(elapsed, &intent);
        self.renderer.render(&self.sim, &mut self.target);
        steps
    }

    /// Loads another track description and swaps it in; the current track stays on failure.
    pub(crate) fn reload(&mut self, track_path: Option<&str>) -> bool {
        let ticket = self.slot.request();
        let mut config = self.sim.config.clone();
        if let Some(path) = track_path {
            config.track.track = path.to_string();
        }
        let result = loader::load_track(&config, &self.sim.catalog);
        match self.slot.complete(ticket, result) {
            Ok(loaded) => {
                self.sim.config.track = config.track;
                self.sim.activate(loaded);
                self.renderer.reset_textures();
                true
            }
            Err(e) => {
                log::warn!("Keeping the current track: {}", e);
                false
            }
        }
    }

    pub(crate) fn start_race(&mut self) {
        self.sim.start_race();
    }

    pub(crate) fn status(&self) -> SwitchbackStatus {
        let sim = &self.sim;
        let metrics = &sim.metrics;
        SwitchbackStatus {
            speed: sim.player.forward_speed(),
            laps: sim.race.laps(),
            race_elapsed: sim.race.elapsed,
            racing: sim.race.is_racing() as u8,
            boosting: sim.player.is_boosting() as u8,
            near_misses: metrics.near_misses,
            npc_hits: metrics.npc_hits,
            rail_hits: metrics.rail_hits,
            pickups: metrics.pickups,
            boosts: metrics.boosts,
            respawns: metrics.respawns,
            draw_overflow: self.renderer.stats.overflow,
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        log::info!("Deinitializing");
    }
}

use nalgebra::Point2;

use crate::camera::{CameraFrame, Projected};
use crate::cliff::{CliffParams, Side};
use crate::config;
use crate::metrics::RenderStats;
use crate::particles::ParticleKind;
use crate::sim::Simulation;
use crate::sprite::{AtlasLayout, UvRect};
use crate::texture::{Color, RenderTarget, TextureCache, TextureId, TextureState};
use crate::track::{self, Track};

/// Painter's order among entries at the same depth.
///
/// Cliffs dropping below the road go under it, cliffs rising above it go over it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Layer {
    Ground,
    LowerOuter,
    LowerInner,
    Road,
    UpperInner,
    UpperOuter,
    Billboard,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Fill {
    Texture { id: TextureId, uv: UvRect, fog: f32 },
    Solid(Color),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCommand {
    /// Camera-relative z; larger is drawn first.
    pub depth: f32,
    pub layer: Layer,
    pub seq: u32,
    pub corners: [Point2<f32>; 4],
    pub fill: Fill,
}

/// Bounded per-frame list of quads, sorted back to front before execution.
pub struct DrawList {
    commands: Vec<DrawCommand>,
    capacity: usize,
    next_seq: u32,
    pub overflow: u32,
}

impl DrawList {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
            capacity,
            next_seq: 0,
            overflow: 0,
        }
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.next_seq = 0;
        self.overflow = 0;
    }

    /// Returns false and counts an overflow when the list is full.
    pub fn push(&mut self, depth: f32, layer: Layer, corners: [Point2<f32>; 4], fill: Fill) -> bool {
        if self.commands.len() >= self.capacity {
            self.overflow += 1;
            return false;
        }
        self.commands.push(DrawCommand {
            depth,
            layer,
            seq: self.next_seq,
            corners,
            fill,
        });
        self.next_seq += 1;
        true
    }

    pub fn sort(&mut self) {
        profiling::scope!("DrawList::sort");
        self.commands.sort_unstable_by(|a, b| {
            b.depth
                .total_cmp(&a.depth)
                .then(a.layer.cmp(&b.layer))
                .then(a.seq.cmp(&b.seq))
        });
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn execute(&self, target: &mut dyn RenderTarget) {
        profiling::scope!("DrawList::execute");
        for command in self.commands.iter() {
            match command.fill {
                Fill::Texture { id, ref uv, fog } => target.draw_textured_quad(id, &command.corners, uv, fog),
                Fill::Solid(color) => target.draw_solid_quad(&command.corners, color),
            }
        }
    }
}

/// Segments per batch at `k` segments from the camera.
pub fn stride_at(bands: &[(u32, u32)], k: u32) -> u32 {
    bands
        .iter()
        .find(|&&(until, _)| k < until)
        .map_or(1, |&(_, stride)| stride.max(1))
}

fn fog_amount(z: f32, max_z: f32, density: f32) -> f32 {
    let d = (z / max_z.max(1.0)).max(0.0);
    (1.0 - (-density * d * d).exp()).clamp(0.0, 1.0)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn lerp_point(a: Point2<f32>, b: Point2<f32>, t: f32) -> Point2<f32> {
    Point2::new(lerp(a.x, b.x, t), lerp(a.y, b.y, t))
}

/// Cross-section of the track at a batch boundary, in world space.
#[derive(Clone, Copy, Debug)]
struct Cut {
    /// Segments from the camera's base segment.
    pos: f32,
    x: f32,
    y: f32,
    z: f32,
    cliffs: CliffParams,
}

impl Cut {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            pos: lerp(self.pos, other.pos, t),
            x: lerp(self.x, other.x, t),
            y: lerp(self.y, other.y, t),
            z: lerp(self.z, other.z, t),
            cliffs: CliffParams {
                left: self.cliffs.left.lerp(&other.cliffs.left, t),
                right: self.cliffs.right.lerp(&other.cliffs.right, t),
            },
        }
    }

    fn world(&self, lateral: f32, road_width: f32, rise: f32) -> nalgebra::Vector3<f32> {
        nalgebra::Vector3::new(self.x + track::lateral_to_world(lateral, road_width), self.y + rise, self.z)
    }
}

#[derive(Clone, Copy, Debug)]
struct Edge {
    cut: Cut,
    at: Projected,
    /// Projected half width of the road in pixels.
    half: f32,
}

#[derive(Clone, Copy, Debug)]
struct Batch {
    near: Edge,
    far: Edge,
}

struct Placed {
    at: Point2<f32>,
    scale: f32,
    z: f32,
}

impl Batch {
    fn covers(&self, pos: f32) -> bool {
        pos >= self.near.cut.pos && pos < self.far.cut.pos
    }

    /// Screen anchor of something `pos` segments out, `n` across and `rise` above the road.
    fn place(&self, pos: f32, n: f32, rise: f32, frame: &CameraFrame) -> Placed {
        let span = (self.far.cut.pos - self.near.cut.pos).max(1.0e-4);
        let t = ((pos - self.near.cut.pos) / span).clamp(0.0, 1.0);
        let centre = lerp_point(self.near.at.point, self.far.at.point, t);
        let half = lerp(self.near.half, self.far.half, t);
        let scale = lerp(self.near.at.scale, self.far.at.scale, t);
        Placed {
            at: Point2::new(centre.x + n * half, centre.y - scale * rise * frame.half_height),
            scale,
            z: lerp(self.near.at.z, self.far.at.z, t),
        }
    }
}

struct Billboard<'a> {
    texture: &'a str,
    key: u64,
    width: f32,
    height: f32,
    layout: AtlasLayout,
    frame: u32,
}

/// Builds and executes the draw list for one frame.
pub struct Renderer {
    list: DrawList,
    textures: TextureCache,
    batches: Vec<Batch>,
    pub stats: RenderStats,
}

impl Renderer {
    pub fn new(config: &config::Render) -> Self {
        Self {
            list: DrawList::with_capacity(config.draw_list_capacity),
            textures: TextureCache::default(),
            batches: Vec::new(),
            stats: RenderStats::default(),
        }
    }

    pub fn draw_list(&self) -> &DrawList {
        &self.list
    }

    /// Forget cached texture lookups, e.g. after the host reloads its assets.
    pub fn reset_textures(&mut self) {
        self.textures.clear();
    }

    pub fn render(&mut self, sim: &Simulation, target: &mut dyn RenderTarget) {
        profiling::scope!("Renderer::render");
        let (width, height) = target.size();
        let frame = sim.camera_frame(width, height);
        self.build(sim, &frame, target);
        self.list.sort();
        let render = &sim.config.render;
        target.begin_frame(render.sky_color, render.fog_color);
        target.set_camera_roll(frame.roll, frame.pivot);
        self.list.execute(target);
    }

    fn resolve(&mut self, target: &mut dyn RenderTarget, name: &str) -> TextureState {
        let state = self.textures.resolve(target, name);
        if state == TextureState::Missing {
            self.stats.missing_textures += 1;
        }
        state
    }

    fn push(&mut self, depth: f32, layer: Layer, corners: [Point2<f32>; 4], fill: Fill) {
        if !self.list.push(depth, layer, corners, fill) {
            self.stats.overflow += 1;
        }
    }

    /// Walks the visible segments and fills the draw list, unsorted.
    pub fn build(&mut self, sim: &Simulation, frame: &CameraFrame, target: &mut dyn RenderTarget) {
        profiling::scope!("Renderer::build");
        self.list.clear();
        self.batches.clear();
        self.stats = RenderStats::default();
        let track = &sim.track;
        if track.is_empty() {
            return;
        }
        let render = &sim.config.render;
        let segment_length = track.segment_length();
        let base = (frame.pos.z / segment_length).floor() as i64;
        let base_fraction = frame.pos.z / segment_length - base as f32;
        let limit = render.draw_distance.min(track.len() as u32);
        let max_z = limit as f32 * segment_length;

        let road = self.resolve(target, &render.road_texture);
        let cliff_a = self.resolve(target, &render.cliff_textures.0);
        let cliff_b = self.resolve(target, &render.cliff_textures.1);

        let mut x = 0.0;
        let mut dx = -track.segment_at(base).curve * base_fraction;
        let mut near = Cut {
            pos: 0.0,
            x,
            y: track.segment_at(base).y0,
            z: base as f32 * segment_length,
            cliffs: track.cliff_params_at(track.wrap_index(base), 0.0),
        };
        let mut k = 0;
        while k < limit {
            let stride = stride_at(&render.stride, k).min(limit - k);
            for j in 0..stride {
                x += dx;
                dx += track.segment_at(base + (k + j) as i64).curve;
            }
            let last = base + (k + stride) as i64 - 1;
            let far = Cut {
                pos: (k + stride) as f32,
                x,
                y: track.segment_at(last).y1,
                z: (last + 1) as f32 * segment_length,
                cliffs: track.cliff_params_at(track.wrap_index(last), 1.0),
            };
            if let Some(batch) = Self::batch(frame, near, far, sim.config.lanes.road_width) {
                self.stats.batches += 1;
                self.batches.push(batch);
                let fog = |z: f32| fog_amount(z, max_z, render.fog_density);
                if batch.near.at.point.y > batch.far.at.point.y {
                    self.ground(&batch, frame, render, fog(batch.far.at.z));
                    self.road(&batch, render, road, &fog);
                    self.zones(track, base + k as i64, stride, &batch, render);
                }
                self.cliffs(&batch, sim.config.lanes.road_width, frame, cliff_a, cliff_b, render, &fog);
                self.segment_entities(sim, frame, target, &batch, base + k as i64, k, stride, max_z);
            }
            near = far;
            k += stride;
        }

        self.player(sim, frame, target, base, max_z);
        self.particles(sim, frame, target, base, max_z);
        self.stats.overflow = self.list.overflow;
    }

    /// Projects a batch, clipping its near edge to the near plane.
    fn batch(frame: &CameraFrame, near: Cut, far: Cut, road_width: f32) -> Option<Batch> {
        let clip = frame.near_z + 1.0;
        let (z_near, z_far) = (near.z - frame.pos.z, far.z - frame.pos.z);
        if z_far <= clip {
            return None;
        }
        let near = if z_near < clip {
            near.lerp(&far, (clip - z_near) / (z_far - z_near))
        } else {
            near
        };
        let edge = |cut: Cut| {
            frame.project(cut.world(0.0, road_width, 0.0)).map(|at| Edge {
                cut,
                at,
                half: frame.pixels(road_width, at.scale),
            })
        };
        Some(Batch {
            near: edge(near)?,
            far: edge(far)?,
        })
    }

    fn ground(&mut self, batch: &Batch, frame: &CameraFrame, render: &config::Render, fog: f32) {
        // wide enough to stay covered under camera roll
        let (left, right) = (-frame.half_width, 3.0 * frame.half_width);
        let (bottom, top) = (batch.near.at.point.y, batch.far.at.point.y);
        let corners = [
            Point2::new(left, bottom),
            Point2::new(right, bottom),
            Point2::new(right, top),
            Point2::new(left, top),
        ];
        let color = render.ground_color.lerp(render.fog_color, fog);
        self.push(batch.far.at.z, Layer::Ground, corners, Fill::Solid(color));
    }

    fn road(&mut self, batch: &Batch, render: &config::Render, road: TextureState, fog: &dyn Fn(f32) -> f32) {
        let (near, far) = (&batch.near, &batch.far);
        let limit = |range: &std::ops::Range<u32>, wanted: f32| {
            let low = range.start.max(1);
            (wanted.ceil().max(0.0) as u32).clamp(low, range.end.max(low))
        };
        let rows = limit(&render.rows, (near.at.point.y - far.at.point.y) / render.row_px.max(1.0));
        let cols = limit(&render.cols, 2.0 * near.half / render.col_px.max(1.0));
        for row in 0..rows {
            let t0 = row as f32 / rows as f32;
            let t1 = (row + 1) as f32 / rows as f32;
            let (c0, c1) = (
                lerp_point(near.at.point, far.at.point, t0),
                lerp_point(near.at.point, far.at.point, t1),
            );
            let (h0, h1) = (lerp(near.half, far.half, t0), lerp(near.half, far.half, t1));
            let (v1, v0) = (lerp(near.cut.pos, far.cut.pos, t0), lerp(near.cut.pos, far.cut.pos, t1));
            let amount = fog(lerp(near.at.z, far.at.z, 0.5 * (t0 + t1)));
            for col in 0..cols {
                let u0 = col as f32 / cols as f32;
                let u1 = (col + 1) as f32 / cols as f32;
                let (l, r) = (track::ratio_to_lane(u0), track::ratio_to_lane(u1));
                let corners = [
                    Point2::new(c0.x + l * h0, c0.y),
                    Point2::new(c0.x + r * h0, c0.y),
                    Point2::new(c1.x + r * h1, c1.y),
                    Point2::new(c1.x + l * h1, c1.y),
                ];
                let uv = UvRect { u0, v0, u1, v1 };
                let fill = match road {
                    TextureState::Ready(id) => Fill::Texture { id, uv, fog: amount },
                    _ => Fill::Solid(Color::from_key(&render.road_texture, 0).lerp(render.fog_color, amount)),
                };
                self.push(far.at.z, Layer::Road, corners, fill);
                self.stats.road_cells += 1;
            }
        }
    }

    fn zones(&mut self, track: &Track, first: i64, stride: u32, batch: &Batch, render: &config::Render) {
        let zone = (0..stride as i64)
            .flat_map(|j| track.segment_at(first + j).features.boost_zones.iter())
            .find(|zone| zone.visible);
        let Some(zone) = zone else {
            return;
        };
        let (near, far) = (&batch.near, &batch.far);
        let corners = [
            Point2::new(near.at.point.x + zone.min * near.half, near.at.point.y),
            Point2::new(near.at.point.x + zone.max * near.half, near.at.point.y),
            Point2::new(far.at.point.x + zone.max * far.half, far.at.point.y),
            Point2::new(far.at.point.x + zone.min * far.half, far.at.point.y),
        ];
        self.push(far.at.z, Layer::Road, corners, Fill::Solid(render.boost_color));
    }

    #[allow(clippy::too_many_arguments)]
    fn cliffs(
        &mut self,
        batch: &Batch,
        road_width: f32,
        frame: &CameraFrame,
        texture_a: TextureState,
        texture_b: TextureState,
        render: &config::Render,
        fog: &dyn Fn(f32) -> f32,
    ) {
        let (near, far) = (&batch.near.cut, &batch.far.cut);
        let amount = fog(batch.far.at.z);
        for side in [Side::Left, Side::Right] {
            let (pn, pf) = (near.cliffs.side(side), far.cliffs.side(side));
            if pn.is_flat() && pf.is_flat() {
                continue;
            }
            let sign = side.sign();
            // road edge, end of A, end of B
            let outline = |cut: &Cut, profile: &crate::cliff::CliffProfile| {
                let a = 1.0 + profile.a.dx.max(0.0);
                let b = a + profile.b.dx.max(0.0);
                [
                    frame.project(cut.world(sign, road_width, 0.0)),
                    frame.project(cut.world(sign * a, road_width, profile.a.dy)),
                    frame.project(cut.world(sign * b, road_width, profile.a.dy + profile.b.dy)),
                ]
            };
            let [Some(ne), Some(na), Some(nb)] = outline(near, pn) else {
                continue;
            };
            let [Some(fe), Some(fa), Some(fb)] = outline(far, pf) else {
                continue;
            };
            let upper = pn.a.dy + pn.b.dy + pf.a.dy + pf.b.dy >= 0.0;
            let (inner, outer) = if upper {
                (Layer::UpperInner, Layer::UpperOuter)
            } else {
                (Layer::LowerInner, Layer::LowerOuter)
            };
            let (v1, v0) = (near.pos, far.pos);
            let sections = [
                (inner, [ne, na, fa, fe], texture_a, &render.cliff_textures.0, pn.a.dx.max(pf.a.dx)),
                (outer, [na, nb, fb, fa], texture_b, &render.cliff_textures.1, pn.b.dx.max(pf.b.dx)),
            ];
            for (layer, points, texture, name, extent) in sections {
                if extent <= 1.0e-4 {
                    continue;
                }
                let corners = points.map(|p| p.point);
                let fill = match texture {
                    TextureState::Ready(id) => Fill::Texture {
                        id,
                        uv: UvRect { u0: 0.0, v0, u1: 1.0, v1 },
                        fog: amount,
                    },
                    _ => Fill::Solid(Color::from_key(name, side as u64).lerp(render.fog_color, amount)),
                };
                self.push(batch.far.at.z, layer, corners, fill);
                self.stats.cliff_quads += 1;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn billboard(
        &mut self,
        target: &mut dyn RenderTarget,
        frame: &CameraFrame,
        render: &config::Render,
        placed: &Placed,
        sprite: &Billboard,
        max_z: f32,
    ) -> bool {
        let width = frame.pixels(sprite.width, placed.scale);
        let height = frame.pixels(sprite.height, placed.scale);
        let x = placed.at.x;
        if height < render.min_sprite_px || x + 0.5 * width < 0.0 || x - 0.5 * width > 2.0 * frame.half_width {
            self.stats.sprites_culled += 1;
            return false;
        }
        let (bottom, top) = (placed.at.y, placed.at.y - height);
        let corners = [
            Point2::new(x - 0.5 * width, bottom),
            Point2::new(x + 0.5 * width, bottom),
            Point2::new(x + 0.5 * width, top),
            Point2::new(x - 0.5 * width, top),
        ];
        let fog = fog_amount(placed.z, max_z, render.fog_density);
        let fill = match self.resolve(target, sprite.texture) {
            TextureState::Ready(id) => Fill::Texture {
                id,
                uv: sprite.layout.frame_rect(sprite.frame),
                fog,
            },
            _ => Fill::Solid(Color::from_key(sprite.texture, sprite.key).lerp(render.fog_color, fog)),
        };
        self.push(placed.z, Layer::Billboard, corners, fill);
        true
    }

    /// Traffic and sprites listed in the batch's segments.
    #[allow(clippy::too_many_arguments)]
    fn segment_entities(
        &mut self,
        sim: &Simulation,
        frame: &CameraFrame,
        target: &mut dyn RenderTarget,
        batch: &Batch,
        first: i64,
        k: u32,
        stride: u32,
        max_z: f32,
    ) {
        let track = &sim.track;
        let render = &sim.config.render;
        let road_width = sim.config.lanes.road_width;
        for j in 0..stride {
            let segment = track.segment_at(first + j as i64);
            let pos = (k + j) as f32;
            for &id in &segment.cars {
                let car = &sim.npcs[id];
                let at = pos + track.fraction_of(car.s);
                if at < batch.near.cut.pos {
                    continue;
                }
                let rise = track.cliff_surface_height_at(car.s, car.n);
                let placed = batch.place(at, car.n, rise, frame);
                let Some(def) = sim.catalog.def(car.def) else {
                    continue;
                };
                let layout = def.layout();
                // lateral viewing angle picks the column, road slope the row
                let world_x = track::lateral_to_world(car.n, road_width) + lerp(batch.near.cut.x, batch.far.cut.x, 0.5);
                let angle = ((world_x - frame.pos.x) / placed.z.max(1.0)).atan();
                let column = bucket(angle / render.view_angle_span.max(1.0e-3), layout.columns);
                let row = slope_row(track.ground_profile_at(car.s).slope, layout.rows, render.level_slope);
                let sprite = Billboard {
                    texture: def.texture_name(),
                    key: id as u64,
                    width: def.width,
                    height: def.height,
                    layout,
                    frame: layout.frame_at(column, row),
                };
                if self.billboard(target, frame, render, &placed, &sprite, max_z) {
                    self.stats.sprites_drawn += 1;
                }
            }
            for &id in &segment.sprites {
                let item = &sim.sprites[id];
                let at = pos + track.fraction_of(item.s);
                if item.hidden || at < batch.near.cut.pos {
                    continue;
                }
                let rise = track.cliff_surface_height_at(item.s, item.n);
                let placed = batch.place(at, item.n, rise, frame);
                let Some(def) = sim.catalog.def(item.def) else {
                    continue;
                };
                let sprite = Billboard {
                    texture: def.texture_name(),
                    key: (sim.npcs.len() + id) as u64,
                    width: def.width * item.scale,
                    height: def.height * item.scale,
                    layout: def.layout(),
                    frame: item.frame,
                };
                if self.billboard(target, frame, render, &placed, &sprite, max_z) {
                    self.stats.sprites_drawn += 1;
                }
            }
        }
    }

    fn locate(&self, pos: f32) -> Option<Batch> {
        let index = self.batches.partition_point(|batch| batch.far.cut.pos <= pos);
        self.batches.get(index).filter(|batch| batch.covers(pos)).copied()
    }

    fn player(&mut self, sim: &Simulation, frame: &CameraFrame, target: &mut dyn RenderTarget, base: i64, max_z: f32) {
        let track = &sim.track;
        let player = &sim.player;
        let pos = (player.s - base as f32 * track.segment_length()).rem_euclid(track.length()) / track.segment_length();
        let Some(batch) = self.locate(pos) else {
            return;
        };
        let placed = batch.place(pos, player.n, player.y - track.elevation_at(player.s), frame);
        let Some(def) = sim.catalog.def(sim.player_def) else {
            return;
        };
        let layout = def.layout();
        let steer = player.steer_rate / sim.config.physics.steer_rate.max(1.0e-3);
        let sprite = Billboard {
            texture: def.texture_name(),
            key: u64::MAX,
            width: def.width,
            height: def.height,
            layout,
            frame: layout.frame_at(
                bucket(steer, layout.columns),
                slope_row(player.slope, layout.rows, sim.config.render.level_slope),
            ),
        };
        if self.billboard(target, frame, &sim.config.render, &placed, &sprite, max_z) {
            self.stats.sprites_drawn += 1;
        }
    }

    fn particles(&mut self, sim: &Simulation, frame: &CameraFrame, target: &mut dyn RenderTarget, base: i64, max_z: f32) {
        let track = &sim.track;
        let render = &sim.config.render;
        let config = &sim.config.particles;
        let origin = base as f32 * track.segment_length();
        for particle in sim.particles.iter() {
            let pos = (particle.s - origin).rem_euclid(track.length()) / track.segment_length();
            let Some(batch) = self.locate(pos) else {
                continue;
            };
            let placed = batch.place(pos, particle.n, particle.y - track.elevation_at(particle.s), frame);
            let size = frame.pixels(particle.size, placed.scale) * (0.5 + 0.5 * particle.fade());
            if size < render.min_sprite_px {
                continue;
            }
            let half = 0.5 * size;
            let corners = [
                Point2::new(placed.at.x - half, placed.at.y),
                Point2::new(placed.at.x + half, placed.at.y),
                Point2::new(placed.at.x + half, placed.at.y - size),
                Point2::new(placed.at.x - half, placed.at.y - size),
            ];
            let fill = match particle.kind {
                ParticleKind::Spark => Fill::Solid(config.spark_color),
                ParticleKind::Smoke => match self.resolve(target, &config.texture) {
                    TextureState::Ready(id) => Fill::Texture {
                        id,
                        uv: UvRect::FULL,
                        fog: fog_amount(placed.z, max_z, render.fog_density),
                    },
                    _ => Fill::Solid(render.fog_color),
                },
            };
            self.push(placed.z, Layer::Billboard, corners, fill);
            self.stats.particles_drawn += 1;
        }
    }
}

/// Maps `value` in `[-1, 1]` onto `count` atlas columns.
fn bucket(value: f32, count: u32) -> u32 {
    let count = count.max(1);
    let t = 0.5 * (value.clamp(-1.0, 1.0) + 1.0);
    ((t * (count - 1) as f32).round() as u32).min(count - 1)
}

/// Uphill on the first row, downhill on the last.
fn slope_row(slope: f32, rows: u32, level: f32) -> u32 {
    match rows {
        0 | 1 => 0,
        2 => (slope < -level) as u32,
        _ if slope > level => 0,
        _ if slope < -level => rows - 1,
        _ => rows / 2,
    }
}

use std::collections::HashMap;

use nalgebra::Point2;

use crate::sprite::UvRect;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }

    /// Opaque `0xAARRGGBB`.
    pub fn to_argb(self) -> u32 {
        0xff00_0000 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    pub fn from_argb(value: u32) -> Self {
        Self::rgb((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }

    /// Stable, fairly saturated color for a texture key and entity id.
    pub fn from_key(key: &str, id: u64) -> Self {
        // FNV-1a
        let mut hash = 0xcbf2_9ce4_8422_2325u64;
        for byte in key.bytes().chain(id.to_le_bytes()) {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        let channel = |shift: u32| 64 + ((hash >> shift) & 0xbf) as u8;
        Self::rgb(channel(0), channel(16), channel(32))
    }
}

pub type TextureId = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureState {
    Ready(TextureId),
    /// Still loading; ask again next frame.
    Pending,
    Missing,
}

/// Drawing surface the renderer talks to.
///
/// Quads are given as `[bottom_left, bottom_right, top_right, top_left]` in pixels,
/// with `uv.u0`/`uv.u1` across and `uv.v1` at the bottom edge.
pub trait RenderTarget {
    fn size(&self) -> (u32, u32);
    fn begin_frame(&mut self, clear: Color, fog: Color);
    fn set_camera_roll(&mut self, angle: f32, pivot: Point2<f32>);
    /// `fog` in `[0, 1]` blends the texels toward the frame's fog color.
    fn draw_textured_quad(&mut self, texture: TextureId, corners: &[Point2<f32>; 4], uv: &UvRect, fog: f32);
    fn draw_solid_quad(&mut self, corners: &[Point2<f32>; 4], color: Color);
    /// Deferred load keyed by name; called every frame until it stops returning `Pending`.
    fn request_texture(&mut self, name: &str) -> TextureState;
}

/// Remembers settled texture lookups so the target only sees repeated requests while pending.
#[derive(Default)]
pub struct TextureCache {
    states: HashMap<String, TextureState>,
}

impl TextureCache {
    pub fn resolve(&mut self, target: &mut dyn RenderTarget, name: &str) -> TextureState {
        match self.states.get(name) {
            Some(&TextureState::Pending) | None => {}
            Some(&settled) => return settled,
        }
        let state = target.request_texture(name);
        if state == TextureState::Missing {
            log::warn!("Texture '{}' is missing, using a flat color", name);
        }
        self.states.insert(name.to_string(), state);
        state
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counting {
        requests: u32,
        slow_polls: u32,
    }

    impl RenderTarget for Counting {
        fn size(&self) -> (u32, u32) {
            (1, 1)
        }
        fn begin_frame(&mut self, _clear: Color, _fog: Color) {}
        fn set_camera_roll(&mut self, _angle: f32, _pivot: Point2<f32>) {}
        fn draw_textured_quad(&mut self, _: TextureId, _: &[Point2<f32>; 4], _: &UvRect, _: f32) {}
        fn draw_solid_quad(&mut self, _: &[Point2<f32>; 4], _: Color) {}
        fn request_texture(&mut self, name: &str) -> TextureState {
            self.requests += 1;
            match name {
                "road" => TextureState::Ready(3),
                "slow" => {
                    self.slow_polls += 1;
                    if self.slow_polls < 2 {
                        TextureState::Pending
                    } else {
                        TextureState::Ready(4)
                    }
                }
                _ => TextureState::Missing,
            }
        }
    }

    #[test]
    fn settled_lookups_are_cached() {
        let mut target = Counting::default();
        let mut cache = TextureCache::default();
        assert_eq!(cache.resolve(&mut target, "road"), TextureState::Ready(3));
        assert_eq!(cache.resolve(&mut target, "road"), TextureState::Ready(3));
        assert_eq!(cache.resolve(&mut target, "nope"), TextureState::Missing);
        assert_eq!(cache.resolve(&mut target, "nope"), TextureState::Missing);
        assert_eq!(target.requests, 2);
        assert_eq!(cache.resolve(&mut target, "slow"), TextureState::Pending);
        assert_eq!(cache.resolve(&mut target, "slow"), TextureState::Ready(4));
        assert_eq!(target.requests, 4);
    }

    #[test]
    fn key_colors_are_stable() {
        assert_eq!(Color::from_key("tree", 4), Color::from_key("tree", 4));
        assert_ne!(Color::from_key("tree", 4), Color::from_key("tree", 5));
        let c = Color::rgb(10, 20, 30);
        assert_eq!(Color::from_argb(c.to_argb()), c);
        assert_eq!(c.lerp(Color::rgb(30, 40, 50), 0.5), Color::rgb(20, 30, 40));
    }
}

use std::{collections::HashMap, fs, io, path::Path, path::PathBuf};

use nalgebra::{Point2, Rotation2, Vector2};

use crate::sprite::UvRect;
use crate::texture::{Color, RenderTarget, TextureId, TextureState};
use crate::LoadError;

/// Texels at or below this alpha are not drawn.
const ALPHA_CUTOFF: u8 = 127;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Texel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl From<Color> for Texel {
    fn from(color: Color) -> Self {
        Self {
            r: color.r,
            g: color.g,
            b: color.b,
            a: 0xff,
        }
    }
}

impl Texel {
    fn color(self) -> Color {
        Color::rgb(self.r, self.g, self.b)
    }
}

pub struct Image {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<Texel>,
}

impl Image {
    pub fn load_png(path: &Path) -> Result<Self, LoadError> {
        profiling::scope!("Image::load_png");
        let file = fs::File::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let image_error = |source| LoadError::Image {
            path: path.to_path_buf(),
            source,
        };
        let mut decoder = png::Decoder::new(io::BufReader::new(file));
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder.read_info().map_err(image_error)?;
        let mut buf = vec![0u8; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).map_err(image_error)?;
        let bytes = &buf[..info.buffer_size()];

        let texels = match info.color_type {
            png::ColorType::Rgba => bytemuck::cast_slice::<u8, Texel>(bytes).to_vec(),
            png::ColorType::Rgb => bytes
                .chunks_exact(3)
                .map(|c| Texel { r: c[0], g: c[1], b: c[2], a: 0xff })
                .collect(),
            png::ColorType::GrayscaleAlpha => bytes
                .chunks_exact(2)
                .map(|c| Texel { r: c[0], g: c[0], b: c[0], a: c[1] })
                .collect(),
            // palettes are expanded by the decoder
            png::ColorType::Grayscale | png::ColorType::Indexed => bytes
                .iter()
                .map(|&v| Texel { r: v, g: v, b: v, a: 0xff })
                .collect(),
        };
        Ok(Self {
            width: info.width,
            height: info.height,
            texels,
        })
    }

    fn sample(&self, u: f32, v: f32) -> Texel {
        let wrap = |t: f32| if (0.0..=1.0).contains(&t) { t } else { t.rem_euclid(1.0) };
        let x = ((wrap(u) * self.width as f32) as u32).min(self.width.saturating_sub(1));
        let y = ((wrap(v) * self.height as f32) as u32).min(self.height.saturating_sub(1));
        self.texels
            .get((y * self.width + x) as usize)
            .copied()
            .unwrap_or_default()
    }
}

#[derive(Clone, Copy)]
struct Vertex {
    pos: Point2<f32>,
    uv: Vector2<f32>,
}

/// CPU framebuffer implementing the render target contract.
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<Texel>,
    fog: Color,
    roll: Rotation2<f32>,
    pivot: Point2<f32>,
    texture_root: PathBuf,
    images: Vec<Image>,
    names: HashMap<String, TextureState>,
}

impl Canvas {
    /// Textures are looked up as `<texture_root>/<name>.png`.
    pub fn new(width: u32, height: u32, texture_root: impl Into<PathBuf>) -> Self {
        Self {
            width,
            height,
            pixels: vec![Texel::default(); (width * height) as usize],
            fog: Color::default(),
            roll: Rotation2::identity(),
            pivot: Point2::origin(),
            texture_root: texture_root.into(),
            images: Vec::new(),
            names: HashMap::new(),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).map(|t| t.color())
    }

    /// Registers an already decoded image under `name`.
    pub fn insert_texture(&mut self, name: &str, image: Image) -> TextureId {
        let id = self.images.len() as TextureId;
        self.images.push(image);
        self.names.insert(name.to_string(), TextureState::Ready(id));
        id
    }

    pub fn save_png(&self, path: &Path) -> Result<(), png::EncodingError> {
        profiling::scope!("Canvas::save_png");
        let file = fs::File::create(path)?;
        let mut encoder = png::Encoder::new(io::BufWriter::new(file), self.width, self.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(bytemuck::cast_slice(&self.pixels))?;
        Ok(())
    }

    fn rolled(&self, point: &Point2<f32>) -> Point2<f32> {
        self.pivot + self.roll * (point - self.pivot)
    }

    /// Fills one triangle, calling `shade` with interpolated texture coordinates.
    fn triangle(&mut self, tri: [Vertex; 3], mut shade: impl FnMut(Vector2<f32>) -> Option<Texel>) {
        let [a, b, c] = tri;
        let edge = |p: &Point2<f32>, q: &Point2<f32>, r: &Point2<f32>| (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x);
        let area = edge(&a.pos, &b.pos, &c.pos);
        if area.abs() < 1.0e-6 {
            return;
        }
        let min_x = a.pos.x.min(b.pos.x).min(c.pos.x).floor().max(0.0) as u32;
        let min_y = a.pos.y.min(b.pos.y).min(c.pos.y).floor().max(0.0) as u32;
        let max_x = (a.pos.x.max(b.pos.x).max(c.pos.x).ceil().max(0.0) as u32).min(self.width);
        let max_y = (a.pos.y.max(b.pos.y).max(c.pos.y).ceil().max(0.0) as u32).min(self.height);
        for y in min_y..max_y {
            for x in min_x..max_x {
                let p = Point2::new(x as f32 + 0.5, y as f32 + 0.5);
                let wa = edge(&b.pos, &c.pos, &p) / area;
                let wb = edge(&c.pos, &a.pos, &p) / area;
                let wc = edge(&a.pos, &b.pos, &p) / area;
                if wa < 0.0 || wb < 0.0 || wc < 0.0 {
                    continue;
                }
                let uv = a.uv * wa + b.uv * wb + c.uv * wc;
                if let Some(texel) = shade(uv) {
                    self.pixels[(y * self.width + x) as usize] = texel;
                }
            }
        }
    }

    fn quad(&mut self, corners: &[Point2<f32>; 4], uv: &UvRect, mut shade: impl FnMut(Vector2<f32>) -> Option<Texel>) {
        let coords = [
            Vector2::new(uv.u0, uv.v1),
            Vector2::new(uv.u1, uv.v1),
            Vector2::new(uv.u1, uv.v0),
            Vector2::new(uv.u0, uv.v0),
        ];
        let v: [Vertex; 4] = std::array::from_fn(|i| Vertex {
            pos: self.rolled(&corners[i]),
            uv: coords[i],
        });
        self.triangle([v[0], v[1], v[2]], &mut shade);
        self.triangle([v[0], v[2], v[3]], &mut shade);
    }
}

impl RenderTarget for Canvas {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn begin_frame(&mut self, clear: Color, fog: Color) {
        self.pixels.fill(clear.into());
        self.fog = fog;
        self.roll = Rotation2::identity();
    }

    fn set_camera_roll(&mut self, angle: f32, pivot: Point2<f32>) {
        self.roll = Rotation2::new(angle);
        self.pivot = pivot;
    }

    fn draw_textured_quad(&mut self, texture: TextureId, corners: &[Point2<f32>; 4], uv: &UvRect, fog: f32) {
        // taken out so the rasterizer can borrow the framebuffer
        let images = std::mem::take(&mut self.images);
        if let Some(image) = images.get(texture as usize) {
            let fog_color = self.fog;
            self.quad(corners, uv, |uv| {
                let texel = image.sample(uv.x, uv.y);
                (texel.a > ALPHA_CUTOFF).then(|| texel.color().lerp(fog_color, fog).into())
            });
        }
        self.images = images;
    }

    fn draw_solid_quad(&mut self, corners: &[Point2<f32>; 4], color: Color) {
        let texel = Texel::from(color);
        self.quad(corners, &UvRect::FULL, |_| Some(texel));
    }

    fn request_texture(&mut self, name: &str) -> TextureState {
        if let Some(&state) = self.names.get(name) {
            return state;
        }
        let path = self.texture_root.join(format!("{}.png", name));
        let state = match Image::load_png(&path) {
            Ok(image) => {
                log::info!("Loaded texture '{}' ({}x{})", name, image.width, image.height);
                let id = self.images.len() as TextureId;
                self.images.push(image);
                TextureState::Ready(id)
            }
            Err(e) => {
                log::warn!("Texture '{}' falls back to a solid color: {}", name, e);
                TextureState::Missing
            }
        };
        self.names.insert(name.to_string(), state);
        state
    }
}

use switchback::{
    canvas::Canvas,
    cliff::{CliffRow, CliffSeries},
    config::Config,
    input::Intent,
    loader::{self, LoadedTrack},
    render::{Layer, Renderer},
    sim::{NoHooks, Simulation},
    sprite::{Catalog, Sprite, UvRect},
    texture::{Color, RenderTarget, TextureId, TextureState},
    Track,
};

#[derive(Default)]
struct Recorder {
    frames: u32,
    solid: u32,
    textured: u32,
    requests: Vec<String>,
}

impl RenderTarget for Recorder {
    fn size(&self) -> (u32, u32) {
        (640, 400)
    }
    fn begin_frame(&mut self, _clear: Color, _fog: Color) {
        self.frames += 1;
    }
    fn set_camera_roll(&mut self, _angle: f32, _pivot: nalgebra::Point2<f32>) {}
    fn draw_textured_quad(&mut self, _texture: TextureId, _corners: &[nalgebra::Point2<f32>; 4], _uv: &UvRect, _fog: f32) {
        self.textured += 1;
    }
    fn draw_solid_quad(&mut self, _corners: &[nalgebra::Point2<f32>; 4], _color: Color) {
        self.solid += 1;
    }
    fn request_texture(&mut self, name: &str) -> TextureState {
        self.requests.push(name.to_string());
        TextureState::Missing
    }
}

fn simulation(track: Track) -> Simulation {
    let mut config = Config::default();
    config.traffic.count = 0;
    let loaded = LoadedTrack {
        track,
        sprites: Vec::new(),
    };
    Simulation::new(config, Catalog::builtin(), loaded, Box::new(NoHooks))
}

#[test]
fn flat_track_draws_road_with_fallback_colors() {
    let sim = simulation(Track::flat(400, 200.0));
    let mut renderer = Renderer::new(&sim.config.render);
    let mut target = Recorder::default();
    renderer.render(&sim, &mut target);

    let stats = &renderer.stats;
    assert!(stats.batches > 0);
    assert!(stats.road_cells > 0);
    assert_eq!(stats.cliff_quads, 0);
    assert_eq!(stats.overflow, 0);
    assert_eq!(target.frames, 1);
    assert_eq!(target.textured, 0);
    assert_eq!(target.solid as usize, renderer.draw_list().len());
    // each texture is asked for once, then remembered as missing
    renderer.render(&sim, &mut target);
    assert_eq!(target.requests.iter().filter(|name| *name == "road").count(), 1);

    let depths: Vec<f32> = renderer.draw_list().commands().iter().map(|c| c.depth).collect();
    assert!(depths.windows(2).all(|pair| pair[0] >= pair[1]));
}

#[test]
fn empty_catalog_skips_billboards() {
    let mut config = Config::default();
    config.traffic.count = 0;
    let loaded = LoadedTrack {
        track: Track::flat(100, 200.0),
        sprites: Vec::new(),
    };
    let mut sim = Simulation::new(config, Catalog::new(Vec::new()), loaded, Box::new(NoHooks));
    sim.frame(1.0 / 60.0, &Intent::default());
    let mut renderer = Renderer::new(&sim.config.render);
    renderer.render(&sim, &mut Recorder::default());
    assert!(renderer.stats.road_cells > 0);
    assert_eq!(renderer.stats.sprites_drawn, 0);
    assert!(renderer.draw_list().commands().iter().all(|c| c.layer != Layer::Billboard));
}

fn with_sprites(lanes: &[f32], min_sprite_px: f32) -> Renderer {
    let mut config = Config::default();
    config.traffic.count = 0;
    config.render.min_sprite_px = min_sprite_px;
    let catalog = Catalog::builtin();
    let def = catalog.find("car01").unwrap();
    let loaded = LoadedTrack {
        track: Track::flat(200, 200.0),
        sprites: lanes.iter().map(|&n| Sprite::new(def, 3000.0, n, 1.0, 0)).collect(),
    };
    let sim = Simulation::new(config, catalog, loaded, Box::new(NoHooks));
    let mut renderer = Renderer::new(&sim.config.render);
    renderer.render(&sim, &mut Recorder::default());
    renderer
}

#[test]
fn billboards_off_screen_or_too_small_are_culled() {
    let visible = with_sprites(&[0.0], 2.0);
    let both = with_sprites(&[0.0, 80.0], 2.0);
    assert!(visible.stats.sprites_drawn >= 1);
    assert_eq!(both.stats.sprites_drawn, visible.stats.sprites_drawn);
    assert_eq!(both.stats.sprites_culled, visible.stats.sprites_culled + 1);

    let tiny = with_sprites(&[0.0], 1.0e6);
    assert_eq!(tiny.stats.sprites_drawn, 0);
    assert!(tiny.stats.sprites_culled >= 1);
    assert!(tiny.draw_list().commands().iter().all(|c| c.layer != Layer::Billboard));
}

#[test]
fn cliffs_sort_above_or_below_the_road() {
    let mut track = Track::flat(200, 200.0);
    let rows: Vec<CliffRow> = ron::de::from_str(
        "[(side: Left, length: 4, a: (0.5, 800.0), b: (1.0, 1200.0)),
          (side: Right, length: 4, a: (0.5, -800.0), b: (1.0, -1200.0))]",
    )
    .unwrap();
    track.set_cliffs(CliffSeries::build(&rows, track.len()));
    let sim = simulation(track);
    let mut renderer = Renderer::new(&sim.config.render);
    renderer.render(&sim, &mut Recorder::default());

    assert!(renderer.stats.cliff_quads > 0);
    let layers: Vec<Layer> = renderer.draw_list().commands().iter().map(|c| c.layer).collect();
    for layer in [Layer::LowerOuter, Layer::LowerInner, Layer::Road, Layer::UpperInner, Layer::UpperOuter] {
        assert!(layers.contains(&layer), "{:?} missing", layer);
    }
}

#[test]
fn shipped_data_runs_and_renders() {
    let config = Config::load("data/config.ron".as_ref()).unwrap();
    let catalog = loader::load_catalog(config.catalog.as_ref());
    assert!(catalog.find("barrel").is_some());
    let loaded = loader::load_track(&config, &catalog).unwrap();
    assert!(!loaded.sprites.is_empty());
    let mut sim = Simulation::new(config, catalog, loaded, Box::new(NoHooks));
    let intent = Intent {
        throttle: 1.0,
        ..Default::default()
    };
    let mut steps = 0;
    for _ in 0..180 {
        steps += sim.frame(1.0 / 60.0, &intent);
    }
    assert!(steps >= 179);
    assert!(sim.player.s > 0.0);

    let mut renderer = Renderer::new(&sim.config.render);
    let mut canvas = Canvas::new(320, 200, "data/textures");
    renderer.render(&sim, &mut canvas);
    assert!(renderer.stats.road_cells > 0);
    assert!(renderer.stats.cliff_quads > 0);
    assert_eq!(renderer.stats.overflow, 0);
    // the road fills the bottom centre of the frame
    assert_ne!(canvas.pixel(160, 195), Some(sim.config.render.sky_color));
}

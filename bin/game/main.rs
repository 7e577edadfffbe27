use clap::Parser as _;
use switchback::{
    canvas::Canvas,
    config::Config,
    input::{self, Gamepad, Keyboard},
    loader,
    render::Renderer,
    sim::{SimHooks, Simulation},
};

use std::{fs, path::PathBuf, time};

/// Drives the simulation without a window and dumps rendered frames.
#[derive(clap::Parser, Debug)]
#[command(name = "game")]
struct Args {
    #[arg(long, default_value = "data/config.ron")]
    config: PathBuf,
    /// Timed key presses, as a RON list of cues. Full throttle when absent.
    #[arg(long)]
    script: Option<PathBuf>,
    #[arg(long, default_value_t = 600)]
    frames: u32,
    /// Write a snapshot every this many frames; 0 disables snapshots.
    #[arg(long, default_value_t = 60)]
    snapshot_every: u32,
    #[arg(long, default_value = "frames")]
    out: PathBuf,
    #[arg(long, default_value = "data/textures")]
    textures: PathBuf,
    #[arg(long, default_value_t = 640)]
    width: u32,
    #[arg(long, default_value_t = 400)]
    height: u32,
    /// Run the countdown and a timed race instead of free driving.
    #[arg(long)]
    race: bool,
}

#[derive(Clone, Copy, Debug, serde::Deserialize)]
enum Key {
    Left,
    Right,
    Throttle,
    Brake,
    Hop,
    Boost,
    Reset,
}

impl Key {
    fn code(self) -> winit::keyboard::KeyCode {
        use winit::keyboard::KeyCode as Kc;
        match self {
            Self::Left => Kc::ArrowLeft,
            Self::Right => Kc::ArrowRight,
            Self::Throttle => Kc::ArrowUp,
            Self::Brake => Kc::ArrowDown,
            Self::Hop => Kc::Space,
            Self::Boost => Kc::KeyN,
            Self::Reset => Kc::KeyR,
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
struct Cue {
    /// Seconds since the start of the run.
    at: f32,
    key: Key,
    #[serde(default = "pressed")]
    down: bool,
}

fn pressed() -> bool {
    true
}

struct Report;

impl SimHooks for Report {
    fn on_scene_reset_requested(&mut self) {
        log::info!("Scene reset requested");
    }
    fn on_respawn_requested(&mut self, s: f32, n: f32) {
        log::info!("Respawn at s={:.0} n={:.2}", s, n);
    }
    fn on_race_finished(&mut self, elapsed_ms: u64) {
        log::info!("Race finished in {:.3}s", elapsed_ms as f32 / 1000.0);
    }
    fn on_pickup_collected(&mut self, sprite: usize) {
        log::debug!("Picked up sprite {}", sprite);
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    log::info!("Initializing");
    let config = Config::load(&args.config).expect("Unable to load the main config");
    let catalog = loader::load_catalog(PathBuf::from(&config.catalog).as_path());
    let loaded = loader::load_track(&config, &catalog).expect("Unable to load the track");

    let mut cues = match args.script {
        Some(ref path) => loader::read_ron::<Vec<Cue>>(path).expect("Unable to load the input script"),
        None => vec![Cue {
            at: 0.0,
            key: Key::Throttle,
            down: true,
        }],
    };
    cues.sort_by(|a, b| a.at.total_cmp(&b.at));

    let dt = config.physics.dt;
    let mut renderer = Renderer::new(&config.render);
    let mut canvas = Canvas::new(args.width, args.height, &args.textures);
    let mut sim = Simulation::new(config, catalog, loaded, Box::new(Report));
    if args.race {
        sim.start_race();
    }
    if args.snapshot_every != 0 {
        fs::create_dir_all(&args.out).expect("Unable to create the output directory");
    }

    let mut keyboard = Keyboard::default();
    let pad = Gamepad::default();
    let mut next_cue = 0;
    let start = time::Instant::now();
    for frame in 0..args.frames {
        let now = frame as f32 * dt;
        while let Some(cue) = cues.get(next_cue).filter(|cue| cue.at <= now) {
            keyboard.on_key(cue.key.code(), cue.down);
            next_cue += 1;
        }
        let intent = input::merge(&keyboard, &pad);
        sim.frame(dt, &intent);

        if args.snapshot_every != 0 && frame % args.snapshot_every == 0 {
            renderer.render(&sim, &mut canvas);
            let path = args.out.join(format!("frame_{:05}.png", frame));
            if let Err(e) = canvas.save_png(&path) {
                log::error!("Unable to write {}: {}", path.display(), e);
            }
            log::info!(
                "Frame {}: s={:.0} v={:.0} {:?}",
                frame,
                sim.player.s,
                sim.player.forward_speed(),
                renderer.stats
            );
        }
    }

    log::info!("Simulated {} frames in {:?}", args.frames, start.elapsed());
    log::info!("Race: {:?}, laps {}", sim.race.phase, sim.race.laps());
    log::info!("{:#?}", sim.metrics);
}

pub mod camera;
pub mod canvas;
pub mod cliff;
pub mod collision;
pub mod config;
pub mod easing;
pub mod error;
pub mod input;
pub mod loader;
pub mod metrics;
pub mod particles;
pub mod physics;
pub mod pool;
pub mod race;
pub mod render;
pub mod sim;
pub mod sprite;
pub mod texture;
pub mod track;
pub mod traffic;

pub use error::LoadError;
pub use sim::{SimHooks, Simulation};
pub use track::Track;

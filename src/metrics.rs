/// Gameplay counters consumed by the HUD.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metrics {
    pub near_misses: u32,
    pub npc_hits: u32,
    pub sprite_hits: u32,
    pub rail_hits: u32,
    pub rail_contact_time: f32,
    pub pickups: u32,
    pub boosts: u32,
    pub drift_boosts: u32,
    pub jumps: u32,
    pub airtime: f32,
    pub respawns: u32,
    pub top_speed: f32,
}

/// Per-frame renderer counters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderStats {
    pub batches: u32,
    pub road_cells: u32,
    pub cliff_quads: u32,
    pub sprites_drawn: u32,
    pub sprites_culled: u32,
    pub particles_drawn: u32,
    /// Entries dropped because the draw list was full.
    pub overflow: u32,
    pub missing_textures: u32,
}

use crate::config;
use crate::track::LapGate;

#[derive(Clone, Debug, PartialEq)]
pub enum Phase {
    Idle,
    Countdown { remaining: f32 },
    Racing,
    /// Holds for a while before reporting; `elapsed` already includes gate bonuses.
    Finished { hold: f32, elapsed: f32 },
}

/// Counts laps by tracking which of `sectors` equal arcs the vehicle is in.
#[derive(Clone, Debug)]
pub struct SectorCounter {
    sectors: u32,
    last: u32,
    progress: i64,
    best_laps: i64,
}

impl SectorCounter {
    pub fn new(sectors: u32, s: f32, track_length: f32) -> Self {
        let mut counter = Self {
            sectors: sectors.max(2),
            last: 0,
            progress: 0,
            best_laps: 0,
        };
        counter.last = counter.index(s, track_length);
        counter.progress = counter.last as i64;
        counter
    }

    pub fn index(&self, s: f32, track_length: f32) -> u32 {
        if track_length <= 0.0 {
            return 0;
        }
        let ratio = s.rem_euclid(track_length) / track_length;
        ((ratio * self.sectors as f32) as u32).min(self.sectors - 1)
    }

    /// Feeds a new position and returns how many laps were newly completed.
    pub fn update(&mut self, s: f32, track_length: f32) -> u32 {
        let current = self.index(s, track_length);
        let sectors = self.sectors as i64;
        let mut delta = current as i64 - self.last as i64;
        // a jump over half the loop went the other way round the seam
        if delta > sectors / 2 {
            delta -= sectors;
        } else if delta < -sectors / 2 {
            delta += sectors;
        }
        self.progress += delta;
        self.last = current;
        let laps = self.progress.div_euclid(sectors);
        if laps > self.best_laps {
            let fresh = laps - self.best_laps;
            self.best_laps = laps;
            fresh as u32
        } else {
            0
        }
    }

    pub fn sector(&self) -> u32 {
        self.last
    }

    pub fn laps(&self) -> u32 {
        self.best_laps.max(0) as u32
    }
}

pub struct Race {
    config: config::Race,
    pub phase: Phase,
    counter: SectorCounter,
    laps_at_start: u32,
    pub elapsed: f32,
    lap_start: f32,
    pub bonus: f32,
    pub lap_times: Vec<f32>,
    pub best_lap: Option<f32>,
}

impl Race {
    pub fn new(config: &config::Race, s: f32, track_length: f32) -> Self {
        Self {
            config: config.clone(),
            phase: Phase::Idle,
            counter: SectorCounter::new(config.sectors, s, track_length),
            laps_at_start: 0,
            elapsed: 0.0,
            lap_start: 0.0,
            bonus: 0.0,
            lap_times: Vec::new(),
            best_lap: None,
        }
    }

    pub fn reset(&mut self, s: f32, track_length: f32) {
        *self = Self::new(&self.config, s, track_length);
    }

    pub fn start(&mut self) {
        log::info!("Race countdown: {}s", self.config.countdown);
        self.phase = Phase::Countdown {
            remaining: self.config.countdown,
        };
    }

    pub fn laps(&self) -> u32 {
        self.counter.laps()
    }

    pub fn race_laps(&self) -> u32 {
        self.counter.laps().saturating_sub(self.laps_at_start)
    }

    pub fn sector(&self) -> u32 {
        self.counter.sector()
    }

    pub fn is_racing(&self) -> bool {
        self.phase == Phase::Racing
    }

    /// Advances the state machine. Returns the reported time in seconds once the finish hold ends.
    pub fn update(&mut self, dt: f32, s: f32, track_length: f32, gate: Option<LapGate>) -> Option<f32> {
        let completed = self.counter.update(s, track_length);
        match self.phase {
            Phase::Idle => None,
            Phase::Countdown { ref mut remaining } => {
                *remaining -= dt;
                if *remaining <= 0.0 {
                    log::info!("Race started");
                    self.phase = Phase::Racing;
                    self.laps_at_start = self.counter.laps();
                    self.elapsed = 0.0;
                    self.lap_start = 0.0;
                    self.bonus = 0.0;
                    self.lap_times.clear();
                    self.best_lap = None;
                }
                None
            }
            Phase::Racing => {
                self.elapsed += dt;
                if let Some(gate) = gate {
                    self.bonus += gate.time_bonus;
                }
                for _ in 0..completed {
                    let lap_time = self.elapsed - self.lap_start;
                    self.lap_start = self.elapsed;
                    self.lap_times.push(lap_time);
                    self.best_lap = Some(self.best_lap.map_or(lap_time, |best| best.min(lap_time)));
                    log::info!("Lap {} in {:.3}s", self.lap_times.len(), lap_time);
                }
                if self.race_laps() >= self.config.laps {
                    let elapsed = (self.elapsed - self.bonus).max(0.0);
                    log::info!("Race finished in {:.3}s", elapsed);
                    self.phase = Phase::Finished {
                        hold: self.config.finish_hold,
                        elapsed,
                    };
                }
                None
            }
            Phase::Finished {
                ref mut hold,
                elapsed,
            } => {
                *hold -= dt;
                if *hold <= 0.0 {
                    self.phase = Phase::Idle;
                    Some(elapsed)
                } else {
                    None
                }
            }
        }
    }
}

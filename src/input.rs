use crate::race::Phase;

const STICK_DEADZONE: f32 = 0.15;

/// Merged driver intent for one physics step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Intent {
    pub throttle: f32,
    pub brake: f32,
    /// -1 is full left, +1 full right.
    pub steer: f32,
    pub hop: bool,
    pub boost: bool,
    pub reset: bool,
}

impl Intent {
    /// Phase overrides: nothing during the countdown, full throttle while the finish holds.
    pub fn for_phase(self, phase: &Phase) -> Self {
        match *phase {
            Phase::Countdown { .. } => Self::default(),
            Phase::Finished { .. } => Self {
                throttle: 1.0,
                ..Self::default()
            },
            Phase::Idle | Phase::Racing => self,
        }
    }

    /// Steering direction as -1, 0 or +1.
    pub fn steer_direction(&self) -> i8 {
        if self.steer > STICK_DEADZONE {
            1
        } else if self.steer < -STICK_DEADZONE {
            -1
        } else {
            0
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Keyboard {
    left: bool,
    right: bool,
    up: bool,
    down: bool,
    hop: bool,
    boost: bool,
    reset: bool,
}

impl Keyboard {
    /// Returns false for keys without a binding.
    pub fn on_key(&mut self, code: winit::keyboard::KeyCode, pressed: bool) -> bool {
        use winit::keyboard::KeyCode as Kc;

        match code {
            Kc::ArrowLeft | Kc::KeyA => self.left = pressed,
            Kc::ArrowRight | Kc::KeyD => self.right = pressed,
            Kc::ArrowUp | Kc::KeyW => self.up = pressed,
            Kc::ArrowDown | Kc::KeyS => self.down = pressed,
            Kc::Space | Kc::ShiftLeft => self.hop = pressed,
            Kc::KeyN | Kc::ControlLeft => self.boost = pressed,
            Kc::KeyR => self.reset = pressed,
            _ => return false,
        }
        true
    }

    pub fn release_all(&mut self) {
        *self = Self::default();
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Gamepad {
    pub steer: f32,
    pub throttle: f32,
    pub brake: f32,
    pub hop: bool,
    pub boost: bool,
    pub reset: bool,
}

fn deadzone(value: f32) -> f32 {
    if value.abs() < STICK_DEADZONE {
        0.0
    } else {
        value
    }
}

pub fn merge(keyboard: &Keyboard, pad: &Gamepad) -> Intent {
    let key_axis = |negative: bool, positive: bool| positive as i32 as f32 - negative as i32 as f32;
    Intent {
        throttle: (keyboard.up as i32 as f32).max(deadzone(pad.throttle)).clamp(0.0, 1.0),
        brake: (keyboard.down as i32 as f32).max(deadzone(pad.brake)).clamp(0.0, 1.0),
        steer: (key_axis(keyboard.left, keyboard.right) + deadzone(pad.steer)).clamp(-1.0, 1.0),
        hop: keyboard.hop || pad.hop,
        boost: keyboard.boost || pad.boost,
        reset: keyboard.reset || pad.reset,
    }
}

use std::ffi::{c_char, CStr};
use std::path::Path;
use std::ptr;

mod context;

use context::Context;
pub use context::{SwitchbackCallbacks, SwitchbackInput, SwitchbackStatus, SwitchbackTarget};

unsafe fn str_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    match CStr::from_ptr(ptr).to_str() {
        Ok(s) => Some(s),
        Err(e) => {
            log::error!("Argument is not valid UTF-8: {}", e);
            None
        }
    }
}

/// Loads the configuration and track; returns null on failure.
#[no_mangle]
pub unsafe extern "C" fn switchback_init(
    config_path: *const c_char,
    target: SwitchbackTarget,
    callbacks: SwitchbackCallbacks,
) -> Option<ptr::NonNull<Context>> {
    let _ = env_logger::try_init();

    let path = str_arg(config_path).unwrap_or("data/config.ron");
    match Context::new(Path::new(path), target, callbacks) {
        Ok(context) => {
            let ptr = Box::into_raw(Box::new(context));
            ptr::NonNull::new(ptr)
        }
        Err(e) => {
            log::error!("Failed to initialize: {}", e);
            None
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn switchback_exit(ctx: *mut Context) {
    if !ctx.is_null() {
        let _ctx = Box::from_raw(ctx);
    }
}

/// Advances by `elapsed` seconds of wall time and draws. Returns the number of physics steps run.
#[no_mangle]
pub unsafe extern "C" fn switchback_frame(ctx: &mut Context, elapsed: f32, input: *const SwitchbackInput) -> u32 {
    let input = input.as_ref().copied().unwrap_or_default();
    ctx.frame(elapsed, &input)
}

/// Reloads the track, optionally from another description file. Returns false when
/// the load failed and the current track was kept.
#[no_mangle]
pub unsafe extern "C" fn switchback_reload(ctx: &mut Context, track_path: *const c_char) -> bool {
    ctx.reload(str_arg(track_path))
}

#[no_mangle]
pub unsafe extern "C" fn switchback_start_race(ctx: &mut Context) {
    ctx.start_race();
}

#[no_mangle]
pub unsafe extern "C" fn switchback_status(ctx: &Context, out: *mut SwitchbackStatus) {
    if let Some(out) = out.as_mut() {
        *out = ctx.status();
    }
}

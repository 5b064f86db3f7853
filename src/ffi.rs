//! C ABI over the handle API.
//!
//! Handles cross the boundary as `u64` (0 is null), statuses as `i32`
//! ([`Status`] values). Strings are NUL-terminated UTF-8; a null or invalid
//! string pointer is reported as an error, never dereferenced blindly.
//!
//! ```c
//! uint64_t inst = snap_initialize(true);
//! uint64_t go = snap_register_event(inst, "go");
//! SnapWaitOptions opts = { .timeout_ms = 5000, .event_count = 1, .event_ids = { "go" } };
//! SnapWaitResults res;
//! snap_wait_for_input(inst, SNAP_SOURCE_USER, &opts, &res);
//! snap_terminate(inst);
//! ```

use std::ffi::{CStr, c_char};
use std::time::Duration;

use crate::api;
use crate::error::Status;
use crate::types::{EventHandle, InstanceHandle, MAX_WAIT_EVENTS, Modifiers, MouseCode, SourceMask};
use crate::wait::{ModifierFilter, WaitSpec};

/// `timeout_ms` value meaning "no timeout".
pub const SNAP_NO_TIMEOUT: u32 = u32::MAX;

/// `modifiers` flag meaning "no modifier may be held".
pub const SNAP_MODIFIERS_NONE: u32 = 0x0008;

pub const SNAP_SOURCE_KEYBOARD: u32 = SourceMask::KEYBOARD.bits();
pub const SNAP_SOURCE_MOUSE: u32 = SourceMask::MOUSE.bits();
pub const SNAP_SOURCE_TIMER: u32 = SourceMask::TIMER.bits();
pub const SNAP_SOURCE_USER: u32 = SourceMask::USER.bits();

// =============================================================================
// Structs
// =============================================================================

/// Wait filters. Zero means "any" for `key`, `mouse` and `modifiers`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SnapWaitOptions {
    pub timeout_ms: u32,
    pub key: u32,
    /// A `MouseCode` value (1..=4).
    pub mouse: u32,
    /// `Modifiers` bits that must all be held, or `SNAP_MODIFIERS_NONE`.
    pub modifiers: u32,
    pub event_count: u32,
    pub event_ids: [*const c_char; MAX_WAIT_EVENTS],
}

impl Default for SnapWaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: SNAP_NO_TIMEOUT,
            key: 0,
            mouse: 0,
            modifiers: 0,
            event_count: 0,
            event_ids: [std::ptr::null(); MAX_WAIT_EVENTS],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapWaitResults {
    /// A `WaitSource` value.
    pub source: u32,
    pub payload: u64,
    pub modifiers: u32,
}

// =============================================================================
// Helpers
// =============================================================================

/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
unsafe fn c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null and NUL-terminated per the caller's contract.
    let raw = unsafe { CStr::from_ptr(ptr) };
    raw.to_str().ok()
}

/// Optional string argument: null means absent, invalid UTF-8 is an error.
///
/// # Safety
/// Same contract as [`c_str`].
unsafe fn c_opt_str<'a>(ptr: *const c_char) -> Result<Option<&'a str>, Status> {
    if ptr.is_null() {
        return Ok(None);
    }
    // SAFETY: forwarded from the caller.
    unsafe { c_str(ptr) }.map(Some).ok_or(Status::Error)
}

fn modifier_filter(bits: u32) -> ModifierFilter {
    if bits == 0 {
        ModifierFilter::Any
    } else if bits & SNAP_MODIFIERS_NONE != 0 {
        ModifierFilter::NoneHeld
    } else {
        ModifierFilter::Require(Modifiers::from_bits_truncate(bits))
    }
}

/// Translate C options. Returns the sources to use (the user source is
/// dropped when the id list is malformed) and the `WaitSpec`.
///
/// # Safety
/// The first `event_count` entries of `event_ids` must be valid string
/// pointers (or null).
unsafe fn translate_options(opts: &SnapWaitOptions, mut sources: SourceMask) -> Option<(SourceMask, WaitSpec)> {
    let mut spec = WaitSpec::new().with_modifiers(modifier_filter(opts.modifiers));
    if opts.timeout_ms != SNAP_NO_TIMEOUT {
        spec = spec.with_timeout(Duration::from_millis(u64::from(opts.timeout_ms)));
    }
    if opts.key != 0 {
        spec = spec.with_key(opts.key);
    }
    if opts.mouse != 0 {
        spec = spec.with_mouse(MouseCode::from_raw(u64::from(opts.mouse))?);
    }

    let count = opts.event_count as usize;
    if count > MAX_WAIT_EVENTS {
        tracing::warn!(count, max = MAX_WAIT_EVENTS, "too many user-event ids; the user source will never match");
        sources.remove(SourceMask::USER);
    } else {
        for &ptr in &opts.event_ids[..count] {
            // SAFETY: forwarded from the caller.
            spec = spec.with_user_id(unsafe { c_str(ptr) }?);
        }
    }
    Some((sources, spec))
}

// =============================================================================
// FFI EXPORTS
// =============================================================================

/// Create an instance. Returns 0 on failure.
#[unsafe(no_mangle)]
pub extern "C" fn snap_initialize(threaded: bool) -> u64 {
    api::initialize(threaded).raw()
}

#[unsafe(no_mangle)]
pub extern "C" fn snap_terminate(instance: u64) -> i32 {
    api::terminate(InstanceHandle::from_raw(instance)) as i32
}

/// Register `id`. Returns the event handle, or 0 on failure.
///
/// # Safety
/// `id` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn snap_register_event(instance: u64, id: *const c_char) -> u64 {
    // SAFETY: forwarded from the caller.
    let Some(id) = (unsafe { c_str(id) }) else {
        return 0;
    };
    api::register_event(InstanceHandle::from_raw(instance), id).raw()
}

/// Register `id` with the parameters a firing without its own falls back
/// to. `param` may be null; `param_ex` 0 means none. Returns 0 on failure.
///
/// # Safety
/// `id` must be a valid NUL-terminated string; `param` may be null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn snap_register_event_ex(
    instance: u64,
    id: *const c_char,
    param: *const c_char,
    param_ex: u64,
) -> u64 {
    // SAFETY: forwarded from the caller.
    let (Some(id), Ok(param)) = (unsafe { (c_str(id), c_opt_str(param)) }) else {
        return 0;
    };
    let param_ex = (param_ex != 0).then_some(param_ex);
    api::register_event_with_params(InstanceHandle::from_raw(instance), id, param, param_ex).raw()
}

/// First event registered under `id`, or 0.
///
/// # Safety
/// `id` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn snap_lookup_event(instance: u64, id: *const c_char) -> u64 {
    // SAFETY: forwarded from the caller.
    let Some(id) = (unsafe { c_str(id) }) else {
        return 0;
    };
    api::lookup_event(InstanceHandle::from_raw(instance), id).raw()
}

#[unsafe(no_mangle)]
pub extern "C" fn snap_unregister_event(event: u64) -> i32 {
    api::unregister_event(EventHandle::from_raw(event)) as i32
}

/// Fire an event. `param` may be null; `param_ex` 0 means none.
///
/// # Safety
/// `param` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn snap_fire_event(event: u64, param: *const c_char, param_ex: u64) -> i32 {
    // SAFETY: forwarded from the caller.
    let param = match unsafe { c_opt_str(param) } {
        Ok(param) => param,
        Err(status) => return status as i32,
    };
    let param_ex = (param_ex != 0).then_some(param_ex);
    api::fire_event(EventHandle::from_raw(event), param, param_ex) as i32
}

/// # Safety
/// `id` must be a valid NUL-terminated string; `param` may be null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn snap_fire_event_by_id(
    instance: u64,
    id: *const c_char,
    param: *const c_char,
    param_ex: u64,
) -> i32 {
    // SAFETY: forwarded from the caller.
    let (Some(id), Ok(param)) = (unsafe { (c_str(id), c_opt_str(param)) }) else {
        return Status::Error as i32;
    };
    let param_ex = (param_ex != 0).then_some(param_ex);
    api::fire_event_by_id(InstanceHandle::from_raw(instance), id, param, param_ex) as i32
}

/// Block until input arrives and write the outcome to `results`.
/// `options` may be null (no filters, no timeout).
///
/// # Safety
/// `options` must be null or point to a valid `SnapWaitOptions`; `results`
/// must point to writable memory for one `SnapWaitResults`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn snap_wait_for_input(
    instance: u64,
    sources: u32,
    options: *const SnapWaitOptions,
    results: *mut SnapWaitResults,
) -> i32 {
    if results.is_null() {
        return Status::Error as i32;
    }
    let sources = SourceMask::from_bits_truncate(sources);

    // SAFETY: null or valid per the caller's contract.
    let translated = match unsafe { options.as_ref() } {
        Some(opts) => unsafe { translate_options(opts, sources) },
        None => Some((sources, WaitSpec::new())),
    };
    let Some((sources, spec)) = translated else {
        return Status::Error as i32;
    };

    match api::wait_for_input(InstanceHandle::from_raw(instance), sources, Some(spec)) {
        Ok(result) => {
            let out = SnapWaitResults {
                source: result.source as u32,
                payload: result.payload,
                modifiers: result.modifiers.bits(),
            };
            // SAFETY: checked non-null above; writable per the caller's contract.
            unsafe { results.write(out) };
            Status::Ok as i32
        }
        Err(status) => status as i32,
    }
}

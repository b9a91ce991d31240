//! Linux-specific platform implementation.

#![expect(unsafe_code, reason = "libc scheduling, affinity and sleep calls")]

use crate::error::{SchedError, SchedResult};
use crate::rt_setup::SetupOutcome;
use core::time::Duration;
use libc::{
    CLOCK_MONOTONIC, EINTR, MCL_CURRENT, MCL_FUTURE, SCHED_FIFO, clock_nanosleep, mlockall,
    sched_get_priority_max, sched_get_priority_min, sched_param, sched_setscheduler, timespec,
};
use std::io;
use std::time::Instant;

/// Final stretch of every sleep that is busy-spun instead of slept.
const SPIN_TAIL: Duration = Duration::from_micros(80);

/// Number of CPUs representable in a `cpu_set_t`.
const CPU_SET_CAPACITY: usize = std::mem::size_of::<libc::cpu_set_t>() * 8;

fn last_errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Switch the calling thread to `SCHED_FIFO` at `priority`.
///
/// The priority is clamped to the range the kernel reports for `SCHED_FIFO`.
/// Fails with `EPERM` without `CAP_SYS_NICE` or an `RLIMIT_RTPRIO` grant.
pub fn set_fifo_priority(priority: i32) -> SetupOutcome {
    // SAFETY: pure query with a valid policy constant.
    let min = unsafe { sched_get_priority_min(SCHED_FIFO) };
    // SAFETY: pure query with a valid policy constant.
    let max = unsafe { sched_get_priority_max(SCHED_FIFO) };
    if min < 0 || max < 0 {
        return SetupOutcome::Failed { errno: last_errno() };
    }

    let param = sched_param {
        sched_priority: priority.clamp(min, max),
    };
    // SAFETY: pid 0 targets the calling thread; `param` outlives the call.
    if unsafe { sched_setscheduler(0, SCHED_FIFO, &param) } != 0 {
        return SetupOutcome::Failed { errno: last_errno() };
    }
    SetupOutcome::Applied
}

/// Pin the calling thread to `core`.
pub fn pin_to_core(core: usize) -> SetupOutcome {
    if core >= CPU_SET_CAPACITY {
        return SetupOutcome::Failed {
            errno: libc::EINVAL,
        };
    }

    // SAFETY: `cpu_set_t` is a plain bitmask for which all-zero is valid.
    let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
    // SAFETY: `set` is a valid, exclusively borrowed `cpu_set_t`.
    unsafe { libc::CPU_ZERO(&mut set) };
    // SAFETY: `core < CPU_SET_CAPACITY`, so the bit is inside `set`.
    unsafe { libc::CPU_SET(core, &mut set) };

    // SAFETY: `set` is initialised and the size matches its type; the call
    // returns the error code directly instead of through errno.
    let rc = unsafe {
        libc::pthread_setaffinity_np(
            libc::pthread_self(),
            std::mem::size_of::<libc::cpu_set_t>(),
            &set,
        )
    };
    if rc != 0 {
        return SetupOutcome::Failed { errno: rc };
    }
    SetupOutcome::Applied
}

/// Lock all current and future pages of the process into RAM.
pub fn lock_memory() -> SetupOutcome {
    // SAFETY: flags are valid constants; no pointers are passed.
    if unsafe { mlockall(MCL_CURRENT | MCL_FUTURE) } != 0 {
        return SetupOutcome::Failed { errno: last_errno() };
    }
    SetupOutcome::Applied
}

/// High-precision sleep with busy-spin tail.
///
/// Uses `clock_nanosleep` for the bulk of the sleep, then busy-spins for the
/// final ~80 microseconds. Signal interruptions resume the sleep.
pub fn sleep_until(target: Instant) -> SchedResult {
    loop {
        let remaining = target.saturating_duration_since(Instant::now());
        if remaining <= SPIN_TAIL {
            break;
        }

        let bulk = remaining.saturating_sub(SPIN_TAIL);
        let ts = timespec {
            tv_sec: libc::time_t::try_from(bulk.as_secs()).unwrap_or(libc::time_t::MAX),
            tv_nsec: libc::c_long::try_from(bulk.subsec_nanos()).unwrap_or(0),
        };

        // SAFETY: `ts` is a valid relative timespec; the remainder pointer may
        // be null because an interrupted sleep is recomputed from `target`.
        let rc = unsafe { clock_nanosleep(CLOCK_MONOTONIC, 0, &ts, std::ptr::null_mut()) };
        match rc {
            0 | EINTR => {}
            _ => return Err(SchedError::SleepFailed),
        }
    }

    while Instant::now() < target {
        std::hint::spin_loop();
    }
    Ok(())
}

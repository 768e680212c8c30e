//! Elevates the calling thread's scheduling priority.
//!
//! The audio consumer runs a fixed-budget quantum on a real-time cadence;
//! under CPU contention a normal-priority thread can miss a quantum and
//! produce an audible glitch. Call this once from the thread that will run
//! [`crate::consumer::AudioConsumer::process_quantum`].
//!
//! # Platform behavior
//!
//! - **Windows**: raises the thread to `THREAD_PRIORITY_TIME_CRITICAL` via
//!   `SetThreadPriority` (not a realtime process class, which can destabilize
//!   the rest of the process).
//! - **Unix**: sets the thread's nice value to -10 via `setpriority`.
//!   Requires root, `CAP_SYS_NICE`, or equivalent; falls back to normal
//!   priority (logged, not fatal) if denied.
//!
//! # Errors
//!
//! Never panics. Logs a warning and leaves the thread at normal priority if
//! elevation fails, since a glitchy stream is always better than a crashed
//! one.
pub fn raise_thread_priority() {
    #[cfg(target_os = "windows")]
    raise_priority_windows();

    #[cfg(unix)]
    raise_priority_unix();
}

#[cfg(target_os = "windows")]
fn raise_priority_windows() {
    use windows_sys::Win32::Foundation::GetLastError;
    use windows_sys::Win32::System::Threading::{
        GetCurrentThread, SetThreadPriority, THREAD_PRIORITY_TIME_CRITICAL,
    };

    // SAFETY: GetCurrentThread returns a pseudo-handle that doesn't need
    // closing; SetThreadPriority is safe to call with a valid thread handle.
    let result = unsafe {
        let thread = GetCurrentThread();
        SetThreadPriority(thread, THREAD_PRIORITY_TIME_CRITICAL)
    };

    if result != 0 {
        log::info!("audio thread priority elevated to THREAD_PRIORITY_TIME_CRITICAL");
    } else {
        // SAFETY: GetLastError reads thread-local state with no preconditions.
        let code = unsafe { GetLastError() };
        log::warn!("failed to elevate audio thread priority, error code: {code}");
    }
}

#[cfg(unix)]
fn raise_priority_unix() {
    #[cfg(target_os = "linux")]
    unsafe fn errno_ptr() -> *mut i32 {
        libc::__errno_location()
    }

    #[cfg(target_os = "macos")]
    unsafe fn errno_ptr() -> *mut i32 {
        libc::__error()
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    unsafe fn errno_ptr() -> *mut i32 {
        libc::__errno_location()
    }

    // SAFETY: getpriority/setpriority are standard POSIX calls; PRIO_PROCESS
    // with pid 0 targets the calling thread's owning process's priority as
    // seen by the scheduler for this thread's nice value on Linux (where
    // nice is per-thread under NPTL).
    unsafe {
        *errno_ptr() = 0;
        let current = libc::getpriority(libc::PRIO_PROCESS, 0);
        if current == -1 && *errno_ptr() != 0 {
            log::warn!(
                "failed to read current audio thread priority: {}",
                std::io::Error::last_os_error()
            );
            return;
        }

        let result = libc::setpriority(libc::PRIO_PROCESS, 0, -10);
        if result == 0 {
            log::info!("audio thread priority elevated to nice -10 (was {current})");
        } else {
            log::warn!(
                "failed to elevate audio thread priority (nice -10), current {current}: {}",
                std::io::Error::last_os_error()
            );
        }
    }
}

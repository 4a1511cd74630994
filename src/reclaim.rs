//! Memory reclamation hint.
//!
//! Engines are never evicted from the worker's cache, so the memory footprint of a long running
//! worker must not grow with the number of builds. After each build, the worker asks the allocator
//! to give back the memory freed by that build. This is only a hint: nothing depends on it, and it
//! does nothing on platforms without such a facility.

/// Return freed heap memory to the operating system, when supported.
pub fn hint() {
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    {
        // SAFETY: malloc_trim only walks the allocator's own free lists, and has no precondition.
        #[allow(unsafe_code)]
        unsafe {
            libc::malloc_trim(0);
        }
    }
}

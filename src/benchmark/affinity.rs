//! Pinning benchmark workers to CPUs.

use crate::error::{Error, Result};

/// Bind the calling thread to `cpu`.
#[cfg(target_os = "linux")]
pub fn pin_current_thread(cpu: usize) -> Result<()> {
    if cpu >= libc::CPU_SETSIZE as usize {
        return Err(Error::Config(format!(
            "cpu {cpu} is out of range (limit {})",
            libc::CPU_SETSIZE
        )));
    }
    // SAFETY: cpu_set_t is plain data; CPU_SET is bounds-checked above and
    // sched_setaffinity(0, ..) only affects the calling thread.
    let rc = unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set)
    };
    if rc != 0 {
        return Err(Error::Resource(format!(
            "failed to bind thread to cpu {cpu}: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread(cpu: usize) -> Result<()> {
    Err(Error::Resource(format!(
        "failed to bind thread to cpu {cpu}: not supported on this platform"
    )))
}

//! ## hotpool-core::affinity
//! **Locality-domain discovery and thread pinning**
//!
//! Startup-only helpers that keep a pool's producer and consumer threads on the
//! same locality domain as the arena backing their slots. Failures degrade
//! locality, never correctness, so callers usually log and carry on.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AffinityError {
    #[error("CPU {0} does not exist")]
    InvalidCpu(usize),

    #[error("Thread affinity is not supported on this platform")]
    Unsupported,

    #[error("Malformed CPU/node list: {0:?}")]
    Parse(String),

    #[error("OS error: {0}")]
    Os(#[from] io::Error),
}

/// Number of logical CPUs available to this process.
pub fn available_cpus() -> usize {
    num_cpus::get()
}

/// Parses a kernel list such as `0-3,8,10-11` into individual ids.
pub fn parse_id_list(list: &str) -> Result<Vec<u32>, AffinityError> {
    let malformed = || AffinityError::Parse(list.to_string());
    let mut ids = Vec::new();
    for part in list.trim().split(',').filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: u32 = lo.trim().parse().map_err(|_| malformed())?;
                let hi: u32 = hi.trim().parse().map_err(|_| malformed())?;
                if lo > hi {
                    return Err(malformed());
                }
                ids.extend(lo..=hi);
            }
            None => ids.push(part.trim().parse().map_err(|_| malformed())?),
        }
    }
    Ok(ids)
}

#[cfg(target_os = "linux")]
mod imp {
    use std::fs;
    use std::io;
    use std::mem;

    use super::{parse_id_list, AffinityError};

    const CPU_SYSFS: &str = "/sys/devices/system/cpu";
    const NODE_ONLINE: &str = "/sys/devices/system/node/online";

    pub fn cpu_to_domain(cpu: usize) -> Result<u32, AffinityError> {
        let entries = match fs::read_dir(format!("{CPU_SYSFS}/cpu{cpu}")) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AffinityError::InvalidCpu(cpu))
            }
            Err(e) => return Err(e.into()),
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            if let Some(node) = name.to_str().and_then(|n| n.strip_prefix("node")) {
                if let Ok(node) = node.parse() {
                    return Ok(node);
                }
            }
        }
        // Kernels without NUMA support expose no node link: everything is domain 0.
        Ok(0)
    }

    pub fn online_domains() -> Result<Vec<u32>, AffinityError> {
        match fs::read_to_string(NODE_ONLINE) {
            Ok(list) => parse_id_list(&list),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(vec![0]),
            Err(e) => Err(e.into()),
        }
    }

    pub fn pin_current_thread(cpu: usize) -> Result<(), AffinityError> {
        if cpu >= libc::CPU_SETSIZE as usize {
            return Err(AffinityError::InvalidCpu(cpu));
        }
        // SAFETY: cpu_set_t is plain data; zeroed is the empty set.
        let mut set: libc::cpu_set_t = unsafe { mem::zeroed() };
        // SAFETY: cpu < CPU_SETSIZE, checked above.
        unsafe { libc::CPU_SET(cpu, &mut set) };
        // SAFETY: pid 0 targets the calling thread; `set` is a valid cpu_set_t.
        let rc = unsafe { libc::sched_setaffinity(0, mem::size_of::<libc::cpu_set_t>(), &set) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINVAL) {
                return Err(AffinityError::InvalidCpu(cpu));
            }
            return Err(err.into());
        }
        Ok(())
    }

    pub fn current_cpu() -> Option<usize> {
        // SAFETY: no preconditions.
        let cpu = unsafe { libc::sched_getcpu() };
        (cpu >= 0).then_some(cpu as usize)
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    use super::AffinityError;

    pub fn cpu_to_domain(cpu: usize) -> Result<u32, AffinityError> {
        if cpu >= super::available_cpus() {
            return Err(AffinityError::InvalidCpu(cpu));
        }
        Ok(0)
    }

    pub fn online_domains() -> Result<Vec<u32>, AffinityError> {
        Ok(vec![0])
    }

    pub fn pin_current_thread(_cpu: usize) -> Result<(), AffinityError> {
        Err(AffinityError::Unsupported)
    }

    pub fn current_cpu() -> Option<usize> {
        None
    }
}

/// Locality domain (NUMA node) that `cpu` belongs to.
pub fn cpu_to_domain(cpu: usize) -> Result<u32, AffinityError> {
    imp::cpu_to_domain(cpu)
}

/// Locality domains currently online.
pub fn online_domains() -> Result<Vec<u32>, AffinityError> {
    imp::online_domains()
}

/// Binds the calling thread to a single CPU.
pub fn pin_current_thread(cpu: usize) -> Result<(), AffinityError> {
    imp::pin_current_thread(cpu)
}

/// CPU the calling thread is running on right now, if the platform reports it.
pub fn current_cpu() -> Option<usize> {
    imp::current_cpu()
}

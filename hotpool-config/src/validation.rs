//! Custom validation functions for configuration.

use validator::ValidationError;

/// Validate a tracing level name.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let re = regex::Regex::new("^(?i)(trace|debug|info|warn|error)$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(level) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

/// Validate that every pinned CPU exists on this machine.
pub fn validate_cpus(cpus: &[usize]) -> Result<(), ValidationError> {
    let available = num_cpus::get();
    if cpus.iter().all(|&cpu| cpu < available) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_cpu"))
    }
}

/// Validate that a pool capacity fits a 32-bit slot index with one value kept for end-of-list.
pub fn validate_capacity<T: std::borrow::Borrow<usize>>(capacity: T) -> Result<(), ValidationError> {
    if (1..u32::MAX as usize).contains(capacity.borrow()) {
        Ok(())
    } else {
        Err(ValidationError::new("capacity_out_of_range"))
    }
}

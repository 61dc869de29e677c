//! Session configuration.

use crate::errors::SessionError;
use serde::{Deserialize, Serialize};

/// Tunable knobs for a refinement session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum evaluation rounds before acceptance is forced. Must be >= 1.
    pub max_iterations: u32,
    /// Week this session plans for (1-based).
    pub week_number: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            week_number: 1,
        }
    }
}

impl SessionConfig {
    pub fn new(max_iterations: u32, week_number: u32) -> Self {
        Self {
            max_iterations,
            week_number,
        }
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.max_iterations < 1 {
            return Err(SessionError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.week_number < 1 {
            return Err(SessionError::InvalidConfig(
                "week_number must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let err = SessionConfig::new(0, 1).validate().unwrap_err();
        assert!(err.to_string().contains("max_iterations"));
    }

    #[test]
    fn zero_week_is_rejected() {
        let err = SessionConfig::new(3, 0).validate().unwrap_err();
        assert!(err.to_string().contains("week_number"));
    }
}

//! Resolution settings.

/// What to do when an explicit position disagrees with the sequential one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MismatchPolicy {
    /// Fail resolution with a `PositionMismatch` diagnostic.
    #[default]
    Error,
    /// Keep the explicit position, log the mismatch and record it on the plan.
    Warn,
}

/// Settings shared by every resolution of a schema and its union alternates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveConfig {
    pub position_mismatch: MismatchPolicy,
}

impl ResolveConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_position_mismatch(&mut self, policy: MismatchPolicy) -> &mut Self {
        self.position_mismatch = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_error() {
        assert_eq!(ResolveConfig::new().position_mismatch, MismatchPolicy::Error);
    }

    #[test]
    fn test_setter_chains() {
        let mut config = ResolveConfig::new();
        config.set_position_mismatch(MismatchPolicy::Warn);
        assert_eq!(config.position_mismatch, MismatchPolicy::Warn);
    }
}

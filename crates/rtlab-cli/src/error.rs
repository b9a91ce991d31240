//! Error types for the rtlab CLI

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Startup failed: {0}")]
    Startup(#[source] rtlab_tasks::TaskError),

    #[error("{0} task(s) failed")]
    TaskFailure(usize),

    #[error("YAML rendering failed: {0}")]
    Render(String),
}

impl CliError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::InvalidConfiguration(_) => 2,
            CliError::Startup(_) => 3,
            CliError::TaskFailure(_) => 4,
            CliError::Render(_) => 1,
        }
    }
}

impl From<rtlab_tasks::TaskError> for CliError {
    fn from(error: rtlab_tasks::TaskError) -> Self {
        match error {
            rtlab_tasks::TaskError::InvalidConfig(reason) => CliError::InvalidConfiguration(reason),
            other => CliError::Startup(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtlab_tasks::TaskError;

    #[test]
    fn test_invalid_config_maps_to_configuration_error() {
        let error = CliError::from(TaskError::invalid_config("window must be greater than 0"));
        assert!(matches!(error, CliError::InvalidConfiguration(ref r) if r.contains("window")));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_other_task_errors_are_startup_failures() {
        let error = CliError::from(TaskError::Source("adc offline".to_string()));
        assert!(matches!(error, CliError::Startup(_)));
        assert_eq!(error.exit_code(), 3);
    }
}

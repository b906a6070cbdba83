use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for termbg operations
#[derive(Error, Debug)]
pub enum TermbgError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Image resolution error: {0}")]
    Image(#[from] ImageError),

    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    #[error("Process execution error: {0}")]
    Process(#[from] ProcessError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {path:?}")]
    FileRead { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse TOML configuration: {message}")]
    TomlParse { message: String },

    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Profile '{name}' is not defined")]
    UnknownProfile { name: String },

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Image source resolution errors
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Failed to read directory: {path:?}")]
    DirectoryRead { path: PathBuf, source: std::io::Error },

    #[error("Failed to read image list: {path:?}")]
    ListRead { path: PathBuf, source: std::io::Error },

    #[error("Image list entry is neither a file nor a directory: {path:?}")]
    BrokenEntry { path: PathBuf },

    #[error("Image source does not exist: {path:?}")]
    MissingSource { path: PathBuf },

    #[error("Failed to probe image dimensions: {path:?}: {message}")]
    Probe { path: PathBuf, message: String },
}

/// IPC communication errors
#[derive(Error, Debug)]
pub enum IpcError {
    #[error("Failed to connect to daemon at {path:?}")]
    Connection { path: PathBuf, source: std::io::Error },

    #[error("Failed to send IPC message")]
    Send,

    #[error("Failed to receive IPC message")]
    Receive,

    #[error("Invalid IPC message format: {message}")]
    InvalidMessage { message: String },

    #[error("Daemon not responding")]
    DaemonUnresponsive,
}

/// Process execution errors
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("No file opener found (tried {tried})")]
    OpenerNotFound { tried: String },

    #[error("Command execution failed: {command:?}")]
    Execution { command: String, source: std::io::Error },

    #[error("Command returned non-zero exit code: {code}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("No image has been displayed yet")]
    NothingDisplayed,
}

// Helper traits for error conversion
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<TermbgError>,
{
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| {
            let err = e.into();
            log::debug!("{}: {}", context, err);
            err
        })
    }
}

// Convenience type alias
pub type Result<T> = std::result::Result<T, TermbgError>;

impl From<serde_json::Error> for TermbgError {
    fn from(err: serde_json::Error) -> Self {
        TermbgError::Ipc(IpcError::InvalidMessage {
            message: err.to_string(),
        })
    }
}

impl From<toml::de::Error> for TermbgError {
    fn from(err: toml::de::Error) -> Self {
        TermbgError::Config(ConfigError::TomlParse {
            message: err.to_string(),
        })
    }
}

// Error reporting utilities
pub trait ErrorReporting {
    fn log_error(&self, context: &str);
    fn user_friendly_message(&self) -> String;
}

impl ErrorReporting for TermbgError {
    fn log_error(&self, context: &str) {
        log::error!("{}: {:?}", context, self);
    }

    fn user_friendly_message(&self) -> String {
        match self {
            TermbgError::Config(ConfigError::FileRead { path, .. }) => {
                format!("Configuration file not found: {:?}", path)
            }
            TermbgError::Config(ConfigError::TomlParse { message }) => {
                format!("Invalid configuration format: {}", message)
            }
            TermbgError::Config(ConfigError::UnknownProfile { name }) => {
                format!("Profile '{}' does not exist in backgroundImage.profiles", name)
            }
            TermbgError::Image(ImageError::MissingSource { path }) => {
                format!("Background image source not found: {:?}", path)
            }
            TermbgError::Ipc(IpcError::Connection { path, .. }) => {
                format!("termbg daemon is not running (no socket at {:?}). Start termbg-daemon first.", path)
            }
            TermbgError::Ipc(IpcError::DaemonUnresponsive) => {
                "termbg daemon is not responding. Please restart the daemon.".to_string()
            }
            TermbgError::Process(ProcessError::NothingDisplayed) => {
                "No background image is being displayed yet".to_string()
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_error_user_friendly_message() {
        let error = ConfigError::FileRead {
            path: PathBuf::from("/nonexistent/config.toml"),
            source: io::Error::new(io::ErrorKind::NotFound, "File not found"),
        };
        let termbg_error = TermbgError::Config(error);

        let message = termbg_error.user_friendly_message();
        assert!(message.contains("Configuration file not found"));
        assert!(message.contains("/nonexistent/config.toml"));
    }

    #[test]
    fn test_unknown_profile_message() {
        let termbg_error = TermbgError::Config(ConfigError::UnknownProfile {
            name: "night".to_string(),
        });

        let message = termbg_error.user_friendly_message();
        assert!(message.contains("night"));
        assert!(message.contains("profiles"));
    }

    #[test]
    fn test_process_error_falls_back_to_display() {
        let error = ProcessError::NonZeroExit {
            code: 1,
            stderr: "no application registered".to_string(),
        };
        let termbg_error = TermbgError::Process(error);

        let message = termbg_error.user_friendly_message();
        assert!(message.contains("Command returned non-zero exit code"));
        assert!(message.contains("1"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<u32>("not json").unwrap_err();
        let termbg_error: TermbgError = json_error.into();

        match termbg_error {
            TermbgError::Ipc(IpcError::InvalidMessage { .. }) => {}
            _ => panic!("Expected IpcError::InvalidMessage"),
        }
    }

    #[test]
    fn test_with_context_keeps_variant() {
        let result: std::result::Result<(), ImageError> = Err(ImageError::BrokenEntry {
            path: PathBuf::from("/gone"),
        });

        match result.with_context("resolving list file") {
            Err(TermbgError::Image(ImageError::BrokenEntry { path })) => {
                assert_eq!(path, PathBuf::from("/gone"));
            }
            _ => panic!("Expected ImageError::BrokenEntry"),
        }
    }
}

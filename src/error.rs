use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read source file {path}")]
    ReadSource {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path validation failed: {path}")]
    InvalidPath { path: String },

    #[error("Cannot read directory {path}: {message}")]
    DirectoryUnreadable { path: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid marker selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("Operation was cancelled by user")]
    Cancelled,
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for TraceError {
    fn user_message(&self) -> String {
        match self {
            TraceError::ReadSource { path, source } => {
                format!("Cannot read trace file {}: {}", path, source)
            }
            TraceError::InvalidPath { path } => {
                format!("Invalid file path: {}", path)
            }
            TraceError::DirectoryUnreadable { path, message } => {
                format!("Cannot scan directory {}: {}", path, message)
            }
            TraceError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            TraceError::Selector { selector, .. } => {
                format!("Marker class produces an invalid selector: {}", selector)
            }
            TraceError::Cancelled => "Operation was cancelled by user".to_string(),
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            TraceError::ReadSource { .. } => Some(
                "Check that the file exists and that you have permission to read it. Use --skip-invalid to skip such files in directory mode.".to_string()
            ),
            TraceError::InvalidPath { .. } => Some(
                "Source files must live below the input directory passed with --input_dir.".to_string()
            ),
            TraceError::DirectoryUnreadable { .. } => Some(
                "Verify the input directory exists and that you have read and execute permission on it.".to_string()
            ),
            TraceError::Config { .. } => Some(
                "Check your configuration file syntax and ensure all fields hold valid values.".to_string()
            ),
            TraceError::Selector { .. } => Some(
                "The marker class must be a plain CSS class name such as trace-data.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for TraceError {
    fn from(error: toml::de::Error) -> Self {
        TraceError::Config {
            message: error.to_string(),
        }
    }
}

impl From<walkdir::Error> for TraceError {
    fn from(error: walkdir::Error) -> Self {
        let path = error
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unknown>".to_string());

        let message = if error.loop_ancestor().is_some() {
            "symbolic link loop detected".to_string()
        } else {
            match error.io_error() {
                Some(io) => io.to_string(),
                None => error.to_string(),
            }
        };

        TraceError::DirectoryUnreadable { path, message }
    }
}

pub type Result<T> = std::result::Result<T, TraceError>;

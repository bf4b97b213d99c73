use std::path::PathBuf;

use thiserror::Error;

/// Path-level misconfiguration. Aborts the command.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Path does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("File must be a JSON file: {}", .0.display())]
    NotJson(PathBuf),

    #[error("No JSON files found in directory: {}", .0.display())]
    NoJsonFiles(PathBuf),

    #[error("Path is neither a file nor a directory: {}", .0.display())]
    NotFileOrDir(PathBuf),

    #[error("Cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A single scene file that cannot be used. The file is skipped.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Error reading file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("JSON file {} is not an object", .0.display())]
    NotObject(PathBuf),

    #[error("JSON file {} does not contain a 'scene_text' field", .0.display())]
    MissingSceneText(PathBuf),
}

/// Failure to persist or restore a character registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed registry document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// An extraction backend call that failed for one scene.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Anything that ends a command with a non-zero exit status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

//! This module reads connection settings from the process environment,
//! optionally seeded by a local `.env` file. Nothing is validated here: an
//! absent variable is an empty string and any trouble it causes shows up when
//! the stream is first described.
use std::{
    env, fmt,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

/// Name of the target stream.
pub const STREAM_NAME: &str = "KINESIS_STREAM_NAME";
/// Region the stream lives in.
pub const REGION: &str = "KINESIS_REGION";
/// Endpoint URL override, empty for the service default.
pub const ENDPOINT: &str = "AWS_ENDPOINT";
/// Static access key.
pub const ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
/// Static secret key.
pub const SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
/// Session token, empty for long-lived credentials.
pub const SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";

/// The default location of the environment override file.
#[must_use]
pub fn default_env_file() -> PathBuf {
    PathBuf::from(".env")
}

/// Connection settings for the target stream
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// The stream to publish into
    pub stream: String,
    /// The region of the stream
    pub region: String,
    /// The endpoint URL, empty to let the client resolve it
    pub endpoint: String,
    /// The access key of the static credentials
    pub access_key_id: String,
    /// The secret key of the static credentials
    pub secret_access_key: String,
    /// The session token of the static credentials, may be empty
    pub session_token: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("stream", &self.stream)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Build a [`Config`] from the environment after seeding it from
    /// `env_file`.
    ///
    /// A missing `env_file` is expected and only logged. A file that cannot
    /// be parsed is reported and otherwise ignored.
    #[must_use]
    pub fn load(env_file: &Path) -> Self {
        match seed_environment(env_file) {
            Ok(()) => info!("Seeded environment from {}", env_file.display()),
            Err(err) if err.not_found() => {
                debug!("No environment file at {}", env_file.display());
            }
            Err(err) => warn!(
                "Could not load environment file {}: {err}",
                env_file.display()
            ),
        }
        Self::from_env()
    }

    /// Build a [`Config`] from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a [`Config`] by resolving each variable name through `lookup`.
    /// Unresolved names become empty strings.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).unwrap_or_default();
        Self {
            stream: get(STREAM_NAME),
            region: get(REGION),
            endpoint: get(ENDPOINT),
            access_key_id: get(ACCESS_KEY_ID),
            secret_access_key: get(SECRET_ACCESS_KEY),
            session_token: get(SESSION_TOKEN),
        }
    }
}

/// Load the variables of `path` into the process environment. Variables
/// already present are left untouched.
///
/// # Errors
///
/// Returns the underlying [`dotenvy::Error`] if the file is absent or
/// malformed.
pub fn seed_environment(path: &Path) -> Result<(), dotenvy::Error> {
    dotenvy::from_path(path)
}

//! Configuration of the storage engine and logging
//!
//! Configuration is read from YAML, where every field is optional. Parsing goes through a
//! [`Builder`] that mirrors [`Config`] with each field wrapped in an `Option`, so that missing
//! fields can be filled in from the defaults -- some of which depend on other fields.
//!
//! An example file, with all of the default values:
//!
//! ```yaml
//! max_chunk_size: 4096
//! merge_threshold: 2048  # defaults to half of `max_chunk_size`
//! log_level: Warn
//! # log_file: /tmp/chunktext.log
//! ```

use serde::Deserialize;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::text::{ChunkLimits, DEFAULT_MAX_CHUNK_SIZE};

/// The default name for the configuration file
pub static DEFAULT_CONFIG_FILE_NAME: &str = "chunktext.yml";

/// The level that logging defaults to, if it isn't configured
pub const DEFAULT_LOG_LEVEL: log::LevelFilter = log::LevelFilter::Warn;

/// The complete, validated configuration
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub max_chunk_size: usize,
    pub merge_threshold: usize,
    pub log_level: log::LevelFilter,
    pub log_file: Option<PathBuf>,
}

/// The parsed form of a configuration file, before defaults are applied
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Builder {
    pub max_chunk_size: Option<usize>,
    pub merge_threshold: Option<usize>,
    pub log_level: Option<log::LevelFilter>,
    pub log_file: Option<PathBuf>,
}

/// An error from loading the configuration
#[derive(Debug)]
pub enum Error {
    Io { path: PathBuf, err: io::Error },
    Yaml(serde_yaml::Error),
    Invalid(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Error::Io { path, err } => {
                write!(f, "failed to read config file '{}': {}", path.display(), err)
            }
            Error::Yaml(e) => write!(f, "failed to parse config: {}", e),
            Error::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { err, .. } => Some(err),
            Error::Yaml(e) => Some(e),
            Error::Invalid(_) => None,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Yaml(e)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            merge_threshold: DEFAULT_MAX_CHUNK_SIZE / 2,
            log_level: DEFAULT_LOG_LEVEL,
            log_file: None,
        }
    }
}

impl Builder {
    /// Produces the configuration, filling in missing values from the defaults
    ///
    /// ## Errors
    ///
    /// This returns [`Error::Invalid`] if the resulting configuration fails
    /// [validation](Config::validate).
    pub fn build(self) -> Result<Config, Error> {
        let default = Config::default();
        let max_chunk_size = self.max_chunk_size.unwrap_or(default.max_chunk_size);

        let config = Config {
            max_chunk_size,
            merge_threshold: self.merge_threshold.unwrap_or(max_chunk_size / 2),
            log_level: self.log_level.unwrap_or(default.log_level),
            log_file: self.log_file.or(default.log_file),
        };

        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Parses the configuration from a YAML document
    pub fn from_yaml_str(s: &str) -> Result<Config, Error> {
        // An empty document isn't valid YAML for a mapping, but it's a perfectly reasonable
        // configuration file.
        let builder: Builder = match s.trim().is_empty() {
            true => Builder::default(),
            false => serde_yaml::from_str(s)?,
        };

        builder.build()
    }

    /// Reads and parses the configuration file at the given path
    pub fn from_file(path: &Path) -> Result<Config, Error> {
        let contents = fs::read_to_string(path).map_err(|err| Error::Io {
            path: path.to_owned(),
            err,
        })?;

        log::debug!("parsing config from '{}'", path.display());
        Config::from_yaml_str(&contents)
    }

    /// Checks that the values are consistent with each other
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_chunk_size == 0 {
            return Err(Error::Invalid("`max_chunk_size` must be at least 1".into()));
        }

        if self.merge_threshold > self.max_chunk_size {
            return Err(Error::Invalid(format!(
                "`merge_threshold` ({}) cannot be larger than `max_chunk_size` ({})",
                self.merge_threshold, self.max_chunk_size
            )));
        }

        Ok(())
    }

    /// Returns the limits to use for the chunks of new buffers
    pub fn chunk_limits(&self) -> ChunkLimits {
        ChunkLimits::new(self.max_chunk_size, self.merge_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::{Builder, Config, Error};
    use std::path::{Path, PathBuf};

    #[test]
    fn empty_is_default() {
        assert_eq!(Config::from_yaml_str("").unwrap(), Config::default());
        assert_eq!(Config::from_yaml_str("\n  \n").unwrap(), Config::default());
    }

    #[test]
    fn builder_leaves_missing_fields_empty() {
        let builder: Builder = serde_yaml::from_str("log_level: Trace").unwrap();
        assert_eq!(builder.log_level, Some(log::LevelFilter::Trace));
        assert!(builder.max_chunk_size.is_none());
        assert!(builder.merge_threshold.is_none());
        assert!(builder.log_file.is_none());

        let config = builder.build().unwrap();
        assert_eq!(config.max_chunk_size, Config::default().max_chunk_size);
    }

    #[test]
    fn threshold_follows_max_size() {
        let config = Config::from_yaml_str("max_chunk_size: 100").unwrap();
        assert_eq!(config.max_chunk_size, 100);
        assert_eq!(config.merge_threshold, 50);

        let limits = config.chunk_limits();
        assert_eq!((limits.max_chunk_size, limits.merge_threshold), (100, 50));
    }

    #[test]
    fn all_fields() {
        let yaml = "
max_chunk_size: 64
merge_threshold: 10
log_level: Debug
log_file: /tmp/chunktext.log
";
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(
            config,
            Config {
                max_chunk_size: 64,
                merge_threshold: 10,
                log_level: log::LevelFilter::Debug,
                log_file: Some(PathBuf::from("/tmp/chunktext.log")),
            }
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::from_yaml_str("max_chunk_size: 0"),
            Err(Error::Invalid(_))
        ));
        assert!(matches!(
            Config::from_yaml_str("max_chunk_size: 10\nmerge_threshold: 11"),
            Err(Error::Invalid(_))
        ));
        assert!(matches!(
            Config::from_yaml_str("chunk_size: 10"),
            Err(Error::Yaml(_))
        ));
        assert!(matches!(
            Config::from_yaml_str("max_chunk_size: lots"),
            Err(Error::Yaml(_))
        ));
    }

    #[test]
    fn missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/chunktext.yml")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/chunktext.yml"));
    }
}

use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("source artifact does not exist: {}", path.display())]
    MissingSource { path: PathBuf },

    #[error("timed out after {waited:?} waiting for producer to finish {}", path.display())]
    TimedOut { path: PathBuf, waited: Duration },

    #[error("cancelled while waiting for {}", path.display())]
    Cancelled { path: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ComposeError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_out_names_the_path() {
        let err = ComposeError::TimedOut {
            path: PathBuf::from("dist/lcevc_dec.js"),
            waited: Duration::from_secs(3),
        };
        assert_eq!(
            err.to_string(),
            "timed out after 3s waiting for producer to finish dist/lcevc_dec.js"
        );
    }

    #[test]
    fn io_keeps_source() {
        let err = ComposeError::io("dist", io::Error::other("disk full"));
        assert_eq!(err.to_string(), "I/O error on dist: disk full");
        assert!(std::error::Error::source(&err).is_some());
    }
}

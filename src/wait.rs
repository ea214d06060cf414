use std::{
    fs,
    future::Future,
    io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use tokio::time::Instant;

use crate::error::ComposeError;

/// How long and how carefully to wait for the bundler's output.
#[derive(Debug, Clone)]
pub struct WaitSettings {
    pub interval: Duration,
    pub timeout: Option<Duration>,
    /// Extra polls the target must stay unchanged (size and mtime) before it
    /// counts as finished. Zero means existence is enough.
    pub settle_polls: u32,
    /// File the producer writes after the target is complete.
    pub sentinel: Option<PathBuf>,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: None,
            settle_polls: 0,
            sentinel: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitReport {
    /// Number of intervals slept before the target was ready.
    pub waits: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    len: u64,
    modified: Option<SystemTime>,
}

enum Probe {
    Missing,
    AwaitingSentinel,
    Present(Snapshot),
}

fn probe(path: &Path, settings: &WaitSettings) -> Result<Probe, ComposeError> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Probe::Missing),
        Err(e) => return Err(ComposeError::io(path, e)),
    };

    if let Some(sentinel) = &settings.sentinel {
        match fs::metadata(sentinel) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Probe::AwaitingSentinel),
            Err(e) => return Err(ComposeError::io(sentinel, e)),
        }
    }

    Ok(Probe::Present(Snapshot {
        len: metadata.len(),
        modified: metadata.modified().ok(),
    }))
}

/// Polls until `path` is ready, the timeout elapses, or `cancel` completes.
pub async fn wait_for_target<F>(
    path: &Path,
    settings: &WaitSettings,
    cancel: F,
) -> Result<WaitReport, ComposeError>
where
    F: Future<Output = ()>,
{
    tokio::pin!(cancel);

    let started = Instant::now();
    let mut waits = 0;
    let mut last_seen: Option<Snapshot> = None;
    let mut stable_polls = 0;

    loop {
        match probe(path, settings)? {
            Probe::Missing => {
                last_seen = None;
                stable_polls = 0;
                log::info!(
                    "The target script {} does not exist. Retrying.",
                    path.display()
                );
            }
            Probe::AwaitingSentinel => {
                log::info!(
                    "The target script {} exists but its producer has not signalled completion. Retrying.",
                    path.display()
                );
            }
            Probe::Present(snapshot) => {
                if last_seen == Some(snapshot) {
                    stable_polls += 1;
                } else {
                    last_seen = Some(snapshot);
                    stable_polls = 0;
                }
                if stable_polls >= settings.settle_polls {
                    log::debug!("{} ready after {waits} waits", path.display());
                    return Ok(WaitReport { waits });
                }
                log::info!(
                    "The target script {} is still settling ({stable_polls}/{}). Retrying.",
                    path.display(),
                    settings.settle_polls
                );
            }
        }

        if let Some(timeout) = settings.timeout {
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(ComposeError::TimedOut {
                    path: path.to_path_buf(),
                    waited,
                });
            }
        }

        tokio::select! {
            _ = &mut cancel => {
                return Err(ComposeError::Cancelled {
                    path: path.to_path_buf(),
                });
            }
            _ = tokio::time::sleep(settings.interval) => {}
        }
        waits += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::pending;
    use tempfile::tempdir;
    use tokio::time::sleep;

    fn every_second() -> WaitSettings {
        WaitSettings {
            interval: Duration::from_secs(1),
            ..WaitSettings::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn existing_target_needs_no_wait() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("lcevc_dec.js");
        fs::write(&target, "B").expect("write target");

        let report = wait_for_target(&target, &every_second(), pending())
            .await
            .expect("ready");
        assert_eq!(report.waits, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn counts_one_wait_per_interval_until_target_appears() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("lcevc_dec.js");

        let producer_target = target.clone();
        let producer = tokio::spawn(async move {
            sleep(Duration::from_millis(2500)).await;
            fs::write(&producer_target, "B").expect("write target");
        });

        let report = wait_for_target(&target, &every_second(), pending())
            .await
            .expect("ready");
        assert_eq!(report.waits, 3);
        producer.await.expect("producer");
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_timeout() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("never.js");
        let settings = WaitSettings {
            timeout: Some(Duration::from_secs(3)),
            ..every_second()
        };

        let err = wait_for_target(&target, &settings, pending())
            .await
            .unwrap_err();
        match err {
            ComposeError::TimedOut { path, waited } => {
                assert_eq!(path, target);
                assert!(waited >= Duration::from_secs(3));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_wait() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("never.js");

        let err = wait_for_target(
            &target,
            &every_second(),
            sleep(Duration::from_millis(1500)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ComposeError::Cancelled { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_polls_require_unchanged_target() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("lcevc_dec.js");
        fs::write(&target, "B").expect("write target");
        let settings = WaitSettings {
            settle_polls: 2,
            ..every_second()
        };

        let report = wait_for_target(&target, &settings, pending())
            .await
            .expect("ready");
        assert_eq!(report.waits, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sentinel_gates_readiness() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("lcevc_dec.js");
        let sentinel = dir.path().join("lcevc_dec.js.done");
        fs::write(&target, "B").expect("write target");
        let settings = WaitSettings {
            sentinel: Some(sentinel.clone()),
            ..every_second()
        };

        let producer = tokio::spawn(async move {
            sleep(Duration::from_millis(1500)).await;
            fs::write(&sentinel, "").expect("write sentinel");
        });

        let report = wait_for_target(&target, &settings, pending())
            .await
            .expect("ready");
        assert_eq!(report.waits, 2);
        producer.await.expect("producer");
    }
}

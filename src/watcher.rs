//! Discovery of new transaction files in a directory.

use crate::cancel::CancelToken;
use crate::error::{ProcessError, Result};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;

/// Default delay between directory scans.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const CHANNEL_CAPACITY: usize = 16;

/// Produces paths of newly appeared files.
///
/// The returned channel closes once `cancel` fires.
pub trait Watcher {
    fn watch(&self, dir: &Path, cancel: CancelToken) -> Result<mpsc::Receiver<PathBuf>>;
}

/// Watches a directory by rescanning it on a fixed interval.
///
/// A `.csv` file is reported once its size and modification time have been
/// the same on two consecutive scans, and again whenever it changes after
/// that. Files present when watching starts count as new.
///
/// Must be called from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct PollingWatcher {
    interval: Duration,
}

impl PollingWatcher {
    pub fn new(interval: Duration) -> Self {
        PollingWatcher { interval }
    }
}

impl Default for PollingWatcher {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl Watcher for PollingWatcher {
    fn watch(&self, dir: &Path, cancel: CancelToken) -> Result<mpsc::Receiver<PathBuf>> {
        let metadata = fs::metadata(dir).map_err(|source| ProcessError::Watch {
            path: dir.to_path_buf(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(ProcessError::Watch {
                path: dir.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
            });
        }

        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let dir = dir.to_path_buf();
        let mut ticker = tokio::time::interval(self.interval);
        let mut scanner = Scanner::default();

        info!("Watching {} every {:?}", dir.display(), self.interval);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let scan_dir = dir.clone();
                        let scanned = tokio::task::spawn_blocking(move || {
                            let ready = scanner.scan(&scan_dir);
                            (scanner, ready)
                        })
                        .await;
                        let ready = match scanned {
                            Ok((returned, ready)) => {
                                scanner = returned;
                                ready
                            }
                            Err(e) => {
                                warn!("Scan of {} aborted: {}", dir.display(), e);
                                return;
                            }
                        };
                        for path in ready {
                            debug!("Detected {}", path.display());
                            tokio::select! {
                                _ = cancel.cancelled() => return,
                                sent = sender.send(path) => {
                                    if sent.is_err() {
                                        debug!("File receiver dropped, stopping watcher");
                                        return;
                                    }
                                }
                            }
                        }
                    }
                }
            }
            info!("Stopped watching {}", dir.display());
        });

        Ok(receiver)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    modified: SystemTime,
    len: u64,
}

#[derive(Debug)]
struct Observation {
    stamp: Stamp,
    reported: bool,
}

#[derive(Debug, Default)]
struct Scanner {
    seen: HashMap<PathBuf, Observation>,
}

impl Scanner {
    /// Returns the files that became ready since the previous scan, sorted.
    ///
    /// Files missing from this scan are forgotten, so one that reappears is
    /// treated as new.
    fn scan(&mut self, dir: &Path) -> Vec<PathBuf> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot read {}: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut ready = Vec::new();
        let mut present = HashSet::new();

        for entry in entries.flatten() {
            let path = entry.path();
            if !is_csv(&path) {
                continue;
            }
            let stamp = match entry.metadata() {
                Ok(meta) if meta.is_file() => Stamp {
                    modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                    len: meta.len(),
                },
                _ => continue,
            };
            present.insert(path.clone());

            match self.seen.get_mut(&path) {
                None => {
                    self.seen.insert(
                        path,
                        Observation {
                            stamp,
                            reported: false,
                        },
                    );
                }
                Some(obs) if obs.stamp != stamp => {
                    obs.stamp = stamp;
                    obs.reported = false;
                }
                Some(obs) if !obs.reported => {
                    obs.reported = true;
                    ready.push(path);
                }
                Some(_) => {}
            }
        }

        self.seen.retain(|path, _| present.contains(path));

        ready.sort();
        ready
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

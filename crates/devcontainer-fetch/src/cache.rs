//! Content-addressed cache directory layout and single-flight fetch
//! deduplication.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use devcontainer_types::CoreResult;

/// Cache path for a digest-keyed Feature tarball: `<cache>/<digest>/feature.tgz`.
pub fn tarball_path(cache_dir: &Path, digest: &str) -> PathBuf {
    let safe = digest.replace(':', "_");
    cache_dir.join(safe).join("feature.tgz")
}

pub fn digest_exists_and_matches(path: &Path, expected_digest: &str) -> bool {
    let Ok(bytes) = std::fs::read(path) else {
        return false;
    };
    devcontainer_oci::sha256_digest(&bytes) == expected_digest
}

/// Ensures only one in-flight download happens per cache key across the
/// process; a second caller for the same key blocks on the first's result
/// instead of re-fetching.
#[derive(Default)]
pub struct SingleFlight {
    inflight: Mutex<HashMap<String, Arc<OnceLock<CoreResult<PathBuf>>>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_fetch(
        &self,
        key: &str,
        fetch: impl FnOnce() -> CoreResult<PathBuf>,
    ) -> CoreResult<PathBuf> {
        let cell = {
            let mut map = self.inflight.lock().unwrap();
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceLock::new()))
                .clone()
        };
        cell.get_or_init(fetch).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    #[test]
    fn tarball_path_sanitizes_colon() {
        let path = tarball_path(Path::new("/cache"), "sha256:abcd");
        assert_eq!(path, PathBuf::from("/cache/sha256_abcd/feature.tgz"));
    }

    #[test]
    fn single_flight_runs_fetch_once_per_key() {
        let sf = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sf = sf.clone();
                let calls = calls.clone();
                thread::spawn(move || {
                    sf.get_or_fetch("same-key", || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(20));
                        Ok(PathBuf::from("/cache/sha256_x/feature.tgz"))
                    })
                    .unwrap()
                })
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().unwrap(), PathBuf::from("/cache/sha256_x/feature.tgz"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn single_flight_distinct_keys_both_run() {
        let sf = SingleFlight::new();
        let a = sf.get_or_fetch("a", || Ok(PathBuf::from("/a"))).unwrap();
        let b = sf.get_or_fetch("b", || Ok(PathBuf::from("/b"))).unwrap();
        assert_eq!(a, PathBuf::from("/a"));
        assert_eq!(b, PathBuf::from("/b"));
    }
}

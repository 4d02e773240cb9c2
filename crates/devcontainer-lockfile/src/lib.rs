//! # devcontainer-lockfile
//!
//! Reads and atomically writes `devcontainer-lock.json`, plans the new
//! lockfile state against a resolved Feature graph in `write` or `frozen`
//! mode, reports version drift (`outdated`), and folds targeted
//! re-resolutions back in (`upgrade`).

mod engine;
mod file;
mod outdated;
mod upgrade;

pub use engine::{plan, ResolvedFeature};
pub use file::{read, write_atomic};
pub use outdated::{outdated, OutdatedEntry, OutdatedReport};
pub use upgrade::{upgrade, UpgradeSelector};

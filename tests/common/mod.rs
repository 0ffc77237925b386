//! Shared helpers for end-to-end scenario tests.

use star_core::config::Config;
use star_core::embedding::MockEmbedder;
use star_core::storage::SqliteStore;
use star_core::StarCore;
use std::path::Path;

pub fn open_core(dir: &Path) -> StarCore {
    open_core_with(dir, |_| {})
}

pub fn open_core_with(dir: &Path, configure: impl FnOnce(&mut Config)) -> StarCore {
    let mut config = Config {
        mirror_root: dir.join("mirror"),
        embedding_dim: 8,
        ..Config::default()
    };
    configure(&mut config);
    StarCore::open(
        Box::new(SqliteStore::open_in_memory().unwrap()),
        None,
        Box::new(MockEmbedder::new(config.embedding_dim)),
        config,
    )
    .unwrap()
}

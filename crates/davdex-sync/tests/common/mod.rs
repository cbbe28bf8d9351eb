//! Shared test fixtures: an in-memory fake remote and a full driver stack
//!
//! The fake remote models a compliant WebDAV server: every mutation bumps
//! the mtime of all ancestor directories, which is the propagation behavior
//! the detector's pruning relies on. PROPFIND calls are counted per path so
//! tests can assert how much of the tree a pass actually touched.

// Not every test binary uses every fixture helper.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use davdex_cache::{DatabasePool, SqliteFileIndex};
use davdex_core::domain::{Namespace, RemotePath};
use davdex_core::ports::remote_directory::{Depth, IRemoteDirectory, StatModel};
use davdex_core::ports::AcceptAll;
use davdex_sync::SyncDriver;

#[derive(Debug, Clone)]
pub struct FakeNode {
    pub is_dir: bool,
    pub mtime: i64,
    pub size: u64,
}

/// In-memory remote tree with call counting and failure injection
#[derive(Default)]
pub struct FakeRemote {
    tree: Mutex<BTreeMap<String, FakeNode>>,
    calls: Mutex<Vec<(String, &'static str)>>,
    failures: Mutex<HashSet<(String, &'static str)>>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Bumps every ancestor directory's mtime, like a propagating server
    fn bump_ancestors(tree: &mut BTreeMap<String, FakeNode>, path: &str, mtime: i64) {
        let mut current = path;
        while let Some(idx) = current.rfind('/') {
            let parent = if idx == 0 { "/" } else { &current[..idx] };
            if let Some(node) = tree.get_mut(parent) {
                node.mtime = node.mtime.max(mtime);
            }
            if parent == "/" {
                break;
            }
            current = parent;
        }
    }

    pub fn add_dir(&self, path: &str, mtime: i64) {
        let mut tree = self.tree.lock().unwrap();
        tree.insert(
            path.to_string(),
            FakeNode {
                is_dir: true,
                mtime,
                size: 0,
            },
        );
        Self::bump_ancestors(&mut tree, path, mtime);
    }

    pub fn add_file(&self, path: &str, mtime: i64, size: u64) {
        let mut tree = self.tree.lock().unwrap();
        tree.insert(
            path.to_string(),
            FakeNode {
                is_dir: false,
                mtime,
                size,
            },
        );
        Self::bump_ancestors(&mut tree, path, mtime);
    }

    /// Updates a file in place, propagating the new mtime upward
    pub fn touch_file(&self, path: &str, mtime: i64, size: u64) {
        let mut tree = self.tree.lock().unwrap();
        if let Some(node) = tree.get_mut(path) {
            node.mtime = mtime;
            node.size = size;
        }
        Self::bump_ancestors(&mut tree, path, mtime);
    }

    /// Removes a path and everything beneath it, at the given time
    pub fn remove_subtree(&self, path: &str, at_mtime: i64) {
        let mut tree = self.tree.lock().unwrap();
        let prefix = format!("{path}/");
        tree.retain(|p, _| p != path && !p.starts_with(&prefix));
        Self::bump_ancestors(&mut tree, path, at_mtime);
    }

    /// Sets one node's mtime without propagation (for cache surgery tests)
    pub fn set_mtime(&self, path: &str, mtime: i64) {
        if let Some(node) = self.tree.lock().unwrap().get_mut(path) {
            node.mtime = mtime;
        }
    }

    pub fn fail_on(&self, path: &str, depth: Depth) {
        self.failures
            .lock()
            .unwrap()
            .insert((path.to_string(), depth.as_header_value()));
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of PROPFINDs issued against exactly this path
    pub fn calls_for(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .count()
    }

    /// Number of PROPFINDs against this path or anything beneath it
    pub fn calls_under(&self, path: &str) -> usize {
        let prefix = format!("{path}/");
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path || p.starts_with(&prefix))
            .count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn stat_for(path: &str, node: &FakeNode) -> StatModel {
        StatModel {
            path: path.to_string(),
            basename: path.rsplit('/').next().unwrap_or("/").to_string(),
            is_dir: node.is_dir,
            is_deleted: false,
            mtime_ms: node.mtime,
            size: node.size,
        }
    }
}

#[async_trait::async_trait]
impl IRemoteDirectory for FakeRemote {
    async fn propfind(&self, path: &RemotePath, depth: Depth) -> anyhow::Result<Vec<StatModel>> {
        let key = path.as_str().to_string();
        let depth_str = depth.as_header_value();
        self.calls.lock().unwrap().push((key.clone(), depth_str));

        if self
            .failures
            .lock()
            .unwrap()
            .contains(&(key.clone(), depth_str))
        {
            anyhow::bail!("injected transport failure for {key}");
        }

        let tree = self.tree.lock().unwrap();
        let Some(node) = tree.get(&key) else {
            return Ok(Vec::new());
        };

        let mut out = vec![Self::stat_for(&key, node)];
        if depth == Depth::One && node.is_dir {
            let prefix = if path.is_root() {
                "/".to_string()
            } else {
                format!("{key}/")
            };
            for (p, n) in tree.iter() {
                if p.len() > prefix.len()
                    && p.starts_with(&prefix)
                    && !p[prefix.len()..].contains('/')
                {
                    out.push(Self::stat_for(p, n));
                }
            }
        }
        Ok(out)
    }
}

/// Full stack over an in-memory store: (remote, index, driver)
pub async fn setup(base_dir: &str) -> (Arc<FakeRemote>, Arc<SqliteFileIndex>, SyncDriver) {
    let remote = FakeRemote::new();
    let pool = DatabasePool::in_memory()
        .await
        .expect("in-memory database");
    let base = RemotePath::new(base_dir).unwrap();
    let namespace = Namespace::new("test-vault", base.clone()).unwrap();
    let index = Arc::new(SqliteFileIndex::new(pool.pool().clone(), &namespace));

    let driver = SyncDriver::new(
        remote.clone() as Arc<dyn IRemoteDirectory>,
        index.clone(),
        base,
        5,
        Arc::new(AcceptAll),
    );

    (remote, index, driver)
}

/// Relative paths of a listing, already sorted by the driver
pub fn paths_of(listing: &[StatModel]) -> Vec<String> {
    listing.iter().map(|s| s.path.clone()).collect()
}

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::shared::config::Settings;
use crate::shared::timefmt::TimeExtractor;

use super::index::{builder, cache};
use super::scanner::scan_roots;
use super::table::FileTable;
use super::types::{FileMeta, IndexPolicy, RootSpec};

/// Owns the file table and drives the scan → index → prune → persist cycle.
pub struct FileIndexer {
    table: Arc<FileTable>,
    roots: RwLock<Vec<RootSpec>>,
    policy: IndexPolicy,
    extractor: Arc<TimeExtractor>,
    cache_dir: PathBuf,
    scan_interval: Duration,
    running: AtomicBool,
}

impl FileIndexer {
    pub fn from_settings(settings: &Settings) -> Self {
        let roots = settings.paths.iter().map(RootSpec::from_settings).collect();
        Self::new(
            roots,
            IndexPolicy::default(),
            TimeExtractor::new(),
            PathBuf::from(&settings.server.cache_path),
            Duration::from_secs(settings.server.scan_interval),
        )
    }

    pub fn new(
        roots: Vec<RootSpec>,
        policy: IndexPolicy,
        extractor: TimeExtractor,
        cache_dir: PathBuf,
        scan_interval: Duration,
    ) -> Self {
        Self {
            table: Arc::new(FileTable::new()),
            roots: RwLock::new(roots),
            policy,
            extractor: Arc::new(extractor),
            cache_dir,
            scan_interval,
            running: AtomicBool::new(false),
        }
    }

    pub fn table(&self) -> &Arc<FileTable> {
        &self.table
    }

    pub fn extractor(&self) -> &Arc<TimeExtractor> {
        &self.extractor
    }

    pub fn add_root(&self, root: RootSpec) {
        self.roots.write().unwrap().push(root);
    }

    pub fn list_prefix(&self, prefix: &str) -> Vec<FileMeta> {
        self.table.list_prefix(prefix)
    }

    pub fn get_file(&self, path: &str) -> Option<FileMeta> {
        self.table.get(path)
    }

    /// Startup sequence: scan so the root bindings exist, restore the
    /// cache onto live entries, then run a normal pass tail.
    pub fn init(&self) {
        let roots = self.roots.read().unwrap().clone();
        scan_roots(&self.table, &roots);
        if let Err(e) = cache::load(&self.table, &roots, &self.cache_dir) {
            warn!(target: "logsweep::cache", error = %e, "Index cache restore failed, continuing cold");
        }
        self.index_and_persist();
    }

    /// One periodic pass.
    pub fn run_pass(&self) {
        let roots = self.roots.read().unwrap().clone();
        scan_roots(&self.table, &roots);
        self.index_and_persist();
    }

    fn index_and_persist(&self) {
        let updated = builder::update_indexes(&self.table, &self.policy, &self.extractor);
        self.table.remove_missing();
        if updated == 0 {
            info!(target: "logsweep::index", "No index updates this pass, skipping cache save");
            return;
        }
        if let Err(e) = cache::save(&self.table, &self.cache_dir) {
            error!(target: "logsweep::cache", error = %e, "Index cache save failed");
        }
    }

    /// Spawn the background scan loop. Filesystem passes run on the
    /// blocking pool; the task wakes every second to honor `stop`.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let indexer = Arc::clone(self);
        tokio::spawn(async move {
            info!(target: "logsweep::scan", interval_secs = indexer.scan_interval.as_secs(), "Scanner loop started");
            while indexer.running.load(Ordering::SeqCst) {
                let worker = Arc::clone(&indexer);
                if let Err(e) = tokio::task::spawn_blocking(move || worker.run_pass()).await {
                    error!(target: "logsweep::scan", error = %e, "Scan pass panicked");
                }
                let mut slept = Duration::ZERO;
                while slept < indexer.scan_interval && indexer.running.load(Ordering::SeqCst) {
                    sleep(Duration::from_secs(1)).await;
                    slept += Duration::from_secs(1);
                }
            }
            info!(target: "logsweep::scan", "Scanner loop stopped");
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

//! Time-bounded snapshot of installed and running applications.
//!
//! Readers clone an `Arc` of the current snapshot. When it is older than the
//! TTL, one refresh task is spawned and concurrent callers wait on it through
//! the refresh gate. The task publishes on its own, so a caller that gives up
//! waiting does not cancel the refresh.

use super::platform::{AppPlatform, InstalledApp};
use crate::core::error::Result;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default snapshot lifetime
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

/// A launchable application as shown in results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppRecord {
    pub name: String,
    pub path: PathBuf,
    pub is_running: bool,
    /// Data URL, when the bundle has a readable icon
    pub icon: Option<String>,
}

/// Applications as of one refresh.
#[derive(Debug, Default)]
pub struct AppSnapshot {
    pub apps: Vec<AppRecord>,
}

#[derive(Default)]
struct CacheState {
    snapshot: Arc<AppSnapshot>,
    last_refresh: Option<Instant>,
}

/// State the refresh task shares with the cache
struct Shared {
    platform: Arc<dyn AppPlatform>,
    state: RwLock<CacheState>,
    icons: RwLock<HashMap<PathBuf, Option<String>>>,
}

pub struct AppCache {
    shared: Arc<Shared>,
    ttl: Duration,
    /// In-flight refresh, if any
    refresh_gate: Mutex<Option<JoinHandle<()>>>,
}

impl AppCache {
    pub fn new(platform: Arc<dyn AppPlatform>, ttl: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                platform,
                state: RwLock::new(CacheState::default()),
                icons: RwLock::new(HashMap::new()),
            }),
            ttl,
            refresh_gate: Mutex::new(None),
        }
    }

    /// Applications whose name contains `substring` (case-insensitive),
    /// running ones first, then by name.
    pub async fn query(&self, substring: &str) -> Vec<AppRecord> {
        let snapshot = self.snapshot().await;
        let needle = substring.trim().to_lowercase();

        let mut matches: Vec<AppRecord> = snapshot
            .apps
            .iter()
            .filter(|app| needle.is_empty() || app.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();

        matches.sort_by(|a, b| {
            b.is_running
                .cmp(&a.is_running)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
                .then_with(|| a.name.cmp(&b.name))
        });
        matches
    }

    /// Current snapshot, refreshed first if it has expired.
    ///
    /// Dropping the returned future stops waiting but leaves the refresh
    /// running; its result is published for later callers.
    pub async fn snapshot(&self) -> Arc<AppSnapshot> {
        if let Some(snapshot) = self.fresh_snapshot() {
            return snapshot;
        }

        let mut gate = self.refresh_gate.lock().await;
        // Another caller may have refreshed while we waited
        if let Some(snapshot) = self.fresh_snapshot() {
            return snapshot;
        }

        let in_flight = gate.as_ref().is_some_and(|handle| !handle.is_finished());
        if !in_flight {
            let shared = Arc::clone(&self.shared);
            *gate = Some(tokio::spawn(async move { shared.refresh().await }));
        }

        if let Some(handle) = gate.as_mut() {
            if let Err(e) = handle.await {
                warn!("Application refresh task failed: {}", e);
            }
        }
        *gate = None;

        self.shared.current()
    }

    /// Force the next query to refresh
    pub fn invalidate(&self) {
        let mut state = self.shared.state.write().unwrap_or_else(PoisonError::into_inner);
        state.last_refresh = None;
    }

    /// Activate `app` if it is running, launch it otherwise.
    pub async fn launch_or_activate(&self, app: &AppRecord) -> bool {
        let platform = &self.shared.platform;
        let result = if app.is_running {
            platform.activate(&app.name).await
        } else {
            platform.launch(&app.path).await
        };

        match result {
            Ok(()) => {
                info!(
                    "{} {}",
                    if app.is_running { "Activated" } else { "Launched" },
                    app.name
                );
                if !app.is_running {
                    self.invalidate();
                }
                true
            }
            Err(e) => {
                warn!("Could not open {}: {}", app.name, e);
                false
            }
        }
    }

    fn fresh_snapshot(&self) -> Option<Arc<AppSnapshot>> {
        let state = self.shared.state.read().unwrap_or_else(PoisonError::into_inner);
        match state.last_refresh {
            Some(at) if at.elapsed() < self.ttl => Some(Arc::clone(&state.snapshot)),
            _ => None,
        }
    }
}

impl Shared {
    fn current(&self) -> Arc<AppSnapshot> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&state.snapshot)
    }

    /// Rebuild the snapshot and publish it. A failure keeps the old snapshot
    /// but still stamps the refresh time.
    async fn refresh(&self) {
        let result = self.load().await;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(snapshot) => state.snapshot = Arc::new(snapshot),
            Err(e) => warn!("Application refresh failed, serving last snapshot: {}", e),
        }
        state.last_refresh = Some(Instant::now());
    }

    async fn load(&self) -> Result<AppSnapshot> {
        let installed = self.platform.installed_apps().await?;
        let running: HashSet<String> = self.platform.running_app_names().await?.into_iter().collect();
        self.resolve_icons(&installed).await;

        let icons = self.icons.read().unwrap_or_else(PoisonError::into_inner);
        let apps = installed
            .into_iter()
            .map(|app| AppRecord {
                is_running: running.contains(&app.name),
                icon: icons.get(&app.path).cloned().flatten(),
                name: app.name,
                path: app.path,
            })
            .collect::<Vec<_>>();

        debug!("Refreshed {} applications ({} running)", apps.len(), running.len());
        Ok(AppSnapshot { apps })
    }

    /// Resolve icons for bundles not seen before; results are cached per path.
    async fn resolve_icons(&self, installed: &[InstalledApp]) {
        let missing: Vec<PathBuf> = {
            let icons = self.icons.read().unwrap_or_else(PoisonError::into_inner);
            installed
                .iter()
                .filter(|app| !icons.contains_key(&app.path))
                .map(|app| app.path.clone())
                .collect()
        };
        if missing.is_empty() {
            return;
        }

        let platform = Arc::clone(&self.platform);
        let resolved = tokio::task::spawn_blocking(move || {
            missing
                .into_par_iter()
                .map(|path| {
                    let icon = platform.icon(&path);
                    (path, icon)
                })
                .collect::<Vec<_>>()
        })
        .await;

        match resolved {
            Ok(resolved) => {
                let mut icons = self.icons.write().unwrap_or_else(PoisonError::into_inner);
                icons.extend(resolved);
            }
            Err(e) => warn!("Icon resolution failed: {}", e),
        }
    }
}



//! Autosave scheduler: Dirty -> Clean transitions against the storage target
//!
//! A periodic timer and the explicit save hook both funnel through the same
//! write path, serialized by an in-flight latch so the timer and a manual
//! save never tear the same files. A clean store makes the write a no-op; a
//! failed write leaves the store dirty and the next tick retries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec;
use crate::infrastructure::events::{Event, EventBus};
use crate::persistence::{PersistenceError, PersistenceGateway, LOG_FILE, ROSTER_FILE};
use crate::store::LedgerStore;

use super::Service;

/// Default autosave period: five minutes
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Periodic persistence of the ledger to a configured storage target
pub struct AttendanceSaver {
    gateway: Arc<dyn PersistenceGateway>,
    store: Arc<RwLock<LedgerStore>>,
    events: Arc<EventBus>,
    interval: Duration,
    running: Arc<AtomicBool>,
    write_in_flight: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AttendanceSaver {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        store: Arc<RwLock<LedgerStore>>,
        events: Arc<EventBus>,
        interval: Duration,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            gateway,
            store,
            events,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            write_in_flight: Arc::new(AtomicBool::new(false)),
            shutdown,
            handle: Mutex::new(None),
        }
    }

    /// Write the ledger now if it is dirty.
    ///
    /// Returns true when a write happened, false when the store was clean or
    /// another write already held the target.
    pub async fn save_now(&self) -> Result<bool, PersistenceError> {
        save_snapshot(
            &self.gateway,
            &self.store,
            &self.events,
            &self.write_in_flight,
        )
        .await
    }
}

#[async_trait::async_trait]
impl Service for AttendanceSaver {
    async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!(interval_secs = self.interval.as_secs(), "starting autosave");

        let gateway = self.gateway.clone();
        let store = self.store.clone();
        let events = self.events.clone();
        let write_in_flight = self.write_in_flight.clone();
        let running = self.running.clone();
        let mut shutdown = self.shutdown.subscribe();
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The immediate first tick would re-save freshly loaded state.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match save_snapshot(&gateway, &store, &events, &write_in_flight).await {
                            Ok(true) => debug!("autosave completed"),
                            Ok(false) => {}
                            Err(err) => warn!("autosave failed, will retry: {err}"),
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
            running.store(false, Ordering::SeqCst);
        });

        *self.handle.lock().await = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
        info!("autosave stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "autosave"
    }
}

/// Shared write path for the timer and explicit saves
async fn save_snapshot(
    gateway: &Arc<dyn PersistenceGateway>,
    store: &Arc<RwLock<LedgerStore>>,
    events: &EventBus,
    write_in_flight: &AtomicBool,
) -> Result<bool, PersistenceError> {
    if write_in_flight.swap(true, Ordering::SeqCst) {
        debug!("skipping save, another write is in flight");
        return Ok(false);
    }
    let result = write_ledger(gateway.as_ref(), store).await;
    write_in_flight.store(false, Ordering::SeqCst);

    match &result {
        Ok(true) => {
            if let Some(at) = store.read().await.last_saved() {
                events.emit(Event::SaveCompleted { at });
            }
        }
        Ok(false) => {}
        Err(err) => events.emit(Event::SaveFailed {
            reason: err.to_string(),
        }),
    }
    result
}

async fn write_ledger(
    gateway: &dyn PersistenceGateway,
    store: &RwLock<LedgerStore>,
) -> Result<bool, PersistenceError> {
    // Snapshot synchronously under one read guard; both files must come
    // from the same ledger state. The generation travels with the snapshot
    // so a mutation arriving during the awaited writes keeps the store
    // dirty and gets picked up by the next save.
    let (roster_text, log_text, generation) = {
        let store = store.read().await;
        if !store.is_dirty() {
            return Ok(false);
        }
        (
            codec::encode_roster(store.roster()),
            codec::encode_log(store.log()),
            store.generation(),
        )
    };

    gateway.write_named(ROSTER_FILE, roster_text.as_bytes()).await?;
    gateway.write_named(LOG_FILE, log_text.as_bytes()).await?;

    store.write().await.mark_saved(Utc::now(), generation);
    Ok(true)
}

//! CampusID core
//!
//! Attendance reconciliation and persistence engine: tracks registered
//! identities and their daily presence, reconciling recognition events,
//! manual edits, and imported snapshots into one consistent ledger backed
//! by delimited-text files.

pub mod codec;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod infrastructure;
pub mod oracle;
pub mod persistence;
pub mod services;
pub mod store;

pub use error::CoreError;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::{AttendanceRecord, DayStats, DayStatus, DayView, Identity};
use crate::engine::ReconciliationOutcome;
use crate::infrastructure::events::{Event, EventBus, ImportKind};
use crate::oracle::RecognitionOracle;
use crate::persistence::{DirGateway, PersistenceGateway, LOG_FILE, ROSTER_FILE};
use crate::services::{AttendanceSaver, Service};
use crate::store::LedgerStore;

/// The main context for all core operations
pub struct Core {
    /// Application configuration
    config: Arc<RwLock<AppConfig>>,

    /// Authoritative in-memory ledger
    store: Arc<RwLock<LedgerStore>>,

    /// Event bus for state changes
    pub events: Arc<EventBus>,

    /// External identity-match oracle, if one is configured
    oracle: Option<Arc<dyn RecognitionOracle>>,

    /// Autosave service; present once a storage target is connected
    saver: RwLock<Option<Arc<AttendanceSaver>>>,
}

impl Core {
    /// Initialize a new Core instance with the default data directory
    pub async fn new() -> anyhow::Result<Self> {
        let data_dir = config::default_data_dir()?;
        Self::new_with_config(data_dir).await
    }

    /// Initialize a new Core instance with a custom data directory
    pub async fn new_with_config(data_dir: PathBuf) -> anyhow::Result<Self> {
        info!("Initializing CampusID core at {:?}", data_dir);

        let config = AppConfig::load_or_create(&data_dir)?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store: Arc::new(RwLock::new(LedgerStore::new())),
            events: Arc::new(EventBus::default()),
            oracle: None,
            saver: RwLock::new(None),
        })
    }

    /// Install the identity-match oracle
    pub fn set_oracle(&mut self, oracle: Arc<dyn RecognitionOracle>) {
        self.oracle = Some(oracle);
    }

    /// Get the application configuration
    pub fn config(&self) -> Arc<RwLock<AppConfig>> {
        self.config.clone()
    }

    /// Connect a storage directory: load any existing ledger files and
    /// start the autosave service against that target.
    ///
    /// Missing files mean a fresh start; a malformed file rejects the
    /// connect and leaves the in-memory ledger untouched.
    pub async fn connect(&self, dir: PathBuf) -> Result<(), CoreError> {
        let gateway = DirGateway::new(dir)?;

        let roster = match gateway.read_named(ROSTER_FILE).await? {
            Some(bytes) => Some(codec::decode_roster(&codec::text_from_bytes(bytes)?)?),
            None => {
                info!("no existing roster file, starting fresh");
                None
            }
        };
        let log = match gateway.read_named(LOG_FILE).await? {
            Some(bytes) => Some(codec::decode_log(&codec::text_from_bytes(bytes)?)?),
            None => {
                info!("no existing attendance file, starting fresh");
                None
            }
        };

        self.store.write().await.install_loaded(roster, log);

        let interval = Duration::from_secs(self.config.read().await.autosave_interval_secs);
        let saver = Arc::new(AttendanceSaver::new(
            Arc::new(gateway) as Arc<dyn PersistenceGateway>,
            self.store.clone(),
            self.events.clone(),
            interval,
        ));
        if let Err(err) = saver.start().await {
            warn!("failed to start autosave, explicit saves still work: {err}");
        }
        *self.saver.write().await = Some(saver);
        Ok(())
    }

    /// Reconcile one probe image into the ledger.
    ///
    /// The existing-records snapshot is taken synchronously after the
    /// oracle call returns, so the duplicate check never decides against
    /// stale data from before the await.
    pub async fn check_in(&self, probe: &[u8]) -> Result<ReconciliationOutcome, CoreError> {
        let oracle = self.oracle.clone().ok_or(CoreError::NoOracle)?;
        let roster = self.store.read().await.roster().to_vec();
        let result = oracle.recognize(probe, &roster).await?;

        let late_threshold = self.config.read().await.late_threshold;
        let mut store = self.store.write().await;
        let outcome = engine::submit_recognition(
            &result,
            store.roster(),
            store.log(),
            Local::now(),
            late_threshold,
        );
        let applied = store.apply_outcome(outcome.clone());
        drop(store);

        for record in &applied {
            self.events.emit(Event::CheckInRecorded {
                record_id: record.id,
                user_id: record.user_id,
                user_name: record.user_name.clone(),
                status: record.status,
            });
        }
        if outcome.already_present > 0 {
            self.events.emit(Event::AlreadyPresent {
                count: outcome.already_present,
            });
        }
        Ok(outcome)
    }

    /// Register a new identity.
    ///
    /// When an oracle is configured and the roster is non-empty, the
    /// reference image is first matched against existing faces; a confident
    /// match blocks the registration.
    pub async fn register(
        &self,
        name: impl Into<String>,
        role: impl Into<String>,
        department: impl Into<String>,
        image: String,
    ) -> Result<Identity, CoreError> {
        if let Some(oracle) = &self.oracle {
            let roster = self.store.read().await.roster().to_vec();
            if !roster.is_empty() {
                let result = oracle.recognize(image.as_bytes(), &roster).await?;
                if let Some(dup) = engine::check_duplicate_face(&result, &roster) {
                    warn!(name = %dup.name, confidence = dup.confidence, "registration blocked");
                    return Err(CoreError::DuplicateFace {
                        user_id: dup.user_id,
                        name: dup.name,
                        confidence: dup.confidence,
                    });
                }
            }
        }

        let identity = Identity::new(name, role, department, image);
        self.store.write().await.register(identity.clone());
        self.events.emit(Event::IdentityRegistered {
            id: identity.id,
            name: identity.name.clone(),
        });
        Ok(identity)
    }

    /// Manually override an identity's status for a date.
    ///
    /// Returns false when the override was a no-op (unknown identity, or
    /// Absent with nothing to remove).
    pub async fn set_status(
        &self,
        user_id: Uuid,
        status: DayStatus,
        date: NaiveDate,
    ) -> Result<bool, CoreError> {
        let mut store = self.store.write().await;
        let Some(mutation) = engine::update_status(user_id, status, date, store.roster(), store.log())
        else {
            return Ok(false);
        };
        store.apply_mutation(mutation);
        drop(store);

        self.events.emit(Event::StatusOverridden {
            user_id,
            date,
            status,
        });
        Ok(true)
    }

    /// Delete an identity; its historical records remain, orphaned
    pub async fn delete_identity(&self, id: Uuid) -> bool {
        let deleted = self.store.write().await.delete_identity(id);
        if deleted {
            self.events.emit(Event::IdentityDeleted { id });
        }
        deleted
    }

    /// Project one local calendar day
    pub async fn day_view(&self, date: NaiveDate) -> DayView {
        self.store.read().await.day_view(date)
    }

    /// Aggregate counts for one local calendar day
    pub async fn day_stats(&self, date: NaiveDate) -> DayStats {
        self.store.read().await.day_stats(date)
    }

    /// Snapshot of the roster
    pub async fn roster(&self) -> Vec<Identity> {
        self.store.read().await.roster().to_vec()
    }

    /// Snapshot of the attendance log, newest first
    pub async fn log(&self) -> Vec<AttendanceRecord> {
        self.store.read().await.log().to_vec()
    }

    /// Whether unsaved mutations are pending
    pub async fn is_dirty(&self) -> bool {
        self.store.read().await.is_dirty()
    }

    /// Replace the whole roster from an imported byte blob
    pub async fn import_roster(&self, bytes: Vec<u8>) -> Result<usize, CoreError> {
        // Decode fully before touching the store: a bad file must never
        // partially apply.
        let roster = codec::decode_roster(&codec::text_from_bytes(bytes)?)?;
        let count = self.store.write().await.replace_roster(roster);
        self.events.emit(Event::CollectionImported {
            collection: ImportKind::Roster,
            count,
        });
        Ok(count)
    }

    /// Replace the whole attendance log from an imported byte blob
    pub async fn import_log(&self, bytes: Vec<u8>) -> Result<usize, CoreError> {
        let log = codec::decode_log(&codec::text_from_bytes(bytes)?)?;
        let count = self.store.write().await.replace_log(log);
        self.events.emit(Event::CollectionImported {
            collection: ImportKind::AttendanceLog,
            count,
        });
        Ok(count)
    }

    /// Full roster export in the persisted format
    pub async fn export_roster(&self) -> String {
        codec::encode_roster(self.store.read().await.roster())
    }

    /// Full attendance-log export in the persisted format
    pub async fn export_log(&self) -> String {
        codec::encode_log(self.store.read().await.log())
    }

    /// Simplified member list (no images), for sharing outside the system
    pub async fn export_member_list(&self) -> String {
        let store = self.store.read().await;
        let mut out = String::from("Name,Role,Department");
        for identity in store.roster() {
            out.push('\n');
            out.push_str(&format!(
                "{},{},{}",
                codec::quoted(&identity.name),
                identity.role,
                codec::quoted(&identity.department)
            ));
        }
        out
    }

    /// Human-oriented attendance report with live department lookup;
    /// orphaned records report an empty department
    pub async fn export_report(&self) -> String {
        let store = self.store.read().await;
        let mut out = String::from("Name,Role,Dept,Date,Time,Status");
        for record in store.log() {
            let department = store
                .find_identity(record.user_id)
                .map(|i| i.department.as_str())
                .unwrap_or("");
            out.push('\n');
            out.push_str(&format!(
                "{},{},{},{},{},{}",
                codec::quoted(&record.user_name),
                record.role,
                codec::quoted(department),
                record.timestamp.format("%Y-%m-%d"),
                record.timestamp.format("%H:%M:%S"),
                record.status
            ));
        }
        out
    }

    /// Explicitly save now.
    ///
    /// Returns false when no storage target is connected or nothing was
    /// dirty; only waits when a target has been configured.
    pub async fn save(&self) -> Result<bool, CoreError> {
        let saver = self.saver.read().await.clone();
        match saver {
            Some(saver) => Ok(saver.save_now().await?),
            None => Ok(false),
        }
    }

    /// When the ledger was last written to storage
    pub async fn last_saved(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.store.read().await.last_saved()
    }

    /// Shutdown gracefully: final save attempt, stop services, save config
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        info!("Shutting down CampusID core...");

        if let Err(err) = self.save().await {
            warn!("final save failed, unsaved changes remain in memory: {err}");
        }
        if let Some(saver) = self.saver.write().await.take() {
            saver.stop().await?;
        }
        self.config.write().await.save()?;
        info!("Shutdown complete");
        Ok(())
    }
}

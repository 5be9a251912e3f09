use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::WaitlistError;
use crate::models::{select_best_entry, FreedSlot, OfferedSlot};
use crate::services::store::WaitlistStore;

#[derive(Debug, Clone)]
pub struct MatcherSettings {
    pub worker_id: String,
    pub sweep_interval_seconds: u64,
    pub idle_poll_ms: u64,
    pub error_backoff_seconds: u64,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            worker_id: format!("matcher-{}", Uuid::new_v4()),
            sweep_interval_seconds: 60,
            idle_poll_ms: 200,
            error_backoff_seconds: 5,
        }
    }
}

/// Consumes freed-slot events and offers each slot to the best waiting
/// entry. Runs alongside the API server.
pub struct WaitlistMatcher {
    store: Arc<WaitlistStore>,
    settings: MatcherSettings,
    is_shutdown: Arc<RwLock<bool>>,
}

impl WaitlistMatcher {
    pub fn new(store: Arc<WaitlistStore>, settings: MatcherSettings) -> Self {
        Self {
            store,
            settings,
            is_shutdown: Arc::new(RwLock::new(false)),
        }
    }

    #[instrument(skip(self), fields(worker_id = %self.settings.worker_id))]
    pub async fn start(&self) -> Result<(), WaitlistError> {
        info!("Starting waitlist matcher {}", self.settings.worker_id);

        let match_worker = self.clone_worker();
        let match_handle = tokio::spawn(async move { match_worker.match_loop().await });

        let sweep_worker = self.clone_worker();
        let sweep_handle = tokio::spawn(async move { sweep_worker.sweep_loop().await });

        let results = futures::future::join_all([match_handle, sweep_handle]).await;
        for result in results {
            if let Err(e) = result {
                warn!("Matcher task ended abnormally: {}", e);
            }
        }

        info!("Waitlist matcher {} stopped", self.settings.worker_id);
        Ok(())
    }

    pub async fn shutdown(&self) {
        info!("Shutting down waitlist matcher {}", self.settings.worker_id);
        let mut is_shutdown = self.is_shutdown.write().await;
        *is_shutdown = true;
    }

    async fn match_loop(&self) {
        debug!("Match loop started: {}", self.settings.worker_id);

        loop {
            if *self.is_shutdown.read().await {
                break;
            }

            match self.store.dequeue_freed_slot().await {
                Ok(Some((slot, raw))) => {
                    if let Err(e) = self.process_slot(&slot).await {
                        error!("Failed to process freed slot: {}", e);
                    }
                    if let Err(e) = self.store.ack_freed_slot(&raw).await {
                        warn!("Failed to ack freed slot: {}", e);
                    }
                }
                Ok(None) => {
                    tokio::time::sleep(Duration::from_millis(self.settings.idle_poll_ms)).await;
                }
                Err(e) => {
                    error!("Failed to dequeue freed slot: {}", e);
                    tokio::time::sleep(Duration::from_secs(self.settings.error_backoff_seconds))
                        .await;
                }
            }
        }

        debug!("Match loop ended: {}", self.settings.worker_id);
    }

    #[instrument(skip(self, slot), fields(doctor_id = %slot.doctor_id, specialty = %slot.specialty))]
    async fn process_slot(&self, slot: &FreedSlot) -> Result<(), WaitlistError> {
        let entries = self.store.entries_for_specialty(&slot.specialty).await?;

        let Some(best) = select_best_entry(&entries, slot) else {
            debug!("No waiting entry matches the freed slot");
            return Ok(());
        };

        let offered = self
            .store
            .mark_offered(
                &best.id,
                OfferedSlot {
                    doctor_id: slot.doctor_id,
                    start_time: slot.start_time,
                    end_time: slot.end_time,
                },
            )
            .await?;

        // Notification fan-out is out of scope; the offer itself is the
        // patient-visible state change.
        info!(
            "Offered slot with doctor {} at {} to patient {} (entry {}, expires {:?})",
            slot.doctor_id, slot.start_time, offered.patient_id, offered.id, offered.offer_expires_at
        );
        Ok(())
    }

    async fn sweep_loop(&self) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.settings.sweep_interval_seconds));

        loop {
            interval.tick().await;

            if *self.is_shutdown.read().await {
                break;
            }

            if let Err(e) = self.store.sweep_offers().await {
                warn!("Offer sweep failed: {}", e);
            }
            if let Err(e) = self.store.cleanup_terminal(7).await {
                warn!("Waitlist cleanup failed: {}", e);
            }
        }
    }

    fn clone_worker(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: self.settings.clone(),
            is_shutdown: Arc::clone(&self.is_shutdown),
        }
    }
}

use std::sync::Arc;

use chrono::{Duration, Utc};
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::error::WaitlistError;
use crate::models::{
    FreedSlot, JoinWaitlistRequest, OfferedSlot, WaitlistEntry, WaitlistStats, WaitlistStatus,
};

const SLOTS_PENDING_KEY: &str = "waitlist:slots:pending";
const SLOTS_PROCESSING_KEY: &str = "waitlist:slots:processing";

pub struct WaitlistStore {
    pool: Pool,
    offer_ttl_minutes: i64,
    stats: Arc<RwLock<WaitlistStats>>,
}

impl WaitlistStore {
    pub async fn new(config: &AppConfig) -> Result<Self, WaitlistError> {
        let redis_url = config.redis_url.clone().ok_or(WaitlistError::NotConfigured)?;

        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| WaitlistError::QueueError(format!("Pool creation error: {}", e)))?;

        // Test connection
        let mut conn = pool
            .get()
            .await
            .map_err(|e| WaitlistError::QueueError(format!("Connection error: {}", e)))?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!("Waitlist store initialized");
        Ok(Self {
            pool,
            offer_ttl_minutes: config.waitlist_offer_ttl_minutes,
            stats: Arc::new(RwLock::new(WaitlistStats::default())),
        })
    }

    pub async fn join(
        &self,
        patient_id: Uuid,
        request: JoinWaitlistRequest,
    ) -> Result<WaitlistEntry, WaitlistError> {
        if request.specialty.trim().is_empty() {
            return Err(WaitlistError::Validation("Specialty is required".to_string()));
        }
        if request.earliest_start >= request.latest_start {
            return Err(WaitlistError::Validation(
                "Earliest acceptable time must be before the latest".to_string(),
            ));
        }
        if request.latest_start <= Utc::now() {
            return Err(WaitlistError::Validation(
                "The acceptable window is entirely in the past".to_string(),
            ));
        }

        let existing = self.list_for_patient(&patient_id.to_string()).await?;
        let duplicate = existing.iter().any(|entry| {
            entry.is_active() && entry.specialty.eq_ignore_ascii_case(&request.specialty)
        });
        if duplicate {
            return Err(WaitlistError::DuplicateEntry(request.specialty));
        }

        let entry = WaitlistEntry::new(patient_id, request);

        let mut conn = self.get_connection().await?;
        self.save_entry(&mut conn, &entry).await?;

        let _: () = conn
            .sadd(specialty_key(&entry.specialty), entry.id.to_string())
            .await?;
        let _: () = conn
            .sadd(patient_key(&entry.patient_id.to_string()), entry.id.to_string())
            .await?;

        {
            let mut stats = self.stats.write().await;
            stats.waiting += 1;
        }

        info!(
            "Patient {} joined the {} waitlist (entry {})",
            entry.patient_id, entry.specialty, entry.id
        );
        Ok(entry)
    }

    pub async fn get(&self, entry_id: &Uuid) -> Result<Option<WaitlistEntry>, WaitlistError> {
        let mut conn = self.get_connection().await?;
        self.load_entry(&mut conn, &entry_id.to_string()).await
    }

    pub async fn list_for_patient(
        &self,
        patient_id: &str,
    ) -> Result<Vec<WaitlistEntry>, WaitlistError> {
        let mut conn = self.get_connection().await?;
        let ids: Vec<String> = conn.smembers(patient_key(patient_id)).await?;

        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = self.load_entry(&mut conn, &id).await? {
                entries.push(entry);
            }
        }

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    pub async fn entries_for_specialty(
        &self,
        specialty: &str,
    ) -> Result<Vec<WaitlistEntry>, WaitlistError> {
        let mut conn = self.get_connection().await?;
        let ids: Vec<String> = conn.smembers(specialty_key(specialty)).await?;

        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = self.load_entry(&mut conn, &id).await? {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    pub async fn cancel(
        &self,
        entry_id: &Uuid,
        patient_id: &str,
    ) -> Result<WaitlistEntry, WaitlistError> {
        let mut conn = self.get_connection().await?;
        let mut entry = self
            .load_entry(&mut conn, &entry_id.to_string())
            .await?
            .ok_or_else(|| WaitlistError::NotFound(entry_id.to_string()))?;

        if entry.patient_id.to_string() != patient_id {
            return Err(WaitlistError::NotFound(entry_id.to_string()));
        }

        self.transition(&mut entry, WaitlistStatus::Cancelled)?;
        self.save_entry(&mut conn, &entry).await?;

        {
            let mut stats = self.stats.write().await;
            stats.waiting = stats.waiting.saturating_sub(1);
        }

        info!("Waitlist entry {} cancelled by patient", entry.id);
        Ok(entry)
    }

    /// Offer a freed slot to an entry; the offer carries a deadline.
    pub async fn mark_offered(
        &self,
        entry_id: &Uuid,
        slot: OfferedSlot,
    ) -> Result<WaitlistEntry, WaitlistError> {
        let mut conn = self.get_connection().await?;
        let mut entry = self
            .load_entry(&mut conn, &entry_id.to_string())
            .await?
            .ok_or_else(|| WaitlistError::NotFound(entry_id.to_string()))?;

        self.transition(&mut entry, WaitlistStatus::Offered)?;
        entry.offered_slot = Some(slot);
        entry.offer_expires_at = Some(Utc::now() + Duration::minutes(self.offer_ttl_minutes));
        self.save_entry(&mut conn, &entry).await?;

        {
            let mut stats = self.stats.write().await;
            stats.waiting = stats.waiting.saturating_sub(1);
            stats.offered += 1;
        }

        Ok(entry)
    }

    pub async fn accept_offer(
        &self,
        entry_id: &Uuid,
        patient_id: &str,
    ) -> Result<WaitlistEntry, WaitlistError> {
        let mut conn = self.get_connection().await?;
        let mut entry = self
            .load_entry(&mut conn, &entry_id.to_string())
            .await?
            .ok_or_else(|| WaitlistError::NotFound(entry_id.to_string()))?;

        if entry.patient_id.to_string() != patient_id {
            return Err(WaitlistError::NotFound(entry_id.to_string()));
        }

        if !entry.offer_is_live(Utc::now()) {
            return Err(WaitlistError::OfferLapsed(
                "The offered slot has expired or was withdrawn".to_string(),
            ));
        }

        self.transition(&mut entry, WaitlistStatus::Booked)?;
        self.save_entry(&mut conn, &entry).await?;

        {
            let mut stats = self.stats.write().await;
            stats.offered = stats.offered.saturating_sub(1);
            stats.booked_total += 1;
        }

        info!("Waitlist entry {} booked its offered slot", entry.id);
        Ok(entry)
    }

    /// Lapsed offers get one more round in the queue, then expire.
    pub async fn sweep_offers(&self) -> Result<(u64, u64), WaitlistError> {
        let mut conn = self.get_connection().await?;
        let keys: Vec<String> = conn.keys("waitlist:entry:*").await?;
        let now = Utc::now();

        let mut reverted = 0;
        let mut expired = 0;

        for key in keys {
            let raw: Option<String> = conn.hget(&key, "data").await?;
            let Some(raw) = raw else { continue };
            let mut entry: WaitlistEntry = serde_json::from_str(&raw)?;

            if entry.status != WaitlistStatus::Offered || entry.offer_is_live(now) {
                continue;
            }

            if entry.offer_lapses == 0 {
                // The patient keeps their place in the queue once.
                self.transition(&mut entry, WaitlistStatus::Waiting)?;
                entry.offer_lapses = 1;
                entry.offered_slot = None;
                entry.offer_expires_at = None;
                reverted += 1;
                debug!("Waitlist entry {} offer lapsed, back to waiting", entry.id);
            } else {
                self.transition(&mut entry, WaitlistStatus::Expired)?;
                expired += 1;
                debug!("Waitlist entry {} expired after repeated lapses", entry.id);
            }

            self.save_entry(&mut conn, &entry).await?;
        }

        if reverted > 0 || expired > 0 {
            info!("Offer sweep: {} reverted, {} expired", reverted, expired);
            let mut stats = self.stats.write().await;
            stats.offered = stats.offered.saturating_sub(reverted + expired);
            stats.waiting += reverted;
            stats.expired_total += expired;
        }

        Ok((reverted, expired))
    }

    /// Drop terminal entries older than the retention window.
    pub async fn cleanup_terminal(&self, retention_days: i64) -> Result<u64, WaitlistError> {
        let mut conn = self.get_connection().await?;
        let keys: Vec<String> = conn.keys("waitlist:entry:*").await?;
        let cutoff = Utc::now() - Duration::days(retention_days);

        let mut cleaned = 0;
        for key in keys {
            let raw: Option<String> = conn.hget(&key, "data").await?;
            let Some(raw) = raw else { continue };
            let entry: WaitlistEntry = serde_json::from_str(&raw)?;

            if entry.status.is_terminal() && entry.updated_at < cutoff {
                let _: () = conn.del(&key).await?;
                let _: () = conn
                    .srem(specialty_key(&entry.specialty), entry.id.to_string())
                    .await?;
                let _: () = conn
                    .srem(patient_key(&entry.patient_id.to_string()), entry.id.to_string())
                    .await?;
                cleaned += 1;
            }
        }

        if cleaned > 0 {
            info!("Cleaned up {} settled waitlist entries", cleaned);
        }
        Ok(cleaned)
    }

    pub async fn stats(&self) -> WaitlistStats {
        self.stats.read().await.clone()
    }

    // Freed-slot event queue

    pub async fn publish_freed_slot(&self, slot: &FreedSlot) -> Result<(), WaitlistError> {
        let mut conn = self.get_connection().await?;
        let payload = serde_json::to_string(slot)?;
        let _: () = conn.lpush(SLOTS_PENDING_KEY, payload).await?;
        debug!(
            "Freed slot queued for doctor {} at {}",
            slot.doctor_id, slot.start_time
        );
        Ok(())
    }

    /// Blocking pop into the processing list; ack removes the in-flight copy.
    pub async fn dequeue_freed_slot(
        &self,
    ) -> Result<Option<(FreedSlot, String)>, WaitlistError> {
        let mut conn = self.get_connection().await?;
        let payload: Option<String> = conn
            .brpoplpush(SLOTS_PENDING_KEY, SLOTS_PROCESSING_KEY, 1.0)
            .await?;

        match payload {
            Some(raw) => {
                let slot: FreedSlot = serde_json::from_str(&raw)?;
                Ok(Some((slot, raw)))
            }
            None => Ok(None),
        }
    }

    pub async fn ack_freed_slot(&self, raw: &str) -> Result<(), WaitlistError> {
        let mut conn = self.get_connection().await?;
        let _: () = conn.lrem(SLOTS_PROCESSING_KEY, 1, raw).await?;
        Ok(())
    }

    // Private helpers

    async fn get_connection(&self) -> Result<Connection, WaitlistError> {
        self.pool
            .get()
            .await
            .map_err(|e| WaitlistError::QueueError(format!("Failed to get connection: {}", e)))
    }

    fn transition(
        &self,
        entry: &mut WaitlistEntry,
        target: WaitlistStatus,
    ) -> Result<(), WaitlistError> {
        if !entry.status.can_transition_to(target) {
            return Err(WaitlistError::InvalidTransition {
                from: entry.status.to_string(),
                to: target.to_string(),
            });
        }
        entry.status = target;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn save_entry(
        &self,
        conn: &mut Connection,
        entry: &WaitlistEntry,
    ) -> Result<(), WaitlistError> {
        let key = entry_key(&entry.id.to_string());
        let payload = serde_json::to_string(entry)?;

        let _: () = conn
            .hset_multiple(
                &key,
                &[
                    ("data", payload.as_str()),
                    ("status", &entry.status.to_string()),
                    ("patient_id", &entry.patient_id.to_string()),
                    ("specialty", &entry.specialty),
                ],
            )
            .await?;
        // Entries linger for bookkeeping, then fall out of Redis on their own.
        let _: () = conn.expire(&key, 2_592_000).await?;

        Ok(())
    }

    async fn load_entry(
        &self,
        conn: &mut Connection,
        entry_id: &str,
    ) -> Result<Option<WaitlistEntry>, WaitlistError> {
        let raw: Option<String> = conn.hget(entry_key(entry_id), "data").await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

fn entry_key(entry_id: &str) -> String {
    format!("waitlist:entry:{}", entry_id)
}

fn specialty_key(specialty: &str) -> String {
    format!("waitlist:specialty:{}", specialty.to_lowercase())
}

fn patient_key(patient_id: &str) -> String {
    format!("waitlist:patient:{}", patient_id)
}

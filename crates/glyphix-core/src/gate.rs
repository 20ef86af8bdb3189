//! Presence-bound access gate
//!
//! The gate owns the current [`PresenceState`] and decides, per request,
//! whether it satisfies the resource's [`PresenceRequirement`]. Only granted
//! requests reach the cipher or the shard combiner; denied requests return
//! [`AccessError::PresenceDenied`] without touching key material, so a denial
//! says nothing about whether the key exists.
//!
//! Every gated request is appended to the access log, granted or not.
//!
//! # Concurrency
//!
//! The state is an immutable snapshot swapped under an `RwLock`. A decision
//! reads one snapshot, so an update racing with a check is either fully seen
//! or not seen at all.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{Duration, Utc};
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::audit::{AccessAttempt, AccessLog};
use crate::component::{Component, ComponentStats, ComponentStatus};
use crate::engine::{ContentCipher, EncryptedBlob};
use crate::error::AccessError;
use crate::keystore::KeyStore;
use crate::presence::{PresenceRequirement, PresenceState};
use crate::sharding::{KeyShard, MasterKey, ShardManager};

/// Reason recorded when the presence snapshot is older than allowed
pub const STALE_PRESENCE_REASON: &str = "presence state is stale";

/// Outcome of matching current presence against a requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceDecision {
    /// Presence satisfies the requirement
    Granted,
    /// Presence does not satisfy the requirement
    Denied {
        /// First failing field, with current and required values
        reason: String,
    },
}

impl PresenceDecision {
    /// Whether access is granted
    pub fn is_granted(&self) -> bool {
        matches!(self, PresenceDecision::Granted)
    }

    /// Denial reason, if denied
    pub fn reason(&self) -> Option<&str> {
        match self {
            PresenceDecision::Granted => None,
            PresenceDecision::Denied { reason } => Some(reason),
        }
    }
}

/// Gate in front of a [`ContentCipher`]
pub struct PresenceGate<C: ?Sized> {
    cipher: Arc<C>,
    presence: RwLock<Arc<PresenceState>>,
    log: AccessLog,
    max_presence_age: Option<Duration>,
    granted: AtomicU64,
    denied: AtomicU64,
}

impl<C: ContentCipher + ?Sized> PresenceGate<C> {
    /// Create a gate with an initial presence state
    pub fn new(cipher: Arc<C>, initial: PresenceState) -> Self {
        Self {
            cipher,
            presence: RwLock::new(Arc::new(initial)),
            log: AccessLog::new(),
            max_presence_age: None,
            granted: AtomicU64::new(0),
            denied: AtomicU64::new(0),
        }
    }

    /// Deny gated requests when the presence snapshot is older than `max_age`
    pub fn with_max_presence_age(mut self, max_age: Duration) -> Self {
        self.max_presence_age = Some(max_age);
        self
    }

    /// Replace the current presence state
    pub fn update_presence(&self, state: PresenceState) {
        info!(
            mode = %state.mode,
            focus = %state.focus_level,
            social = %state.social_context,
            "presence updated"
        );
        *self.presence.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(state);
    }

    /// Snapshot of the current presence state
    pub fn current_presence(&self) -> Arc<PresenceState> {
        self.presence
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Match current presence against `required`
    ///
    /// `None` means the resource is not presence-gated and is always granted.
    pub fn evaluate(&self, required: Option<&PresenceRequirement>) -> PresenceDecision {
        let Some(required) = required else {
            return PresenceDecision::Granted;
        };

        let state = self.current_presence();
        if let Some(max_age) = self.max_presence_age {
            if state.is_stale(max_age, Utc::now()) {
                return PresenceDecision::Denied {
                    reason: STALE_PRESENCE_REASON.to_string(),
                };
            }
        }

        match required.mismatch(&state) {
            None => PresenceDecision::Granted,
            Some(reason) => PresenceDecision::Denied { reason },
        }
    }

    /// Whether current presence satisfies `required`
    pub fn can_access(&self, required: Option<&PresenceRequirement>) -> bool {
        self.evaluate(required).is_granted()
    }

    /// Decrypt `blob` if current presence satisfies `required`
    ///
    /// The attempt is audited under `alias`. On denial the cipher is never
    /// called. On grant, cipher failures are returned unchanged.
    pub fn decrypt_if_allowed(
        &self,
        blob: &EncryptedBlob,
        alias: &str,
        required: Option<&PresenceRequirement>,
    ) -> Result<Zeroizing<Vec<u8>>, AccessError> {
        self.admit(alias, required)?;
        Ok(self.cipher.decrypt(blob, alias)?)
    }

    /// Reconstruct a master key if current presence satisfies `required`
    ///
    /// Gated and audited like [`PresenceGate::decrypt_if_allowed`]; on denial
    /// no shard is verified or combined.
    pub fn reconstruct_if_allowed<S: KeyStore + ?Sized>(
        &self,
        resource_id: &str,
        required: Option<&PresenceRequirement>,
        manager: &ShardManager<S>,
        shards: &[KeyShard],
    ) -> Result<MasterKey, AccessError> {
        self.admit(resource_id, required)?;
        Ok(manager.reconstruct_key(shards)?)
    }

    /// The most recent `limit` access attempts, newest last
    pub fn access_log(&self, limit: usize) -> Vec<AccessAttempt> {
        self.log.recent(limit)
    }

    fn admit(
        &self,
        resource_id: &str,
        required: Option<&PresenceRequirement>,
    ) -> Result<(), AccessError> {
        match self.evaluate(required) {
            PresenceDecision::Granted => {
                self.granted.fetch_add(1, Ordering::Relaxed);
                self.log.record(AccessAttempt::granted(resource_id));
                Ok(())
            }
            PresenceDecision::Denied { reason } => {
                self.denied.fetch_add(1, Ordering::Relaxed);
                warn!(resource = resource_id, reason = %reason, "access denied");
                self.log
                    .record(AccessAttempt::denied(resource_id, reason.clone()));
                Err(AccessError::PresenceDenied(reason))
            }
        }
    }
}

impl<C: ContentCipher + ?Sized> Component for PresenceGate<C> {
    fn name(&self) -> &'static str {
        "presence-gate"
    }

    fn status(&self) -> ComponentStatus {
        let age = self.current_presence().age_at(Utc::now());
        ComponentStatus {
            name: self.name().to_string(),
            healthy: !self.presence.is_poisoned(),
            stats: ComponentStats::Gate {
                granted: self.granted.load(Ordering::Relaxed),
                denied: self.denied.load(Ordering::Relaxed),
                log_entries: self.log.len(),
                presence_age_secs: age.num_seconds(),
            },
        }
    }
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::domain::{CandidateId, ScheduleId};

/// Error enumeration for token redemption.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("check-in token has expired")]
    Expired {
        candidate_id: CandidateId,
        schedule_id: ScheduleId,
    },
    #[error("check-in token was already used")]
    AlreadyConsumed {
        candidate_id: CandidateId,
        schedule_id: ScheduleId,
    },
    #[error("check-in token is not recognized")]
    Unknown,
}

/// Token handed to a candidate for QR rendering. The `token` field is the
/// opaque wire form; clients never see the bound identifiers through it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub candidate_id: CandidateId,
    pub schedule_id: ScheduleId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

struct TokenEntry {
    candidate_id: CandidateId,
    schedule_id: ScheduleId,
    expires_at: DateTime<Utc>,
    consumed: AtomicBool,
}

/// Issues and redeems short-lived, single-use check-in tokens.
///
/// Consumption is a compare-and-swap on the entry's `consumed` flag, so
/// concurrent redemption of one token yields exactly one success. Consumed
/// entries are kept until their window lapses so late retries report
/// `AlreadyConsumed` instead of `Unknown`.
pub struct QrTokenService {
    ttl: Duration,
    tokens: RwLock<HashMap<String, Arc<TokenEntry>>>,
    live: Mutex<HashMap<(CandidateId, ScheduleId), String>>,
}

impl QrTokenService {
    pub fn new(ttl_minutes: i64) -> Self {
        Self {
            ttl: Duration::minutes(ttl_minutes.max(1)),
            tokens: RwLock::new(HashMap::new()),
            live: Mutex::new(HashMap::new()),
        }
    }

    pub fn issue(&self, candidate_id: &CandidateId, schedule_id: &ScheduleId) -> IssuedToken {
        self.issue_at(candidate_id, schedule_id, Utc::now())
    }

    /// Issue a token valid for the configured window, invalidating any live
    /// token for the same (candidate, schedule) pair. The superseded nonce
    /// is removed outright and later redeems as `Unknown`.
    pub fn issue_at(
        &self,
        candidate_id: &CandidateId,
        schedule_id: &ScheduleId,
        now: DateTime<Utc>,
    ) -> IssuedToken {
        self.purge_expired(now);

        let nonce = Uuid::new_v4().to_string();
        let displaced = {
            let mut live = self.live.lock().expect("live index poisoned");
            live.insert((candidate_id.clone(), schedule_id.clone()), nonce.clone())
        };

        let entry = Arc::new(TokenEntry {
            candidate_id: candidate_id.clone(),
            schedule_id: schedule_id.clone(),
            expires_at: now + self.ttl,
            consumed: AtomicBool::new(false),
        });

        {
            let mut tokens = self.tokens.write().expect("token map poisoned");
            if let Some(prior) = displaced {
                tokens.remove(&prior);
            }
            tokens.insert(nonce.clone(), entry);
        }

        IssuedToken {
            token: nonce,
            candidate_id: candidate_id.clone(),
            schedule_id: schedule_id.clone(),
            issued_at: now,
            expires_at: now + self.ttl,
        }
    }

    pub fn validate_and_consume(&self, raw: &str) -> Result<(CandidateId, ScheduleId), TokenError> {
        self.consume_at(raw, Utc::now())
    }

    /// Atomically redeem a token. Exactly one concurrent caller wins; every
    /// other caller observes `AlreadyConsumed` (or `Expired` once the
    /// validity window has lapsed).
    pub fn consume_at(
        &self,
        raw: &str,
        now: DateTime<Utc>,
    ) -> Result<(CandidateId, ScheduleId), TokenError> {
        let entry = self
            .tokens
            .read()
            .expect("token map poisoned")
            .get(raw)
            .cloned()
            .ok_or(TokenError::Unknown)?;

        let won = entry
            .consumed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if now > entry.expires_at {
            return Err(TokenError::Expired {
                candidate_id: entry.candidate_id.clone(),
                schedule_id: entry.schedule_id.clone(),
            });
        }

        if won {
            Ok((entry.candidate_id.clone(), entry.schedule_id.clone()))
        } else {
            Err(TokenError::AlreadyConsumed {
                candidate_id: entry.candidate_id.clone(),
                schedule_id: entry.schedule_id.clone(),
            })
        }
    }

    /// Drop entries whose validity window has lapsed. Invoked on every issue;
    /// callers may also run it on a sweep.
    pub fn purge_expired(&self, now: DateTime<Utc>) {
        let expired: Vec<String> = {
            let mut tokens = self.tokens.write().expect("token map poisoned");
            let stale: Vec<String> = tokens
                .iter()
                .filter(|(_, entry)| entry.expires_at < now)
                .map(|(nonce, _)| nonce.clone())
                .collect();
            for nonce in &stale {
                tokens.remove(nonce);
            }
            stale
        };

        if !expired.is_empty() {
            let mut live = self.live.lock().expect("live index poisoned");
            live.retain(|_, nonce| !expired.contains(nonce));
        }
    }
}

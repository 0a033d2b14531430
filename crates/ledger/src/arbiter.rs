// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slot arbitration over the shared claims directory.
//!
//! Independent OS processes race to start jobs with nothing but the
//! filesystem to coordinate through, so admission uses a two-phase
//! write-then-recheck protocol:
//!
//! 1. purge stale claims, sum the live ones; reject if over budget;
//! 2. optimistically write our own claim;
//! 3. re-list everything and replay admission in a deterministic order
//!    (claim creation timestamp, then claim id); if our claim is not in
//!    the admitted set, withdraw it and report contention.
//!
//! The deterministic replay in step 3 is stricter than re-summing
//! "everyone but us": re-checks that list the same set of claim files
//! compute the same winner set and agree on which claim loses. A freshly
//! written claim can still be invisible to a competitor's listing, so
//! the recheck narrows the admission race rather than eliminating it;
//! the budget check stays conservative and contention is expected and
//! transient — callers back off a randomized delay and retry.

use crate::claims::{ClaimError, ClaimGuard, ClaimStore, MonitorClaim};
use mp_core::{Clock, ResourceBudget, SystemClock};
use std::time::Duration;
use tracing::{debug, trace};

/// Retry pacing for [`SlotArbiter::claim_with_backoff`]. The jitter keeps
/// a herd of competing processes from converging on the same retry beat.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub jitter: Duration,
    /// Give up after this long without winning a slot.
    pub max_wait: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1000),
            jitter: Duration::from_millis(500),
            max_wait: Duration::from_secs(3600),
        }
    }
}

impl BackoffPolicy {
    /// Delay before the next attempt: base plus fresh jitter.
    pub fn next_delay(&self) -> Duration {
        self.base + jittered(self.jitter)
    }
}

/// Pseudo-random duration in `[0, limit)` derived from pid and clock
/// nanos. Good enough to de-synchronize retry loops; no rand dependency.
fn jittered(limit: Duration) -> Duration {
    let limit_ms = limit.as_millis() as u64;
    if limit_ms == 0 {
        return Duration::ZERO;
    }
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    let seed = nanos ^ (u64::from(std::process::id()) << 17);
    Duration::from_millis(seed % limit_ms)
}

/// Decides whether a new job may start without exceeding the configured
/// budget, using only atomically-observable filesystem state.
#[derive(Debug, Clone)]
pub struct SlotArbiter<C: Clock = SystemClock> {
    store: ClaimStore<C>,
    budget: ResourceBudget,
    stale_timeout: Duration,
}

impl<C: Clock> SlotArbiter<C> {
    pub fn new(store: ClaimStore<C>, budget: ResourceBudget, stale_timeout: Duration) -> Self {
        Self { store, budget, stale_timeout }
    }

    pub fn store(&self) -> &ClaimStore<C> {
        &self.store
    }

    pub fn budget(&self) -> &ResourceBudget {
        &self.budget
    }

    /// One non-blocking claim attempt. `Ok(Some(guard))` means the slot
    /// is ours until the guard is released; `Ok(None)` means contention
    /// or a full budget (transient — retry later). Failing to write the
    /// claim file aborts the attempt cleanly.
    pub fn try_claim(&self, claim: &MonitorClaim) -> Result<Option<ClaimGuard>, ClaimError> {
        self.store.purge_stale(self.stale_timeout);

        // Phase 1: cheap pre-check against everyone currently live.
        let mut total = claim.request;
        for (_, other) in self.store.list() {
            total = total.plus(&other.request);
        }
        if !self.budget.admits(&total) {
            trace!(processor = %claim.processor_name, "budget full, not claiming");
            return Ok(None);
        }

        // Phase 2: write, then replay admission deterministically.
        let guard = self.store.write(claim)?;
        if self.admitted_after_recheck(claim) {
            debug!(
                processor = %claim.processor_name,
                claim = %claim.claim_id,
                "slot claimed"
            );
            Ok(Some(guard))
        } else {
            trace!(processor = %claim.processor_name, "lost claim race, withdrawing");
            guard.release();
            Ok(None)
        }
    }

    /// Replay admission over all claims (ours included) in a global
    /// deterministic order and check ours made the cut. Every competing
    /// process that re-lists the same files computes the same winner set.
    fn admitted_after_recheck(&self, ours: &MonitorClaim) -> bool {
        let mut claims: Vec<MonitorClaim> =
            self.store.list().into_iter().map(|(_, c)| c).collect();
        claims.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.claim_id.cmp(&b.claim_id))
        });

        let mut admitted_total = mp_core::ResourceUsage::default();
        for candidate in &claims {
            let with_candidate = admitted_total.plus(&candidate.request);
            if self.budget.admits(&with_candidate) {
                admitted_total = with_candidate;
                if candidate.claim_id == ours.claim_id {
                    return true;
                }
            } else if candidate.claim_id == ours.claim_id {
                return false;
            }
        }
        false
    }

    /// Blocking claim: retry with randomized backoff until a slot is won,
    /// `should_abort` reports true (e.g. the job completed elsewhere or
    /// shutdown began), or the policy's `max_wait` elapses.
    ///
    /// Returns `Ok(None)` on abort or timeout.
    pub fn claim_with_backoff(
        &self,
        claim: &MonitorClaim,
        policy: BackoffPolicy,
        mut should_abort: impl FnMut() -> bool,
    ) -> Result<Option<ClaimGuard>, ClaimError> {
        let deadline = std::time::Instant::now() + policy.max_wait;
        loop {
            if should_abort() {
                return Ok(None);
            }
            if let Some(guard) = self.try_claim(claim)? {
                return Ok(Some(guard));
            }
            if std::time::Instant::now() >= deadline {
                debug!(processor = %claim.processor_name, "gave up waiting for a slot");
                return Ok(None);
            }
            std::thread::sleep(policy.next_delay());
        }
    }
}

#[cfg(test)]
#[path = "arbiter_tests.rs"]
mod tests;

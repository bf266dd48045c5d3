//! Dirty-tracking policy compiler.
//!
//! The compiler unions the handlers' sub-policies, hands the result to the
//! controller and clears the NIB's dirty flag. Installs are either
//! synchronous (port events) or deferred through a single pending slot
//! (packet-in). A deferred install always recomputes from the NIB as it is
//! when the timer fires, so a burst of packet-ins costs one install.
//!
//! Invariant: while the NIB is clean, the last installed policy equals the
//! policy recomputed from the current NIB.

use std::time::Duration;

use nib_policy::{Controller, Policy, TransportResult};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::handler::Handler;
use crate::nib::Nib;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyState {
    /// Installed policy matches the NIB.
    Clean,
    /// A mutation has invalidated the installed policy.
    Dirty,
}

/// Single-slot deferred install.
///
/// Scheduling while an install is already pending keeps the earlier
/// deadline.
#[derive(Debug, Default)]
pub struct PendingInstall {
    deadline: Option<Instant>,
}

impl PendingInstall {
    /// Returns true if a new deadline was set.
    pub fn schedule(&mut self, now: Instant, delay: Duration) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(now + delay);
        true
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Empties the slot if its deadline has passed.
    pub fn take_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Empties the slot regardless of the deadline.
    pub fn take(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerStats {
    /// Policies handed to the controller.
    pub installs: u64,
    /// Deferred installs armed.
    pub deferred_scheduled: u64,
    /// Deferral requests absorbed by an already pending install.
    pub deferred_coalesced: u64,
    /// Deferred installs that fired with nothing left to install.
    pub deferred_skipped: u64,
}

pub struct PolicyCompiler {
    delay: Duration,
    pending: PendingInstall,
    installed: Option<Policy>,
    stats: CompilerStats,
}

impl PolicyCompiler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: PendingInstall::default(),
            installed: None,
            stats: CompilerStats::default(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Union of every handler's policy, in registration order.
    pub fn compile(handlers: &[Box<dyn Handler>], nib: &Nib) -> Policy {
        Policy::union(handlers.iter().map(|h| h.policy(nib)))
    }

    pub fn state(nib: &Nib) -> PolicyState {
        if nib.is_dirty() {
            PolicyState::Dirty
        } else {
            PolicyState::Clean
        }
    }

    /// Recomputes the policy, installs it and marks the NIB clean.
    ///
    /// On a failed install the NIB stays dirty and the error propagates.
    pub fn update_and_clear_dirty(
        &mut self,
        handlers: &[Box<dyn Handler>],
        nib: &mut Nib,
        controller: &mut dyn Controller,
    ) -> TransportResult<()> {
        let policy = Self::compile(handlers, nib);
        controller.update(&policy)?;
        nib.clear_dirty();

        self.stats.installs += 1;
        info!("Installed policy with {} rules", policy.len());
        self.installed = Some(policy);
        Ok(())
    }

    /// Arms the pending install unless one is already waiting.
    pub fn defer(&mut self, now: Instant) {
        if self.pending.schedule(now, self.delay) {
            self.stats.deferred_scheduled += 1;
            debug!("Deferred policy install in {:?}", self.delay);
        } else {
            self.stats.deferred_coalesced += 1;
        }
    }

    /// Runs the pending install if it is due. Returns true if a policy was
    /// installed.
    pub fn fire_pending(
        &mut self,
        now: Instant,
        handlers: &[Box<dyn Handler>],
        nib: &mut Nib,
        controller: &mut dyn Controller,
    ) -> TransportResult<bool> {
        if !self.pending.take_if_due(now) {
            return Ok(false);
        }
        self.install_if_dirty(handlers, nib, controller)
    }

    /// Runs the pending install immediately, if any.
    pub fn flush(
        &mut self,
        handlers: &[Box<dyn Handler>],
        nib: &mut Nib,
        controller: &mut dyn Controller,
    ) -> TransportResult<bool> {
        if !self.pending.take() {
            return Ok(false);
        }
        self.install_if_dirty(handlers, nib, controller)
    }

    fn install_if_dirty(
        &mut self,
        handlers: &[Box<dyn Handler>],
        nib: &mut Nib,
        controller: &mut dyn Controller,
    ) -> TransportResult<bool> {
        // A synchronous install since scheduling already covered it
        if !nib.is_dirty() {
            self.stats.deferred_skipped += 1;
            debug!("Deferred install skipped, policy already current");
            return Ok(false);
        }
        self.update_and_clear_dirty(handlers, nib, controller)?;
        Ok(true)
    }

    pub fn pending_deadline(&self) -> Option<Instant> {
        self.pending.deadline()
    }

    /// The last policy passed to the controller.
    pub fn last_installed(&self) -> Option<&Policy> {
        self.installed.as_ref()
    }

    pub fn stats(&self) -> &CompilerStats {
        &self.stats
    }
}

//! Admission control.
//!
//! Pure decisions over snapshots of the store: whether a submission may be
//! recorded at all, whether a ready candidate may start running next to the
//! migrations already running, and where an in-order batch member stands
//! relative to its predecessors.

use shunt_core::{Migration, MigrationStatus, MigrationUuid};
use std::fmt;

/// Verdict for one ready candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admit,
    /// Stays in its current state; the reason is logged
    Blocked(String),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admit)
    }
}

fn same_table(a: &Migration, b: &Migration) -> bool {
    a.table.as_str().eq_ignore_ascii_case(b.table.as_str())
}

/// Decide whether `candidate` may run next to `running`.
///
/// Same-table migrations never run together, concurrent or not. A
/// `singleton` excludes every non-concurrent migration, in both directions.
/// Otherwise a plain migration only conflicts on its own table.
pub fn evaluate(candidate: &Migration, running: &[&Migration]) -> Admission {
    for other in running.iter().filter(|m| m.uuid != candidate.uuid) {
        if same_table(candidate, other) {
            return Admission::Blocked(format!(
                "table {} is being migrated by {}",
                candidate.table, other.uuid
            ));
        }
        if candidate.options.singleton && !other.is_concurrent() {
            return Admission::Blocked(format!(
                "singleton migration waits for {} to finish",
                other.uuid
            ));
        }
        if other.options.singleton && !candidate.is_concurrent() {
            return Admission::Blocked(format!("singleton migration {} is running", other.uuid));
        }
    }
    Admission::Admit
}

/// Check a new submission against every live migration and the members of
/// its own batch submitted before it. Rejections name the conflicting scope.
///
/// When several scopes apply, each is checked, so the most restrictive one
/// decides.
pub fn check_submission(
    candidate: &Migration,
    live: &[Migration],
    batch: &[Migration],
) -> Result<(), String> {
    let live_others: Vec<&Migration> = live
        .iter()
        .filter(|m| m.status.is_active() && m.uuid != candidate.uuid)
        .filter(|m| !batch.iter().any(|b| b.uuid == m.uuid))
        .collect();
    let pending: Vec<&Migration> = live_others.iter().copied().chain(batch.iter()).collect();

    if candidate.options.singleton {
        if let Some(other) = pending.first() {
            return Err(format!(
                "singleton migration rejected: migration {} is {}",
                other.uuid, other.status
            ));
        }
    }

    if candidate.options.singleton_table {
        if let Some(other) = pending.iter().find(|m| same_table(candidate, m)) {
            return Err(format!(
                "singleton-table migration rejected: table {} already has migration {} ({})",
                candidate.table, other.uuid, other.status
            ));
        }
    }
    if let Some(other) = pending
        .iter()
        .find(|m| m.options.singleton_table && same_table(candidate, m))
    {
        return Err(format!(
            "singleton-table conflict: table {} is reserved by migration {} ({})",
            candidate.table, other.uuid, other.status
        ));
    }

    if candidate.options.singleton_context {
        if let Some(other) = live_others.iter().find(|m| m.options.singleton_context) {
            return Err(format!(
                "singleton-context migration rejected: migration {} in context {} is {}",
                other.uuid, other.migration_context, other.status
            ));
        }
    }

    Ok(())
}

/// Where an in-order batch member stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InOrderVerdict {
    /// Not in a batch, or every predecessor completed
    Proceed,
    /// A predecessor has not reached a terminal state
    Wait(MigrationUuid),
    /// A predecessor failed or was cancelled
    BailOut {
        predecessor: MigrationUuid,
        status: MigrationStatus,
    },
}

impl InOrderVerdict {
    /// Failure message for a member bailed out by its predecessor.
    pub fn bail_out_message(&self) -> Option<String> {
        match self {
            InOrderVerdict::BailOut {
                predecessor,
                status,
            } => Some(format!(
                "in-order-completion: predecessor migration {} is {}",
                predecessor, status
            )),
            _ => None,
        }
    }
}

impl fmt::Display for InOrderVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InOrderVerdict::Proceed => f.write_str("proceed"),
            InOrderVerdict::Wait(uuid) => write!(f, "waiting for {}", uuid),
            InOrderVerdict::BailOut { predecessor, .. } => write!(f, "bail out after {}", predecessor),
        }
    }
}

/// Position of `m` within its in-order batch. `members` may contain any
/// records; only those sharing the context and the flag with a lower
/// sequence number count as predecessors.
pub fn in_order_verdict(m: &Migration, members: &[Migration]) -> InOrderVerdict {
    let Some(context) = m.in_order_batch() else {
        return InOrderVerdict::Proceed;
    };
    let mut predecessors: Vec<&Migration> = members
        .iter()
        .filter(|p| p.uuid != m.uuid && p.in_order_batch() == Some(context))
        .filter(|p| p.sequence_number < m.sequence_number)
        .collect();
    predecessors.sort_by_key(|p| p.sequence_number);

    if let Some(failed) = predecessors
        .iter()
        .find(|p| matches!(p.status, MigrationStatus::Failed | MigrationStatus::Cancelled))
    {
        return InOrderVerdict::BailOut {
            predecessor: failed.uuid.clone(),
            status: failed.status,
        };
    }
    match predecessors.iter().find(|p| p.status.is_active()) {
        Some(waiting) => InOrderVerdict::Wait(waiting.uuid.clone()),
        None => InOrderVerdict::Proceed,
    }
}

#[cfg(test)]
#[path = "admission_test.rs"]
mod tests;

//! Phase helpers shared by the engines: cancellation checkpoints, throttle
//! waits and the cut-over gate.

use crate::error::{DbError, DbResult};
use crate::traits::{CutOverGate, EngineEvent, EventSender, ExecutionControl, ThrottleOracle};
use std::time::Duration;

/// Smallest pause between throttle checks, so a zero backoff cannot spin.
const MIN_BACKOFF: Duration = Duration::from_millis(1);

/// Result of one cut-over attempt.
pub(crate) enum Attempt {
    Done,
    /// Conflicting sessions still hold the object
    Locked,
}

pub(crate) fn checkpoint(control: &ExecutionControl) -> DbResult<()> {
    if control.cancel.is_cancelled() {
        Err(DbError::Cancelled)
    } else {
        Ok(())
    }
}

/// Sleep unless cancelled first.
pub(crate) async fn pause(control: &ExecutionControl, duration: Duration) -> DbResult<()> {
    if duration.is_zero() {
        tokio::task::yield_now().await;
        return checkpoint(control);
    }
    tokio::select! {
        _ = control.cancel.cancelled() => Err(DbError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Block until the oracle lets the next chunk of work proceed. Ratio
/// changes are reported as [`EngineEvent::Throttled`].
pub(crate) async fn await_throttle(
    oracle: &dyn ThrottleOracle,
    app: &str,
    control: &ExecutionControl,
    events: &EventSender,
    backoff: Duration,
    last_ratio: &mut f64,
) -> DbResult<()> {
    loop {
        checkpoint(control)?;
        let check = oracle.check(app).await;
        if (check.ratio - *last_ratio).abs() > f64::EPSILON {
            *last_ratio = check.ratio;
            let _ = events.send(EngineEvent::Throttled {
                ratio: check.ratio,
                reason: check.reason.clone(),
            });
        }
        if !check.throttled {
            return Ok(());
        }
        log::debug!("{} throttled: {}", app, check.reason);
        pause(control, backoff.max(MIN_BACKOFF)).await?;
    }
}

/// Wait until the gate allows cut-over.
pub(crate) async fn await_gate(control: &mut ExecutionControl) -> DbResult<CutOverGate> {
    loop {
        checkpoint(control)?;
        let gate = *control.gate.borrow_and_update();
        if gate.allowed {
            return Ok(gate);
        }
        tokio::select! {
            _ = control.cancel.cancelled() => return Err(DbError::Cancelled),
            changed = control.gate.changed() => {
                if changed.is_err() {
                    return Err(DbError::Internal("cut-over gate publisher went away".to_string()));
                }
            }
        }
    }
}

/// Run cut-over attempts until one succeeds.
///
/// Each attempt waits for the gate first. A locked attempt waits out the
/// lock budget (capped at `lock_wait`), reports a timeout and starts over;
/// the migration stays running throughout.
pub(crate) async fn cut_over<F>(
    control: &mut ExecutionControl,
    events: &EventSender,
    lock_wait: Duration,
    mut attempt: F,
) -> DbResult<()>
where
    F: FnMut(&CutOverGate) -> DbResult<Attempt>,
{
    let mut attempts = 0u32;
    loop {
        let gate = await_gate(control).await?;
        attempts += 1;
        match attempt(&gate)? {
            Attempt::Done => return Ok(()),
            Attempt::Locked => {
                pause(control, gate.threshold.min(lock_wait)).await?;
                log::info!("Cut-over attempt {} timed out waiting for locks", attempts);
                let _ = events.send(EngineEvent::CutOverTimedOut { attempt: attempts });
            }
        }
    }
}

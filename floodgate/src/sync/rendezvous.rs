//! Barrier for exactly N participants with broken-state signaling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};

use super::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting,
    Released,
    Broken,
}

#[derive(Debug)]
struct GateInner {
    parties: usize,
    arrived: Mutex<usize>,
    phase: watch::Sender<Phase>,
}

/// A rendezvous point for exactly `parties` participants.
///
/// All parties arriving within the deadline are released together. The
/// first participant to miss its deadline breaks the gate for every
/// waiter; each then observes [`SyncError::TimedOut`] or
/// [`SyncError::Broken`] rather than a partial release. Arrivals after
/// release return immediately without waiting.
#[derive(Debug, Clone)]
pub struct RendezvousGate {
    inner: Arc<GateInner>,
}

impl RendezvousGate {
    /// Create a gate for exactly `parties` participants.
    pub fn new(parties: usize) -> Self {
        let (phase, _) = watch::channel(Phase::Waiting);
        Self {
            inner: Arc::new(GateInner {
                parties: parties.max(1),
                arrived: Mutex::new(0),
                phase,
            }),
        }
    }

    /// The number of participants this gate releases together.
    pub fn parties(&self) -> usize {
        self.inner.parties
    }

    /// Arrive at the gate and wait until all parties have arrived.
    pub async fn wait(&self, deadline: Duration) -> Result<(), SyncError> {
        // Resolved gates never block, whatever the arrival count.
        match *self.inner.phase.borrow() {
            Phase::Released => return Ok(()),
            Phase::Broken => return Err(SyncError::Broken),
            Phase::Waiting => {}
        }

        // Subscribe before arriving: watch retains the current value, so
        // a release between the increment and the wait is still seen.
        let mut phase_rx = self.inner.phase.subscribe();

        {
            let mut arrived = self.inner.arrived.lock().await;
            *arrived += 1;
            if *arrived >= self.inner.parties {
                self.inner.phase.send_replace(Phase::Released);
                return Ok(());
            }
        }

        let result = tokio::time::timeout(deadline, phase_rx.wait_for(|p| *p != Phase::Waiting)).await;
        match result {
            Ok(Ok(phase)) => match *phase {
                Phase::Released => Ok(()),
                _ => Err(SyncError::Broken),
            },
            Ok(Err(_)) => Err(SyncError::Broken),
            Err(_) => {
                // Break the gate for everyone still waiting, unless the
                // release won the race against our deadline.
                let broke = self.inner.phase.send_if_modified(|p| {
                    if *p == Phase::Waiting {
                        *p = Phase::Broken;
                        true
                    } else {
                        false
                    }
                });
                if broke {
                    Err(SyncError::TimedOut { waited: deadline })
                } else if *self.inner.phase.borrow() == Phase::Released {
                    Ok(())
                } else {
                    Err(SyncError::Broken)
                }
            }
        }
    }
}

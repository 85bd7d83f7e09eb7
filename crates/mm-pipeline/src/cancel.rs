//! Cancellation signal and the shared transcoder slot.
//!
//! [`EngineSlot`] owns the process-wide transcoding engine and recreates it
//! after a teardown. [`CancellationSignal`] hands each job a fresh
//! [`CancellationToken`] and, on `cancel()`, trips that token and tears the
//! engine down so any in-flight invocation is abandoned.

use std::sync::Arc;

use mm_av::{EngineFactory, TranscodeEngine};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Lifecycle of the engine held by an [`EngineSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Uninitialized,
    Ready,
    TornDown,
}

struct SlotInner {
    state: SlotState,
    engine: Option<Arc<dyn TranscodeEngine>>,
}

/// Owner of the shared transcoding engine.
pub struct EngineSlot {
    factory: Arc<dyn EngineFactory>,
    inner: Mutex<SlotInner>,
}

impl EngineSlot {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            inner: Mutex::new(SlotInner {
                state: SlotState::Uninitialized,
                engine: None,
            }),
        }
    }

    pub fn state(&self) -> SlotState {
        self.inner.lock().state
    }

    /// The ready engine, creating it first if the slot is empty or torn down.
    pub fn acquire(&self) -> mm_core::Result<Arc<dyn TranscodeEngine>> {
        let mut inner = self.inner.lock();
        if let (SlotState::Ready, Some(engine)) = (inner.state, &inner.engine) {
            if !engine.is_terminated() {
                return Ok(engine.clone());
            }
        }

        let engine = self.factory.create()?;
        tracing::debug!("Created {} engine", engine.name());
        inner.engine = Some(engine.clone());
        inner.state = SlotState::Ready;
        Ok(engine)
    }

    /// The ready engine without creating one.
    ///
    /// # Errors
    ///
    /// [`mm_core::Error::EngineUnavailable`] unless the slot is `Ready`.
    pub fn current(&self) -> mm_core::Result<Arc<dyn TranscodeEngine>> {
        let inner = self.inner.lock();
        match (inner.state, &inner.engine) {
            (SlotState::Ready, Some(engine)) => Ok(engine.clone()),
            (state, _) => Err(mm_core::Error::engine_unavailable(format!(
                "engine slot is {state:?}"
            ))),
        }
    }

    /// Terminate and discard the engine. A no-op unless `Ready`.
    pub fn teardown(&self) {
        let engine = {
            let mut inner = self.inner.lock();
            if inner.state != SlotState::Ready {
                return;
            }
            inner.state = SlotState::TornDown;
            inner.engine.take()
        };
        if let Some(engine) = engine {
            tracing::info!("Tearing down {} engine", engine.name());
            engine.terminate();
        }
    }
}

impl std::fmt::Debug for EngineSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSlot")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Job-level cancellation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    Idle,
    Running,
    Cancelling,
}

struct SignalInner {
    state: SignalState,
    token: CancellationToken,
}

/// Process-wide cancel switch shared by the job driver and its callers.
///
/// Cloning is cheap; every clone controls the same signal.
#[derive(Clone)]
pub struct CancellationSignal {
    inner: Arc<Mutex<SignalInner>>,
    slot: Arc<EngineSlot>,
}

impl CancellationSignal {
    pub fn new(slot: Arc<EngineSlot>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SignalInner {
                state: SignalState::Idle,
                token: CancellationToken::new(),
            })),
            slot,
        }
    }

    pub fn state(&self) -> SignalState {
        self.inner.lock().state
    }

    /// Whether the current job's flag is set.
    pub fn is_cancelled(&self) -> bool {
        self.inner.lock().token.is_cancelled()
    }

    /// Start a job: clear the flag and move to `Running`.
    ///
    /// The returned guard moves the signal back to `Idle` when dropped.
    pub fn begin(&self) -> RunningJob {
        let token = CancellationToken::new();
        {
            let mut inner = self.inner.lock();
            inner.token = token.clone();
            inner.state = SignalState::Running;
        }
        RunningJob {
            signal: self.clone(),
            token,
        }
    }

    /// Set the flag and tear down the shared engine. Idempotent.
    pub fn cancel(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.state == SignalState::Running {
                inner.state = SignalState::Cancelling;
            }
            inner.token.cancel();
        }
        self.slot.teardown();
    }

    fn end(&self) {
        self.inner.lock().state = SignalState::Idle;
    }
}

impl std::fmt::Debug for CancellationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationSignal")
            .field("state", &self.state())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// A job in flight. Dropping it returns the signal to `Idle`.
#[derive(Debug)]
pub struct RunningJob {
    signal: CancellationSignal,
    token: CancellationToken,
}

impl RunningJob {
    /// This job's cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// `Err(Cancelled)` if the flag is set.
    pub fn checkpoint(&self) -> mm_core::Result<()> {
        if self.token.is_cancelled() {
            return Err(mm_core::Error::Cancelled);
        }
        Ok(())
    }
}

impl Drop for RunningJob {
    fn drop(&mut self) {
        self.signal.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mm_av::MemoryEngineFactory;

    fn slot() -> (Arc<MemoryEngineFactory>, Arc<EngineSlot>) {
        let factory = Arc::new(MemoryEngineFactory::new());
        let slot = Arc::new(EngineSlot::new(factory.clone()));
        (factory, slot)
    }

    #[test]
    fn slot_lifecycle() {
        let (factory, slot) = slot();
        assert_eq!(slot.state(), SlotState::Uninitialized);
        assert!(slot.current().is_err());

        let engine = slot.acquire().unwrap();
        assert_eq!(slot.state(), SlotState::Ready);
        assert!(slot.current().is_ok());
        slot.acquire().unwrap();
        assert_eq!(factory.created_count(), 1);

        slot.teardown();
        assert_eq!(slot.state(), SlotState::TornDown);
        assert!(engine.is_terminated());
        assert!(matches!(
            slot.current(),
            Err(mm_core::Error::EngineUnavailable(_))
        ));

        slot.acquire().unwrap();
        assert_eq!(slot.state(), SlotState::Ready);
        assert_eq!(factory.created_count(), 2);
    }

    #[test]
    fn teardown_of_empty_slot_is_noop() {
        let (_, slot) = slot();
        slot.teardown();
        assert_eq!(slot.state(), SlotState::Uninitialized);
    }

    #[test]
    fn signal_state_machine() {
        let (_, slot) = slot();
        let signal = CancellationSignal::new(slot.clone());
        assert_eq!(signal.state(), SignalState::Idle);

        let engine = slot.acquire().unwrap();
        let job = signal.begin();
        assert_eq!(signal.state(), SignalState::Running);
        assert!(job.checkpoint().is_ok());

        signal.cancel();
        assert_eq!(signal.state(), SignalState::Cancelling);
        assert!(job.is_cancelled());
        assert!(engine.is_terminated());
        assert_eq!(slot.state(), SlotState::TornDown);
        assert!(job.checkpoint().unwrap_err().is_cancelled());

        drop(job);
        assert_eq!(signal.state(), SignalState::Idle);
    }

    #[test]
    fn begin_clears_a_previous_cancel() {
        let (_, slot) = slot();
        let signal = CancellationSignal::new(slot);
        signal.cancel();
        signal.cancel();
        assert!(signal.is_cancelled());
        assert_eq!(signal.state(), SignalState::Idle);

        let job = signal.begin();
        assert!(!job.is_cancelled());
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn clones_share_the_flag() {
        let (_, slot) = slot();
        let signal = CancellationSignal::new(slot);
        let job = signal.begin();
        signal.clone().cancel();
        assert!(job.is_cancelled());
    }
}

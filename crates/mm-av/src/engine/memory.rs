//! In-memory transcoding engine.
//!
//! [`MemoryEngine`] never runs a codec. It keeps its working files in a map,
//! records every invocation, and fabricates a placeholder output for each run.
//! The CLI uses it for dry runs; tests use it to observe what the
//! orchestrator asked for.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::{EngineFactory, EngineObserver, TranscodeEngine};

/// Called at the start of every [`MemoryEngine::run`] with its arguments.
pub type RunHook = Arc<dyn Fn(&[String]) + Send + Sync>;

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<String, Bytes>,
    invocations: Vec<Vec<String>>,
    written: Vec<String>,
    deleted: Vec<String>,
}

/// Recording [`TranscodeEngine`] with a map-backed working filesystem.
#[derive(Default)]
pub struct MemoryEngine {
    state: Mutex<MemoryState>,
    terminated: AtomicBool,
    failure: Option<String>,
    skip_outputs: bool,
    hook: Option<RunHook>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `run` fail with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Install a hook observed at the start of every `run`.
    pub fn with_run_hook(mut self, hook: RunHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Report success from `run` without writing the output file.
    pub fn skipping_outputs(mut self) -> Self {
        self.skip_outputs = true;
        self
    }

    /// Argument vectors of every `run`, in order.
    pub fn invocations(&self) -> Vec<Vec<String>> {
        self.state.lock().invocations.clone()
    }

    /// Every name passed to `write_file`, in order.
    pub fn written(&self) -> Vec<String> {
        self.state.lock().written.clone()
    }

    /// Every name successfully deleted, in order.
    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().deleted.clone()
    }

    /// Names currently present in the working filesystem.
    pub fn file_names(&self) -> Vec<String> {
        self.state.lock().files.keys().cloned().collect()
    }

    fn ensure_live(&self) -> mm_core::Result<()> {
        if self.terminated.load(Ordering::SeqCst) {
            return Err(mm_core::Error::engine_unavailable("memory engine was terminated"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("state", &*self.state.lock())
            .field("terminated", &self.terminated.load(Ordering::SeqCst))
            .field("failure", &self.failure)
            .field("skip_outputs", &self.skip_outputs)
            .finish_non_exhaustive()
    }
}

fn not_found(name: &str) -> mm_core::Error {
    mm_core::Error::Io {
        source: std::io::Error::new(std::io::ErrorKind::NotFound, format!("no working file {name}")),
    }
}

#[async_trait]
impl TranscodeEngine for MemoryEngine {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn write_file(&self, name: &str, data: Bytes) -> mm_core::Result<()> {
        self.ensure_live()?;
        let mut state = self.state.lock();
        state.written.push(name.to_string());
        state.files.insert(name.to_string(), data);
        Ok(())
    }

    async fn run(&self, args: &[String], observer: &dyn EngineObserver) -> mm_core::Result<()> {
        self.ensure_live()?;
        self.state.lock().invocations.push(args.to_vec());

        if let Some(hook) = &self.hook {
            hook(args);
        }
        // The hook may have torn us down.
        self.ensure_live()?;

        observer.on_log(&format!("memory engine: {}", args.join(" ")));

        if let Some(message) = &self.failure {
            observer.on_log(message);
            return Err(mm_core::Error::tool("memory", message.clone()));
        }

        observer.on_progress(0.5);

        if let Some(output) = args.last().filter(|_| !self.skip_outputs) {
            let placeholder = Bytes::from(format!("placeholder for: {}", args.join(" ")));
            self.state.lock().files.insert(output.clone(), placeholder);
        }

        observer.on_progress(1.0);
        Ok(())
    }

    async fn read_file(&self, name: &str) -> mm_core::Result<Bytes> {
        self.ensure_live()?;
        self.state
            .lock()
            .files
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(name))
    }

    async fn delete_file(&self, name: &str) -> mm_core::Result<()> {
        let mut state = self.state.lock();
        if state.files.remove(name).is_none() {
            return Err(not_found(name));
        }
        state.deleted.push(name.to_string());
        Ok(())
    }

    fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
    }

    fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

/// Factory that hands out [`MemoryEngine`]s and remembers them.
#[derive(Default)]
pub struct MemoryEngineFactory {
    created: Mutex<Vec<Arc<MemoryEngine>>>,
    failure: Option<String>,
    skip_outputs: bool,
    hook: Option<RunHook>,
}

impl MemoryEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every engine created from now on fails its runs with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Every engine created from now on carries `hook`.
    pub fn with_run_hook(mut self, hook: RunHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Every engine created from now on succeeds without writing outputs.
    pub fn skipping_outputs(mut self) -> Self {
        self.skip_outputs = true;
        self
    }

    /// The most recently created engine.
    pub fn latest(&self) -> Option<Arc<MemoryEngine>> {
        self.created.lock().last().cloned()
    }

    /// How many engines have been created.
    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }
}

impl std::fmt::Debug for MemoryEngineFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngineFactory")
            .field("created", &self.created_count())
            .finish_non_exhaustive()
    }
}

impl EngineFactory for MemoryEngineFactory {
    fn create(&self) -> mm_core::Result<Arc<dyn TranscodeEngine>> {
        let mut engine = MemoryEngine::new();
        if let Some(message) = &self.failure {
            engine = engine.failing(message.clone());
        }
        if let Some(hook) = &self.hook {
            engine = engine.with_run_hook(hook.clone());
        }
        if self.skip_outputs {
            engine = engine.skipping_outputs();
        }
        let engine = Arc::new(engine);
        self.created.lock().push(engine.clone());
        Ok(engine)
    }
}

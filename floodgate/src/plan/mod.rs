//! Named, replayable dispatch-event logs.
//!
//! A dispatch plan records each stage a single logical request passes
//! through. Plans are loaded by name from a store directory, attached to
//! the request's context, mutated in place by handler stages, and
//! discarded when the request ends. Persistence is load-only; nothing is
//! flushed back to disk.

pub mod handler;

pub use handler::{DISPATCH_PLAN_HEADER, DispatchPlanHandler};

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

/// A plan shared between the handler stages of one request.
pub type SharedPlan = Arc<Mutex<DispatchPlan>>;

/// An ordered, append-only log of dispatch events for one request.
///
/// `steps` is the plan body as read from its file; `events` is what the
/// handler stages observed, strictly in insertion order. Events are
/// never reordered or deduplicated: insertion order is the causal order
/// of dispatch stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPlan {
    name: String,
    steps: Vec<String>,
    events: Vec<String>,
}

impl DispatchPlan {
    /// Read a plan from a file.
    ///
    /// The format is plain text, one step per line; blank lines and
    /// lines starting with `#` are ignored. The event log starts empty.
    pub async fn read(name: &str, path: &Path) -> Result<Self, PlanError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| PlanError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let steps = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();

        Ok(Self {
            name: name.to_string(),
            steps,
            events: Vec::new(),
        })
    }

    /// The plan's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The steps read from the plan file.
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// The events recorded so far, in insertion order.
    pub fn events(&self) -> &[String] {
        &self.events
    }

    /// Append one event to the log.
    pub fn add_event(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }
}

/// A name-to-file mapping rooted at a configured directory.
#[derive(Debug, Clone)]
pub struct PlanStore {
    root: PathBuf,
}

impl PlanStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The path a plan name resolves to.
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Load the named plan.
    ///
    /// The name must resolve to a regular file under the root.
    pub async fn load(&self, name: &str) -> Result<DispatchPlan, PlanError> {
        let path = self.resolve(name);
        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|metadata| metadata.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(PlanError::NotFound { path });
        }
        DispatchPlan::read(name, &path).await
    }
}

/// Failures loading a dispatch plan.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The named plan does not resolve to a regular file.
    #[error("unable to find plan file: {}", .path.display())]
    NotFound {
        /// The path the name resolved to.
        path: PathBuf,
    },

    /// The plan file exists but could not be read.
    #[error("failed to read plan file {}: {source}", .path.display())]
    Io {
        /// The path being read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

//! Session context and completion controller
//!
//! Every pump direction runs on its own blocking thread and reports exactly
//! once through the session's completion channel. The controller owns the
//! receiving half and decides when the session is over.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::PumpError;

/// A pump direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Local source to transport
    Outbound,
    /// Transport to local sink
    Inbound,
    /// Secondary local source (child stderr) to transport
    ErrOutbound,
}

impl Direction {
    /// All directions in exit-status precedence order
    pub const ALL: [Direction; 3] = [
        Direction::Outbound,
        Direction::Inbound,
        Direction::ErrOutbound,
    ];

    fn index(self) -> usize {
        match self {
            Direction::Outbound => 0,
            Direction::Inbound => 1,
            Direction::ErrOutbound => 2,
        }
    }

    fn bit(self) -> u8 {
        1 << self.index()
    }

    /// Short name used in logs
    pub fn name(self) -> &'static str {
        match self {
            Direction::Outbound => "outbound",
            Direction::Inbound => "inbound",
            Direction::ErrOutbound => "err-outbound",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of directions, one bit each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectionSet(u8);

impl DirectionSet {
    /// The empty set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Set containing the given directions
    pub fn of(directions: &[Direction]) -> Self {
        directions.iter().fold(Self::empty(), |set, &d| set.with(d))
    }

    /// Copy of this set with one more direction
    pub fn with(mut self, direction: Direction) -> Self {
        self.insert(direction);
        self
    }

    /// Add a direction
    pub fn insert(&mut self, direction: Direction) {
        self.0 |= direction.bit();
    }

    /// Whether a direction is in the set
    pub fn contains(&self, direction: Direction) -> bool {
        self.0 & direction.bit() != 0
    }

    /// Whether every direction of `other` is in this set
    pub fn contains_all(&self, other: DirectionSet) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Final report of one pump direction
#[derive(Debug)]
pub struct Completion {
    pub direction: Direction,
    pub result: Result<(), PumpError>,
}

/// State shared by every worker of a session
#[derive(Debug, Clone)]
pub struct SessionContext {
    peer_eof: Arc<AtomicBool>,
    completions: mpsc::UnboundedSender<Completion>,
}

impl SessionContext {
    /// Whether the peer has signaled end of input
    pub fn peer_eof(&self) -> bool {
        self.peer_eof.load(Ordering::SeqCst)
    }

    /// Record that the peer signaled end of input
    pub fn set_peer_eof(&self) {
        self.peer_eof.store(true, Ordering::SeqCst);
    }

    /// Post the final status of a direction
    pub fn complete(&self, direction: Direction, result: Result<(), PumpError>) {
        if self.completions.send(Completion { direction, result }).is_err() {
            tracing::debug!("Controller gone, dropping {} completion", direction);
        }
    }
}

/// Posts a failure if a worker unwinds before reporting
struct CompletionGuard {
    context: SessionContext,
    direction: Direction,
    reported: bool,
}

impl CompletionGuard {
    fn report(mut self, result: Result<(), PumpError>) {
        self.reported = true;
        self.context.complete(self.direction, result);
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.reported {
            self.context.complete(self.direction, Err(PumpError::Panicked));
        }
    }
}

/// Owns the completion channel and the per-direction results
#[derive(Debug)]
pub struct SessionController {
    context: SessionContext,
    completions: mpsc::UnboundedReceiver<Completion>,
    started: DirectionSet,
    completed: DirectionSet,
    failed: bool,
    results: [Option<Result<(), PumpError>>; 3],
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionController {
    /// Create a controller with a fresh session context
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            context: SessionContext {
                peer_eof: Arc::new(AtomicBool::new(false)),
                completions: tx,
            },
            completions: rx,
            started: DirectionSet::empty(),
            completed: DirectionSet::empty(),
            failed: false,
            results: Default::default(),
        }
    }

    /// Handle to the shared session context
    pub fn context(&self) -> SessionContext {
        self.context.clone()
    }

    /// Run a direction's worker on the blocking pool.
    ///
    /// Must be called from within a tokio runtime. The worker's result is
    /// posted as that direction's completion.
    pub fn spawn<F>(&mut self, direction: Direction, work: F)
    where
        F: FnOnce(&SessionContext) -> Result<(), PumpError> + Send + 'static,
    {
        self.started.insert(direction);
        let guard = CompletionGuard {
            context: self.context.clone(),
            direction,
            reported: false,
        };
        tokio::task::spawn_blocking(move || {
            tracing::debug!("{} worker started", direction);
            let result = work(&guard.context);
            guard.report(result);
        });
    }

    /// Wait until every direction in `required` has completed.
    ///
    /// Returns early when any direction fails, or when every started
    /// direction has reported.
    pub async fn wait_for(&mut self, required: DirectionSet) -> SessionOutcome {
        while !self.is_finished(required) {
            match self.completions.recv().await {
                Some(completion) => self.record(completion),
                None => break,
            }
        }

        SessionOutcome {
            results: std::mem::take(&mut self.results),
        }
    }

    fn is_finished(&self, required: DirectionSet) -> bool {
        self.failed
            || self.completed.contains_all(required)
            || (!self.started.is_empty() && self.completed.contains_all(self.started))
    }

    fn record(&mut self, completion: Completion) {
        let Completion { direction, result } = completion;
        match &result {
            Ok(()) => tracing::debug!("{} finished", direction),
            Err(e) => {
                tracing::error!("{} failed: {}", direction, e);
                self.failed = true;
            }
        }
        self.completed.insert(direction);
        self.results[direction.index()] = Some(result);
    }
}

/// Per-direction results observed when the controller returned
#[derive(Debug, Default)]
pub struct SessionOutcome {
    results: [Option<Result<(), PumpError>>; 3],
}

impl SessionOutcome {
    /// Result of a direction, if it reported
    pub fn result(&self, direction: Direction) -> Option<&Result<(), PumpError>> {
        self.results[direction.index()].as_ref()
    }

    /// First failed direction in precedence order
    pub fn first_failure(&self) -> Option<(Direction, &PumpError)> {
        Direction::ALL.iter().find_map(|&d| match self.result(d) {
            Some(Err(e)) => Some((d, e)),
            _ => None,
        })
    }

    /// Process exit code: 1 if any direction failed, else 0
    pub fn exit_code(&self) -> i32 {
        match self.first_failure() {
            Some(_) => 1,
            None => 0,
        }
    }
}

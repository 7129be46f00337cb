//! Asset lifecycle: progress reporting and the model load state machine.
//!
//! A model load moves through `NotStarted → Loading → Loaded | Failed`. The
//! terminal states only change again through a fresh [`ModelLoad::begin`],
//! which also invalidates every progress update or completion still in
//! flight from an earlier invocation.

use futures::channel::mpsc::UnboundedSender;

use crate::{data_structures::scene_graph::Node, error::LoadError};

/// Turns byte counts into a non-decreasing fraction in `[0, 1]` and streams it.
#[derive(Debug)]
pub struct Progress {
    sender: Option<UnboundedSender<f32>>,
    last: f32,
}

impl Progress {
    pub fn new(sender: UnboundedSender<f32>) -> Self {
        Self {
            sender: Some(sender),
            last: 0.0,
        }
    }

    /// A sink that reports nothing.
    pub fn none() -> Self {
        Self {
            sender: None,
            last: 0.0,
        }
    }

    /// Report `loaded` out of `total` bytes. Unknown totals are only reported by [`Progress::finish`].
    pub fn report(&mut self, loaded: u64, total: Option<u64>) {
        match total {
            Some(total) if total > 0 => {
                self.send((loaded as f64 / total as f64) as f32);
            }
            _ => (),
        }
    }

    /// Emit the final 1.0 unless it was already reported.
    pub fn finish(&mut self) {
        self.send(1.0);
    }

    pub fn last(&self) -> f32 {
        self.last
    }

    fn send(&mut self, fraction: f32) {
        let fraction = fraction.clamp(0.0, 1.0);
        if fraction <= self.last {
            return;
        }
        self.last = fraction;
        if let Some(sender) = &self.sender {
            // The receiver going away only means nobody is listening anymore
            let _ = sender.unbounded_send(fraction);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoadState {
    NotStarted,
    Loading { fraction: f32 },
    Loaded,
    Failed,
}

/// What the caller has to do with a finished load.
#[derive(Debug)]
pub enum Outcome {
    /// Attach this subtree as the new model.
    Loaded(Node),
    /// Report this error, the model stays unset.
    Failed(LoadError),
    /// The completion belongs to an outdated or already finished invocation.
    Ignored,
}

#[derive(Debug)]
pub struct ModelLoad {
    state: LoadState,
    invocation: u64,
}

impl ModelLoad {
    pub fn new() -> Self {
        Self {
            state: LoadState::NotStarted,
            invocation: 0,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoadState::Loading { .. })
    }

    /// Start a new invocation and return its id.
    pub fn begin(&mut self) -> u64 {
        self.invocation += 1;
        self.state = LoadState::Loading { fraction: 0.0 };
        self.invocation
    }

    /// Record progress of `invocation`. Returns the new fraction if it was accepted.
    pub fn progress(&mut self, invocation: u64, fraction: f32) -> Option<f32> {
        if invocation != self.invocation {
            return None;
        }
        match &mut self.state {
            LoadState::Loading { fraction: current } => {
                let fraction = fraction.clamp(0.0, 1.0);
                if fraction < *current {
                    return None;
                }
                *current = fraction;
                Some(fraction)
            }
            LoadState::NotStarted | LoadState::Loaded | LoadState::Failed => None,
        }
    }

    /// Finish `invocation`. Only the first completion of the current invocation counts.
    pub fn complete(&mut self, invocation: u64, result: Result<Node, LoadError>) -> Outcome {
        if invocation != self.invocation || !self.is_loading() {
            return Outcome::Ignored;
        }
        match result {
            Ok(node) => {
                self.state = LoadState::Loaded;
                Outcome::Loaded(node)
            }
            Err(e) => {
                self.state = LoadState::Failed;
                Outcome::Failed(e)
            }
        }
    }
}

impl Default for ModelLoad {
    fn default() -> Self {
        Self::new()
    }
}

use super::launcher::{AttemptError, ChildSlot, TunnelLauncher};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// What a scripted attempt of the [`FakeLauncher`] does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeOutcome {
    Success,
    Exit(i32),
    SpawnFailure,
}

/// Fake tunnel client for testing
pub struct FakeLauncher {
    // Scripted outcomes, front is the next attempt. Empty means exit status 1.
    outcomes: Arc<Mutex<VecDeque<FakeOutcome>>>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue the outcome of the next unscripted attempt
    pub fn push(&self, outcome: FakeOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// Argument lists of every attempt so far
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TunnelLauncher for FakeLauncher {
    async fn run(&self, args: &[String], _slot: &ChildSlot) -> Result<(), AttemptError> {
        self.calls.lock().unwrap().push(args.to_vec());

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(FakeOutcome::Exit(1));
        match outcome {
            FakeOutcome::Success => Ok(()),
            FakeOutcome::Exit(code) => Err(AttemptError::Exited { code: Some(code) }),
            FakeOutcome::SpawnFailure => Err(AttemptError::Spawn(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "fake spawn failure",
            ))),
        }
    }
}

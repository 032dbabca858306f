//! Compensating actions for multi-step provisioning. There is no
//! transaction spanning the identity gateway and the stores, so each flow
//! registers an undo action after every step that commits and unwinds the
//! stack when a later step fails. Reaching the end disarms the stack.

use tracing::warn;

use crate::error::AppResult;

type Undo<'a> = Box<dyn FnOnce() -> AppResult<()> + 'a>;

pub struct Compensations<'a> {
    stack: Vec<(&'static str, Undo<'a>)>,
}

impl<'a> Compensations<'a> {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    /// Register the undo for a step that just committed.
    pub fn push<F>(&mut self, label: &'static str, undo: F)
    where
        F: FnOnce() -> AppResult<()> + 'a,
    {
        self.stack.push((label, Box::new(undo)));
    }

    /// The flow reached its end; committed steps stay committed.
    pub fn disarm(mut self) {
        self.stack.clear();
    }

    /// Undo the committed steps, most recent first.
    pub fn unwind(mut self) {
        self.run_remaining();
    }

    fn run_remaining(&mut self) {
        while let Some((label, undo)) = self.stack.pop() {
            match undo() {
                Ok(()) => warn!(target: "postern::access", "compensated step '{}'", label),
                Err(err) => {
                    warn!(target: "postern::access", "compensation for step '{}' failed: {}", label, err)
                }
            }
        }
    }
}

impl Default for Compensations<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// An armed stack that goes out of scope unwinds, so early `?` returns in a
/// flow cannot strand half-committed steps.
impl Drop for Compensations<'_> {
    fn drop(&mut self) {
        self.run_remaining();
    }
}

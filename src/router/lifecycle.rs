//! Install/activate state of the router and its skip-waiting flag.

use std::fmt;

/// Where the router is in its install/activate lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
  /// Constructed, nothing installed yet (also where a failed install lands)
  #[default]
  Parsed,
  Installing,
  /// Manifest cached, waiting to activate
  Installed,
  Activating,
  Activated,
}

impl fmt::Display for WorkerState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Parsed => "parsed",
      Self::Installing => "installing",
      Self::Installed => "installed",
      Self::Activating => "activating",
      Self::Activated => "activated",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Default)]
pub struct Lifecycle {
  state: WorkerState,
  skip_waiting: bool,
}

impl Lifecycle {
  pub fn new(skip_waiting: bool) -> Self {
    Self {
      state: WorkerState::Parsed,
      skip_waiting,
    }
  }

  pub fn state(&self) -> WorkerState {
    self.state
  }

  pub fn set_state(&mut self, state: WorkerState) {
    self.state = state;
  }

  /// Mark for immediate activation. Returns true if activation should happen now.
  pub fn request_skip_waiting(&mut self) -> bool {
    self.skip_waiting = true;
    self.state == WorkerState::Installed
  }

  /// Whether an installed router should activate without waiting.
  pub fn should_activate(&self) -> bool {
    self.skip_waiting && self.state == WorkerState::Installed
  }
}

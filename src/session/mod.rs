//! One simulation run at a time: the controller holds the simulator, the
//! policy and the step history; the task serializes access to it.

pub mod controller;
pub mod task;

pub use controller::SessionController;
pub use task::{SessionChannels, SessionHandle};

//! # rigswarm-dispatch
//!
//! Building blocks a patrol loop calls to move a swarm forward. Each one
//! composes individually locked Swarm Manager calls with Session
//! Controller calls; the manager lock is never held across a session
//! operation.

pub mod dispatcher;
pub mod error;

pub use dispatcher::{Assignment, Completion, Dispatcher, SpawnOutcome, Trigger};
pub use error::{DispatchError, Result};

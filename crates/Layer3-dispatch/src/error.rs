//! Dispatch errors

use rigswarm_session::SessionError;
use rigswarm_swarm::SwarmError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, DispatchError>;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Swarm(#[from] SwarmError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

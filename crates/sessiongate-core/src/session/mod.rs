pub mod registry;
pub mod state;

pub use registry::{SessionHandle, SessionRegistry};
pub use state::{ConnectionStateMachine, next_state};

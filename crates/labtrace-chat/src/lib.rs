pub mod error;
pub mod patients;
pub mod prompt;
pub mod pruner;
pub mod session_ops;
pub mod turn;
pub mod wire;

pub use error::{ChatError, Result};
pub use turn::{run_turn, ChatDeps};

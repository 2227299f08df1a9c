pub mod queue;
pub mod runner;
pub mod types;


pub use queue::*;
pub use runner::*;
pub use types::*;

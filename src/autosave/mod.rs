mod debounce;
mod status;

pub use debounce::Debouncer;
pub use status::{Attempt, SaveFailure, SaveState, StatusMachine, StatusView};

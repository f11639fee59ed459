// Library exports shared by the vouch binary and its tests

pub mod logging;
pub mod state;
pub mod version;

pub use state::{AppConfig, AppState, StateError};
pub use version::build_info;

pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod electron;
#[cfg(target_os = "macos")]
pub mod es;
pub mod events;
pub mod extract;
pub mod session;
pub mod util;

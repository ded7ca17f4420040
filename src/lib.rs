// Game core plus the pieces the binary wires together; integration tests
// drive everything through this surface.
pub mod active_game;
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod game;
pub mod progress;
pub mod progression;
pub mod runtime;
pub mod session;
pub mod stats;
pub mod store;
pub mod ui;

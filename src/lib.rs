// Library surface for the headless game core and integration tests.
// Rendering and the terminal event loop stay in the binary.
pub mod answer;
pub mod app_dirs;
pub mod config;
pub mod explosion;
pub mod game;
pub mod kanji;
pub mod mission;
pub mod round;
pub mod runtime;
pub mod sink;
pub mod stats;
pub mod timer;
pub mod trajectory;

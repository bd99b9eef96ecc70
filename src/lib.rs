// Library surface for headless/integration tests and reuse.
// The terminal loop and CLI stay in main.rs.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod drafts;
pub mod error;
pub mod exam;
pub mod fullscreen;
pub mod guard;
pub mod host;
pub mod mcq;
pub mod proctor;
pub mod report;
pub mod runtime;
pub mod session;
pub mod store;
pub mod submission;
pub mod ui;
pub mod violation;

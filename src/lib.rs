pub mod annotation;
mod app;
mod config;
pub mod detection;
pub mod error;
pub mod export;
pub mod geometry;
pub mod input;
pub mod logging;
pub mod notification;
pub mod render;
pub mod session;
pub mod state;
pub mod tags;
pub mod ui;
pub mod viewport;
pub use error::{AppError, AppResult};

/// Entrypoint used by the binary: image paths on the command line are
/// loaded at start-up.
pub fn run() -> AppResult<()> {
    logging::init();
    tracing::info!("starting uilabel");

    let config = config::load_app_config();
    let startup_paths = app::startup_paths_from_args(std::env::args_os());
    app::App::new(config, startup_paths).start()?;

    tracing::info!("uilabel exited");
    Ok(())
}

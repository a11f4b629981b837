pub mod error;
pub mod handlers;
pub mod types;

pub use types::AppState;

use actix_web::web;

/// Registers every route family on the app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    handlers::core::configure(cfg);
    handlers::students::configure(cfg);
    handlers::facilitators::configure(cfg);
    handlers::modules::configure(cfg);
    handlers::assessments::configure(cfg);
    handlers::portfolio::configure(cfg);
    handlers::reflections::configure(cfg);
    handlers::scenarios::configure(cfg);
    handlers::simulations::configure(cfg);
    handlers::trajectories::configure(cfg);
    handlers::dashboard::configure(cfg);
    handlers::generate::configure(cfg);
}

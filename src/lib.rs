//! HTTP service that turns an ingredient list into structured recipes using
//! a T5 recipe-generation model.

pub mod api;
pub mod app_state;
pub mod collector;
pub mod config;
pub mod cors;
pub mod engine;
pub mod error;
pub mod parser;
pub mod prompt;
pub mod sampling;
pub mod types;

use std::sync::Arc;

use rocket::fairing::AdHoc;
use rocket::{catchers, routes, Build, Rocket};
use tracing::{error, info};

use app_state::AppState;
use config::AppConfig;

/// Routes, catchers and CORS around an already loaded state.
pub fn build(state: Arc<AppState>) -> Rocket<Build> {
    mount(rocket::build().manage(state))
}

/// The service as launched by the binary, configured from `Rocket.toml` and
/// `ROCKET_*` environment variables.
pub fn rocket() -> Rocket<Build> {
    with_model_loader(rocket::build())
}

/// Loads the model named by `base`'s figment during ignite, then serves it.
pub fn with_model_loader(base: Rocket<Build>) -> Rocket<Build> {
    let rocket = base.attach(AdHoc::try_on_ignite("Recipe model", |rocket| async move {
        let extracted = rocket.figment().extract::<AppConfig>();
        let config = match extracted {
            Ok(config) => config,
            Err(e) => {
                error!("invalid service configuration: {e}");
                return Err(rocket);
            }
        };

        match rocket::tokio::task::spawn_blocking(move || AppState::load(config)).await {
            Ok(Ok(state)) => Ok(rocket.manage(state)),
            Ok(Err(e)) => {
                error!(error = ?e, "failed to load recipe model");
                Err(rocket)
            }
            Err(e) => {
                error!("model loading task aborted: {e}");
                Err(rocket)
            }
        }
    }));

    mount(rocket)
}

fn mount(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .attach(cors::Cors)
        .attach(AdHoc::on_liftoff("Startup log", |rocket| {
            Box::pin(async move {
                let config = rocket.config();
                info!(address = %config.address, port = config.port, "recipe service started");
            })
        }))
        .attach(AdHoc::on_shutdown("Shutdown log", |_| {
            Box::pin(async move {
                info!("recipe service shutting down");
            })
        }))
        .mount(
            "/",
            routes![api::health, api::generate_recipes, api::preflight],
        )
        .register("/", catchers![api::default_catcher])
}

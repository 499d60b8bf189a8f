#[macro_use]
extern crate rocket;

mod config;
mod context;
mod debug;
mod repository;
mod tasks;


use anyhow::{anyhow, Context as _};
use log::{error, info};
use rocket::data::{Limits, ToByteUnit};
use rocket::fairing::Fairing;
use rocket::figment::Figment;
use rocket::{Build, Rocket};
use rocket_dyn_templates::{handlebars::handlebars_helper, Template};

use config::Config;
use repository::Store;

handlebars_helper!(plural: |count: u64, word: str| {
    if count == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
});

fn templates() -> impl Fairing {
    Template::custom(|engines| {
        let handles = &mut engines.handlebars;
        handles.register_helper("plural", Box::new(plural));
    })
}

/// Routes, template engine and the injected store; everything a request needs.
fn assemble(rocket: Rocket<Build>, store: Store) -> Rocket<Build> {
    tasks::fuel(rocket).manage(store).attach(templates())
}

fn figment() -> Figment {
    let limits = Limits::default()
        .limit("form", config::FORM_LIMIT_MIB.mebibytes())
        .limit("data-form", config::FORM_LIMIT_MIB.mebibytes());

    rocket::Config::figment()
        .merge(("address", "0.0.0.0"))
        .merge(("port", config::PORT))
        .merge(("limits", limits))
}

async fn run() -> anyhow::Result<()> {
    // Creating the instance installs Rocket's logger, so build it first.
    let rocket = rocket::custom(figment());

    let config = Config::from_env().context("failed to load configuration")?;
    info!("starting in {} mode with the {} backend", config.app_env, config.backend);

    let store = repository::open(&config)
        .await
        .context("failed to open the task store")?;

    let mut rocket = assemble(rocket, store);
    if config.is_development() {
        rocket = rocket.attach(debug::RequestLogger);
    }

    let _rocket = rocket
        .manage(config)
        .launch()
        .await
        .map_err(|e| anyhow!("server stopped: {}", e))?;
    Ok(())
}

#[rocket::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

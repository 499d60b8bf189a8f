use std::fmt::Display;

use log::{debug, error};
use rocket::form::Form;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::response::Redirect;
use rocket::{Build, Rocket, State};
use rocket_dyn_templates::Template;

use crate::context::Context;
use crate::repository::Store;

pub mod models;

type Failure = Custom<String>;

#[derive(FromForm, Debug)]
struct AddTask {
    text: Option<String>,
}

fn failure(what: &str, err: impl Display) -> Failure {
    error!("{}: {}", what, err);
    Custom(Status::InternalServerError, format!("{}: {}", what, err))
}

fn parse_id(raw: &str) -> Option<i32> {
    let id = raw.parse::<i32>().ok();
    if id.is_none() {
        debug!("ignoring malformed task id {:?}", raw);
    }
    id
}

fn home() -> Redirect {
    Redirect::to(uri!(index))
}

#[get("/")]
async fn index(ctx: Context, store: &State<Store>) -> Template {
    let tasks = store.list_tasks().await.unwrap_or_else(|e| {
        error!("Error fetching tasks: {}", e);
        Vec::new()
    });
    Template::render("index", ctx.with_tasks(&tasks).value())
}

/// A body that is not a form reads as a missing `text` field.
#[post("/add", data = "<form>")]
async fn add(store: &State<Store>, form: Option<Form<AddTask>>) -> Result<Redirect, Failure> {
    let text = form.and_then(|f| f.into_inner().text);
    if let Some(text) = text.filter(|t| !t.is_empty()) {
        store
            .add_task(&text)
            .await
            .map_err(|e| failure("Error adding task", e))?;
    }
    Ok(home())
}

#[post("/done/<id>")]
async fn done(store: &State<Store>, id: &str) -> Result<Redirect, Failure> {
    if let Some(id) = parse_id(id) {
        store
            .mark_done(id)
            .await
            .map_err(|e| failure("Error marking task as done", e))?;
    }
    Ok(home())
}

#[post("/delete/<id>")]
async fn delete(store: &State<Store>, id: &str) -> Result<Redirect, Failure> {
    if let Some(id) = parse_id(id) {
        store
            .delete_task(id)
            .await
            .map_err(|e| failure("Error deleting task", e))?;
    }
    Ok(home())
}

/// Mounts the task routes. The caller manages the `Store`.
pub fn fuel(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket.mount("/", routes![index, add, done, delete])
}

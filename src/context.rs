use std::convert::Infallible;

use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::serde_json::Map;
use rocket::serde::json::{json, Value};

use crate::config::Config;
use crate::tasks::models::Task;

/// Values handed to the page template.
#[derive(Debug)]
pub struct Context {
    inner: Map<String, Value>,
}

fn to_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(x) => x,
        _ => Map::new(),
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Context {
    type Error = Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let development = req
            .rocket()
            .state::<Config>()
            .map(Config::is_development)
            .unwrap_or(false);

        Outcome::Success(Self {
            inner: to_map(json! {{
                "development": development,
            }}),
        })
    }
}

impl Context {
    pub fn add<T: Into<Value>>(&mut self, key: &str, value: T) {
        self.inner.insert(key.to_string(), value.into());
    }

    pub fn with_tasks(mut self, tasks: &[Task]) -> Self {
        let remaining = tasks.iter().filter(|t| !t.done).count();
        self.add("tasks", json!(tasks));
        self.add("total", tasks.len());
        self.add("remaining", remaining);
        self
    }

    pub fn value(self) -> Value {
        Value::Object(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> Context {
        Context { inner: Map::new() }
    }

    #[test]
    fn counts_open_tasks() {
        let tasks = vec![
            Task { id: 1, text: "a".into(), done: true },
            Task { id: 2, text: "b".into(), done: false },
            Task { id: 3, text: "c".into(), done: false },
        ];
        let value = empty().with_tasks(&tasks).value();

        assert_eq!(value["total"], 3);
        assert_eq!(value["remaining"], 2);
        assert_eq!(value["tasks"][0]["text"], "a");
        assert_eq!(value["tasks"][0]["done"], true);
    }

    #[rocket::async_test]
    async fn request_context_carries_only_template_keys() {
        use rocket::local::asynchronous::Client;

        let client = Client::untracked(rocket::build()).await.unwrap();
        let request = client.get("/somewhere");
        let ctx = match Context::from_request(request.inner()).await {
            Outcome::Success(ctx) => ctx,
            _ => panic!("context guard never fails"),
        };

        let value = ctx.value();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["development"]);
        assert_eq!(value["development"], false);
    }

    #[test]
    fn empty_list_renders_zero_counts() {
        let value = empty().with_tasks(&[]).value();
        assert_eq!(value["tasks"], json!([]));
        assert_eq!(value["remaining"], 0);
    }
}

use log::info;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Data, Request, Response};

const BODY_PEEK: usize = 512;

/// Logs every request line with the start of its body, and every response status.
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, data: &mut Data<'_>) {
        let body = data.peek(BODY_PEEK).await;
        let cont = std::str::from_utf8(body).unwrap_or("<binary body>");
        info!("req: {} {} {}", request.method(), request.uri(), cont);
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        info!("resp: {} {} -> {}", request.method(), request.uri(), response.status());
    }
}

use crate::errors::IntoErrorResponse;
use crate::server::AppContext;
use serde::Serialize;
use warp::reply::{Json, Response};
use warp::Reply;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

pub fn health() -> Json {
    warp::reply::json(&HealthBody { status: "ok" })
}

/// Legacy liveness check kept for older deployments.
pub fn ping() -> Json {
    warp::reply::json(&serde_json::json!({ "hello": "world!" }))
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub connections: usize,
    pub rooms: usize,
}

/// Live connection and room counts.
pub fn status(ctx: &AppContext) -> Response {
    let counts = ctx
        .connections()
        .len()
        .and_then(|connections| Ok((connections, ctx.rooms().len()?)));

    match counts {
        Ok((connections, rooms)) => {
            warp::reply::json(&StatusBody { connections, rooms }).into_response()
        }
        Err(err) => err.into_http_response(),
    }
}

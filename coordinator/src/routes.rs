//! HTTP/JSON surface for the scheduler interface (spec.md §6.5), matching
//! the endpoint shapes [`dd_scheduler_api::client::HttpSchedulerClient`]
//! already speaks.

use std::convert::Infallible;
use std::sync::Arc;

use hyper::{Body, Method, Request, Response, StatusCode};
use routerify::prelude::*;
use routerify::{Router, RouterService};
use serde::{Deserialize, Serialize};

use dd_scheduler_api::{AggregatorId, AggregatorLookup, ProducerStats, ScheduleMsg};

use crate::metrics;
use crate::state::Coordinator;

pub fn build(coordinator: Arc<Coordinator>) -> RouterService<Body, Infallible> {
    let router = Router::builder()
        .data(coordinator)
        .post("/producers/:id", register_producer)
        .post("/aggregators/:id", register_aggregator)
        .get("/aggregators", list_aggregators)
        .post("/schedule", publish_schedule)
        .get("/schedule/:tf_id", get_schedule)
        .post("/stats", publish_stats)
        .get("/stats", fetch_stats)
        .get("/metrics", serve_metrics)
        .any(not_found)
        .build()
        .expect("route table is statically valid");

    RouterService::new(router).expect("router has no conflicting routes")
}

fn coordinator(req: &Request<Body>) -> Arc<Coordinator> {
    req.data::<Arc<Coordinator>>()
        .expect("coordinator state is always attached")
        .clone()
}

fn path_param<T: std::str::FromStr>(req: &Request<Body>, name: &str) -> Result<T, Response<Body>> {
    req.param(name)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, &format!("invalid path parameter: {name}")))
}

async fn register_producer(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let id: u32 = match path_param(&req, "id") {
        Ok(id) => id,
        Err(resp) => return Ok(resp),
    };
    let coordinator = coordinator(&req);
    Ok(match coordinator.register_producer(id) {
        Ok(()) => {
            metrics::PRODUCER_REGISTRATIONS.inc();
            empty_ok()
        }
        Err(e) => internal_error(e),
    })
}

async fn register_aggregator(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let id: AggregatorId = match path_param(&req, "id") {
        Ok(id) => id,
        Err(resp) => return Ok(resp),
    };
    let coordinator = coordinator(&req);
    Ok(match coordinator.register_aggregator(id) {
        Ok(()) => {
            metrics::AGGREGATOR_REGISTRATIONS.inc();
            empty_ok()
        }
        Err(e) => internal_error(e),
    })
}

async fn list_aggregators(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let coordinator = coordinator(&req);
    Ok(match coordinator.available_aggregators() {
        Ok(ids) => json_ok(&ids),
        Err(e) => internal_error(e),
    })
}

async fn publish_schedule(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let coordinator = coordinator(&req);
    let body = match read_json::<ScheduleMsg>(req).await {
        Ok(msg) => msg,
        Err(resp) => return Ok(resp),
    };
    Ok(match coordinator.publish_schedule(body) {
        Ok(()) => {
            metrics::SCHEDULES_PUBLISHED.inc();
            empty_ok()
        }
        Err(e) => internal_error(e),
    })
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", content = "aggregator_id")]
enum LookupWire {
    Ok(AggregatorId),
    Retry,
    Ahead,
}

impl From<AggregatorLookup> for LookupWire {
    fn from(lookup: AggregatorLookup) -> Self {
        match lookup {
            AggregatorLookup::Ok(id) => LookupWire::Ok(id),
            AggregatorLookup::Retry => LookupWire::Retry,
            AggregatorLookup::Ahead => LookupWire::Ahead,
        }
    }
}

async fn get_schedule(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let tf_id: u64 = match path_param(&req, "tf_id") {
        Ok(id) => id,
        Err(resp) => return Ok(resp),
    };
    let coordinator = coordinator(&req);
    Ok(match coordinator.resolve(tf_id) {
        Ok(lookup) => json_ok(&LookupWire::from(lookup)),
        Err(e) => internal_error(e),
    })
}

async fn publish_stats(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let coordinator = coordinator(&req);
    let stats = match read_json::<ProducerStats>(req).await {
        Ok(stats) => stats,
        Err(resp) => return Ok(resp),
    };
    Ok(match coordinator.publish_stats(stats) {
        Ok(()) => {
            metrics::STATS_PUBLISHED.inc();
            empty_ok()
        }
        Err(e) => internal_error(e),
    })
}

async fn fetch_stats(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let coordinator = coordinator(&req);
    Ok(match coordinator.fetch_stats() {
        Ok(stats) => json_ok(&stats),
        Err(e) => internal_error(e),
    })
}

async fn serve_metrics(_req: Request<Body>) -> Result<Response<Body>, Infallible> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain; version=0.0.4")
        .body(Body::from(metrics::encode()))
        .unwrap())
}

async fn not_found(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    if req.method() == Method::OPTIONS {
        return Ok(Response::builder().status(StatusCode::NO_CONTENT).body(Body::empty()).unwrap());
    }
    Ok(json_error(StatusCode::NOT_FOUND, "no such route"))
}

async fn read_json<T: for<'de> Deserialize<'de>>(req: Request<Body>) -> Result<T, Response<Body>> {
    let bytes = hyper::body::to_bytes(req.into_body())
        .await
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, &format!("reading request body: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| json_error(StatusCode::BAD_REQUEST, &format!("malformed JSON body: {e}")))
}

fn empty_ok() -> Response<Body> {
    Response::builder().status(StatusCode::OK).body(Body::empty()).unwrap()
}

fn json_ok<T: Serialize>(value: &T) -> Response<Body> {
    let body = serde_json::to_vec(value).expect("coordinator response types always serialize");
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn json_error(status: StatusCode, message: &str) -> Response<Body> {
    #[derive(Serialize)]
    struct ErrorBody<'a> {
        error: &'a str,
    }
    let body = serde_json::to_vec(&ErrorBody { error: message }).unwrap();
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn internal_error(err: dd_scheduler_api::SchedulerError) -> Response<Body> {
    tracing::error!(error = %err, "coordinator request failed");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
}

use actix_web::{App, HttpResponse, HttpServer, Responder, get};
use serde::Serialize;

use crate::metrics::{METRICS, MetricsSnapshot};

#[derive(Serialize)]
struct ProbeResp<'a> {
    status: &'a str,
}

#[get("/k8s/readyz")]
async fn readyz() -> impl Responder {
    if METRICS.is_ready() {
        HttpResponse::Ok().json(ProbeResp { status: "ok" })
    } else {
        HttpResponse::ServiceUnavailable().json(ProbeResp { status: "starting" })
    }
}

#[get("/k8s/livez")]
async fn livez() -> impl Responder {
    HttpResponse::Ok().json(ProbeResp { status: "ok" })
}

#[get("/k8s/metrics")]
async fn metrics() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(render_metrics(&METRICS.snapshot()))
}

fn render_metrics(m: &MetricsSnapshot) -> String {
    format!(
        concat!(
            "# HELP carillon_uptime_seconds Seconds since process start\n",
            "# TYPE carillon_uptime_seconds counter\n",
            "carillon_uptime_seconds {}\n",
            "# HELP carillon_ready 1 once the gateway session is ready\n",
            "# TYPE carillon_ready gauge\n",
            "carillon_ready {}\n",
            "# HELP carillon_connected_guilds Guilds with a voice connection\n",
            "# TYPE carillon_connected_guilds gauge\n",
            "carillon_connected_guilds {}\n",
            "# HELP carillon_tracks_started_total Tracks handed to the voice sink\n",
            "# TYPE carillon_tracks_started_total counter\n",
            "carillon_tracks_started_total {}\n",
            "# HELP carillon_entries_skipped_total Queue entries dropped as unplayable\n",
            "# TYPE carillon_entries_skipped_total counter\n",
            "carillon_entries_skipped_total {}\n",
            "# HELP carillon_callback_timeouts_total Track completions not handled in time\n",
            "# TYPE carillon_callback_timeouts_total counter\n",
            "carillon_callback_timeouts_total {}\n"
        ),
        m.uptime_secs,
        if m.ready { 1 } else { 0 },
        m.connected_guilds,
        m.tracks_started,
        m.entries_skipped,
        m.callback_timeouts,
    )
}

/// Serves the probe endpoints until the server stops.
pub async fn run_http(bind: String) -> std::io::Result<()> {
    HttpServer::new(|| {
        App::new()
            .service(readyz)
            .service(livez)
            .service(metrics)
    })
    .bind(bind)?
    .workers(1)
    .run()
    .await
}

/// Runs [`run_http`] on a dedicated thread with its own actix system.
pub fn spawn_http(bind: String) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("carillon-http".into())
        .spawn(move || {
            let addr = bind.clone();
            if let Err(e) = actix_web::rt::System::new().block_on(run_http(bind)) {
                tracing::error!("Health server on {} stopped: {}", addr, e);
            }
        })
}

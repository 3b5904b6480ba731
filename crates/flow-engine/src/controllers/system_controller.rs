use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::state::AppState;

async fn health_check(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "droppedEvents": state.bus.dropped_count(),
    }))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health_check)));
}

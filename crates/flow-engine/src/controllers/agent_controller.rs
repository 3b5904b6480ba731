//! Dispatch Service HTTP surface.

use actix_web::{web, HttpResponse};
use chrono::Utc;

use flow_core::AgentRegistration;

use crate::dto::AgentView;
use crate::error::AppError;
use crate::state::AppState;

async fn register_agent(
    state: web::Data<AppState>,
    body: web::Json<AgentRegistration>,
) -> Result<HttpResponse, AppError> {
    let agent = state.dispatch.register_agent(body.into_inner()).await?;
    Ok(HttpResponse::Ok().content_type("text/plain").body(agent.id))
}

async fn list_agents(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let now = Utc::now();
    let heartbeat = state.config.agent_heartbeat_interval();
    let agents: Vec<AgentView> = state
        .dispatch
        .list_agents()
        .await?
        .into_iter()
        .map(|agent| AgentView {
            online: agent.is_online(now, heartbeat),
            agent,
        })
        .collect();
    Ok(HttpResponse::Ok().json(agents))
}

async fn poll_workflows(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let runs = state.dispatch.claim_workflow_runs(&path.into_inner()).await?;
    if runs.is_empty() {
        return Ok(HttpResponse::NoContent().finish());
    }
    Ok(HttpResponse::Ok().json(runs))
}

async fn poll_tasks(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let runs = state.dispatch.claim_task_runs(&path.into_inner()).await?;
    if runs.is_empty() {
        return Ok(HttpResponse::NoContent().finish());
    }
    Ok(HttpResponse::Ok().json(runs))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/agent").route(web::get().to(list_agents)))
        .service(web::resource("/agent/register").route(web::post().to(register_agent)))
        .service(web::resource("/agent/{id}/workflows").route(web::get().to(poll_workflows)))
        .service(web::resource("/agent/{id}/tasks").route(web::get().to(poll_tasks)));
}

use actix_web::{web, HttpResponse};

use flow_core::{RunEvent, RunOutcome};

use crate::dto::{RunListQuery, WorkflowRunRequest};
use crate::error::AppError;
use crate::state::AppState;

async fn submit(
    state: web::Data<AppState>,
    body: web::Json<WorkflowRunRequest>,
) -> Result<HttpResponse, AppError> {
    let run = body.into_inner().into_run()?;
    let run = state.callbacks.submit_workflow_run(run).await?;
    Ok(HttpResponse::Created().json(run))
}

async fn list(
    state: web::Data<AppState>,
    query: web::Query<RunListQuery>,
) -> Result<HttpResponse, AppError> {
    let filter = query.into_inner().into_filter()?;
    let runs = state.callbacks.list_workflow_runs(&filter).await?;
    Ok(HttpResponse::Ok().json(runs))
}

async fn get(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let run = state.callbacks.get_workflow_run(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(run))
}

async fn start(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let run = state.callbacks.start_workflow(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(run))
}

async fn finalize(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let run = state.callbacks.finalize_workflow(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(run))
}

async fn end(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<RunOutcome>,
) -> Result<HttpResponse, AppError> {
    let run = state
        .callbacks
        .end_workflow(&path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(run))
}

async fn cancel(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let run = state
        .callbacks
        .apply_workflow_event(&path.into_inner(), RunEvent::Cancel)
        .await?;
    Ok(HttpResponse::Ok().json(run))
}

async fn timeout(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let run = state
        .callbacks
        .apply_workflow_event(&path.into_inner(), RunEvent::Timeout)
        .await?;
    Ok(HttpResponse::Ok().json(run))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/workflowrun")
            .route(web::get().to(list))
            .route(web::post().to(submit)),
    )
    .service(web::resource("/workflowrun/{id}").route(web::get().to(get)))
    .service(web::resource("/workflowrun/{id}/start").route(web::put().to(start)))
    .service(web::resource("/workflowrun/{id}/finalize").route(web::put().to(finalize)))
    .service(web::resource("/workflowrun/{id}/end").route(web::put().to(end)))
    .service(web::resource("/workflowrun/{id}/cancel").route(web::put().to(cancel)))
    .service(web::resource("/workflowrun/{id}/timeout").route(web::put().to(timeout)));
}

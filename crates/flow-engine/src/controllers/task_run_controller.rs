use actix_web::{web, HttpResponse};

use flow_core::{RunEvent, RunOutcome};

use crate::dto::{RunListQuery, TaskRunRequest};
use crate::error::AppError;
use crate::state::AppState;

async fn submit(
    state: web::Data<AppState>,
    body: web::Json<TaskRunRequest>,
) -> Result<HttpResponse, AppError> {
    let run = body.into_inner().into_run()?;
    let run = state.callbacks.submit_task_run(run).await?;
    Ok(HttpResponse::Created().json(run))
}

async fn list(
    state: web::Data<AppState>,
    query: web::Query<RunListQuery>,
) -> Result<HttpResponse, AppError> {
    let filter = query.into_inner().into_filter()?;
    let runs = state.callbacks.list_task_runs(&filter).await?;
    Ok(HttpResponse::Ok().json(runs))
}

async fn get(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let run = state.callbacks.get_task_run(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(run))
}

async fn start(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let run = state.callbacks.start_task(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(run))
}

async fn end(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<RunOutcome>,
) -> Result<HttpResponse, AppError> {
    let run = state
        .callbacks
        .end_task(&path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(run))
}

async fn cancel(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let run = state
        .callbacks
        .apply_task_event(&path.into_inner(), RunEvent::Cancel)
        .await?;
    Ok(HttpResponse::Ok().json(run))
}

async fn timeout(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let run = state
        .callbacks
        .apply_task_event(&path.into_inner(), RunEvent::Timeout)
        .await?;
    Ok(HttpResponse::Ok().json(run))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/taskrun")
            .route(web::get().to(list))
            .route(web::post().to(submit)),
    )
    .service(web::resource("/taskrun/{id}").route(web::get().to(get)))
    .service(web::resource("/taskrun/{id}/start").route(web::put().to(start)))
    .service(web::resource("/taskrun/{id}/end").route(web::put().to(end)))
    .service(web::resource("/taskrun/{id}/cancel").route(web::put().to(cancel)))
    .service(web::resource("/taskrun/{id}/timeout").route(web::put().to(timeout)));
}

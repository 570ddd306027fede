use actix_web::{web, HttpResponse};
use serde_json::json;

use caseflow_core::{AgentError, Manager, PoolKind};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/add-queue/{test_case_id}").route(web::get().to(add_queue)))
        .service(web::resource("/clear-queue").route(web::get().to(clear_queue)))
        .service(
            web::resource("/add-schedule-queue/{test_case_id}")
                .route(web::get().to(add_schedule_queue)),
        )
        .service(
            web::resource("/clear-schedule-queue").route(web::get().to(clear_schedule_queue)),
        )
        .service(web::resource("/is-running/{test_case_id}").route(web::get().to(is_running)))
        .default_service(web::route().to(not_found));
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Welcome to the Caseflow test runner API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn add_queue(manager: web::Data<Manager>, path: web::Path<i64>) -> HttpResponse {
    enqueue(&manager, PoolKind::OnDemand, path.into_inner()).await
}

async fn add_schedule_queue(manager: web::Data<Manager>, path: web::Path<i64>) -> HttpResponse {
    enqueue(&manager, PoolKind::Scheduled, path.into_inner()).await
}

/// Acceptance only; the test outcome lands asynchronously on the persisted
/// result record.
async fn enqueue(manager: &Manager, pool: PoolKind, test_case_id: i64) -> HttpResponse {
    match manager.enqueue(pool, test_case_id).await {
        Ok(accepted) => HttpResponse::Ok().json(json!({
            "success": true,
            "accepted": accepted,
            "message": if accepted {
                format!("test case {test_case_id} queued")
            } else {
                format!("test case {test_case_id} is already queued or running")
            },
        })),
        Err(AgentError::Validation(message)) => HttpResponse::BadRequest().json(json!({
            "success": false,
            "message": message,
            "error": 400,
        })),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "success": false,
            "message": e.to_string(),
            "error": 500,
        })),
    }
}

async fn clear_queue(manager: web::Data<Manager>) -> HttpResponse {
    manager.clear(PoolKind::OnDemand).await;
    HttpResponse::Ok().json(json!({
        "success": true,
        "ok": true,
        "message": "test queue cleared",
    }))
}

async fn clear_schedule_queue(manager: web::Data<Manager>) -> HttpResponse {
    manager.clear(PoolKind::Scheduled).await;
    HttpResponse::Ok().json(json!({
        "success": true,
        "ok": true,
        "message": "schedule queue cleared",
    }))
}

async fn is_running(manager: web::Data<Manager>, path: web::Path<i64>) -> HttpResponse {
    let test_case_id = path.into_inner();
    let running = manager.is_running(PoolKind::OnDemand, test_case_id).await
        || manager.is_running(PoolKind::Scheduled, test_case_id).await;
    HttpResponse::Ok().json(json!({
        "success": true,
        "running": running,
    }))
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({
        "success": false,
        "message": "Resource not found",
        "error": 404,
    }))
}

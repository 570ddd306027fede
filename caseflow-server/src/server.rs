use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use anyhow::Result;

use caseflow_core::Manager;

use crate::routes;

/// The HTTP front door. Holds the process's single `Manager` and hands it to
/// every request as shared app data.
pub struct CaseflowServer {
    manager: Arc<Manager>,
}

impl CaseflowServer {
    pub fn new(manager: Arc<Manager>) -> Self {
        Self { manager }
    }

    pub async fn start(&self, host: &str, port: u16) -> Result<()> {
        let manager = self.manager.clone();

        tracing::info!("listening on {host}:{port}");
        HttpServer::new(move || {
            App::new()
                .wrap(Logger::default())
                .wrap(Cors::permissive())
                .app_data(web::Data::from(manager.clone()))
                .configure(routes::configure)
        })
        .bind((host, port))?
        .run()
        .await?;
        Ok(())
    }
}

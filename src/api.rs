use actix_web::{web, HttpResponse, Result as ActixResult};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

use crate::core::{JobSnapshot, JobStatus, SubmitOutcome, TokScrape};

/// Configure API routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/scrape", web::get().to(start_scrape))
        .route("/status", web::get().to(status_html))
        .route("/api/status", web::get().to(status_json))
        .route("/download/{filename}", web::get().to(download))
        .route("/health", web::get().to(health_check));
}

/// Liveness text
async fn index() -> ActixResult<HttpResponse> {
    Ok(html(HttpResponse::Ok(), "<p>Scraper server running...</p>".to_string()))
}

/// Start the scrape job unless one is running
async fn start_scrape(app: web::Data<Arc<TokScrape>>) -> ActixResult<HttpResponse> {
    match app.submit_job().await {
        SubmitOutcome::Accepted { job_id } => {
            info!("API: Scrape job {} started", job_id);
            Ok(html(HttpResponse::Ok(), "<p>Scraping task started...</p>".to_string()))
        }
        SubmitOutcome::AlreadyRunning => {
            info!("API: Scrape request rejected, job already running");
            Ok(html(HttpResponse::Conflict(), "<p>Task already running...</p>".to_string()))
        }
    }
}

/// Progress log as HTML
async fn status_html(app: web::Data<Arc<TokScrape>>) -> ActixResult<HttpResponse> {
    let snapshot = app.poll_status().await;
    Ok(html(HttpResponse::Ok(), render_status(&snapshot)))
}

/// Progress log and outcome as JSON
async fn status_json(app: web::Data<Arc<TokScrape>>) -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(app.poll_status().await))
}

/// Serve a finished export as an attachment
async fn download(app: web::Data<Arc<TokScrape>>, path: web::Path<String>) -> ActixResult<HttpResponse> {
    let file_name = path.into_inner().trim().to_string();

    if !is_safe_file_name(&file_name) {
        warn!("API: Rejected download name {:?}", file_name);
        return Ok(html(HttpResponse::BadRequest(), "<p>Invalid file name!</p>".to_string()));
    }

    let Some(file_path) = app.find_export(&file_name).await else {
        return Ok(html(HttpResponse::NotFound(), "<p>File not found!</p>".to_string()));
    };

    match tokio::fs::read(&file_path).await {
        Ok(bytes) => {
            info!("API: Serving {}", file_path.display());
            Ok(HttpResponse::Ok()
                .content_type(content_type(&file_name))
                .insert_header(("Content-Disposition", format!("attachment; filename=\"{}\"", file_name)))
                .body(bytes))
        }
        Err(e) => {
            warn!("API: Failed to read {}: {}", file_path.display(), e);
            Ok(html(HttpResponse::NotFound(), "<p>File not found!</p>".to_string()))
        }
    }
}

/// Health check endpoint
async fn health_check() -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

fn html(mut builder: actix_web::HttpResponseBuilder, body: String) -> HttpResponse {
    builder.content_type("text/html; charset=utf-8").body(body)
}

/// Escaped log lines joined with `<br>`, or a not-started notice while idle
pub fn render_status(snapshot: &JobSnapshot) -> String {
    if snapshot.status == JobStatus::Idle {
        return "<p>Scraping not started...</p>".to_string();
    }

    snapshot
        .log
        .iter()
        .map(|line| html_escape::encode_text(line).into_owned())
        .collect::<Vec<_>>()
        .join("<br>")
}

/// Plain export names only: no separators and no leading dot
pub fn is_safe_file_name(name: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").ok());

    match pattern {
        Some(pattern) => !name.starts_with('.') && pattern.is_match(name),
        None => false,
    }
}

fn content_type(file_name: &str) -> &'static str {
    if file_name.ends_with(".csv") {
        "text/csv"
    } else if file_name.ends_with(".json") {
        "application/json"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use actix_web::{test as actix_test, App};

    fn snapshot(status: JobStatus, log: &[&str]) -> JobSnapshot {
        JobSnapshot {
            job_id: Some("job-1".to_string()),
            status,
            log: log.iter().map(|l| l.to_string()).collect(),
            result: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    #[test]
    fn test_safe_file_names() {
        assert!(is_safe_file_name("sample_fashion_posts-1700000000.csv"));
        assert!(!is_safe_file_name("../secret.csv"));
        assert!(!is_safe_file_name("dir/file.csv"));
        assert!(!is_safe_file_name(".."));
        assert!(!is_safe_file_name(""));
        assert!(!is_safe_file_name("file name.csv"));
    }

    #[test]
    fn test_render_status_idle() {
        assert_eq!(render_status(&snapshot(JobStatus::Idle, &[])), "<p>Scraping not started...</p>");
    }

    #[test]
    fn test_render_status_escapes_lines() {
        let html = render_status(&snapshot(
            JobStatus::Running,
            &["[=>] Post 1", "[*] Cookies: {\"a\": \"<b>\"}"],
        ));
        assert_eq!(html, "[=&gt;] Post 1<br>[*] Cookies: {\"a\": \"&lt;b&gt;\"}");
    }

    fn app_with_export_dir(dir: &std::path::Path) -> Arc<TokScrape> {
        let mut config = AppConfig::default();
        config.export.output_directory = dir.to_path_buf();
        Arc::new(TokScrape::new(config).unwrap())
    }

    #[actix_web::test]
    async fn test_status_before_start() {
        let temp = tempfile::tempdir().unwrap();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(app_with_export_dir(temp.path())))
                .configure(configure_routes),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/status").to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body, "<p>Scraping not started...</p>");

        let req = actix_test::TestRequest::get().uri("/api/status").to_request();
        let json: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(json["status"], "idle");
    }

    #[actix_web::test]
    async fn test_download() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("sample_fashion_posts-1.csv"), "Post URL\n").unwrap();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(app_with_export_dir(temp.path())))
                .configure(configure_routes),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/download/sample_fashion_posts-1.csv").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert!(resp
            .headers()
            .get("Content-Disposition")
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .contains("attachment"));

        let req = actix_test::TestRequest::get().uri("/download/missing.csv").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
    }
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use helpdesk_api::AppStateInner;
use helpdesk_db::Database;
use helpdesk_platforms::{BaseUrls, HttpClientFactory};

/// Unset and blank both count as absent.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "helpdesk=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let host = env_opt("HELPDESK_HOST").unwrap_or_else(|| "0.0.0.0".into());
    let port: u16 = env_opt("HELPDESK_PORT")
        .unwrap_or_else(|| "3000".into())
        .parse()?;
    let api_token = env_opt("HELPDESK_API_TOKEN");
    let base_urls = BaseUrls {
        kakao: env_opt("HELPDESK_KAKAO_BASE_URL"),
        naver: env_opt("HELPDESK_NAVER_BASE_URL"),
        coupang: env_opt("HELPDESK_COUPANG_BASE_URL"),
    };

    let api = match env_opt("HELPDESK_DB_PATH") {
        Some(db_path) => {
            let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);
            let clients = Arc::new(HttpClientFactory::new(base_urls)?);
            info!("Using database at {}", db_path);
            helpdesk_api::router(AppStateInner::new(db, clients), api_token)
        }
        None => {
            warn!("HELPDESK_DB_PATH is not set; serving the demo API");
            helpdesk_api::demo_router()
        }
    };

    let app = Router::new()
        .merge(api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Helpdesk server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

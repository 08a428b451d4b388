pub mod brands;
pub mod channels;
pub mod demo;
pub mod error;
pub mod middleware;
pub mod state;
pub mod sync;
pub mod tickets;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};

pub use demo::demo_router;
pub use error::ApiError;
pub use state::{AppState, AppStateInner};

use crate::middleware::{ApiToken, require_token};

/// The `/api` surface backed by a database. With `api_token` set, every
/// route requires `Authorization: Bearer {token}`.
pub fn router(state: AppState, api_token: Option<String>) -> Router {
    let mut api = Router::new()
        .route("/tickets", get(tickets::list_tickets).post(tickets::create_ticket))
        .route("/tickets/stats", get(tickets::ticket_stats))
        .route("/tickets/status", put(tickets::update_status))
        .route("/tickets/read", put(tickets::mark_read))
        .route("/tickets/reply", post(tickets::reply))
        .route("/tickets/{id}", get(tickets::get_ticket))
        .route(
            "/channels",
            get(channels::list_channels)
                .post(channels::upsert_channel)
                .delete(channels::delete_channel),
        )
        .route("/sync", get(sync::recent_logs).post(sync::run_sync))
        .route("/brands", get(brands::list_brands).post(brands::create_brand))
        .route("/quick-replies", get(brands::list_quick_replies))
        .route("/quick-replies/{id}/use", post(brands::use_quick_reply))
        .with_state(state);

    if let Some(token) = api_token {
        api = api.layer(axum_middleware::from_fn_with_state(
            ApiToken(Arc::from(token)),
            require_token,
        ));
    }

    Router::new().nest("/api", api)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use helpdesk_db::Database;
    use helpdesk_platforms::{BaseUrls, HttpClientFactory};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn test_app(token: Option<&str>) -> (Router, Arc<Database>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let clients = Arc::new(HttpClientFactory::new(BaseUrls::default()).unwrap());
        let state = AppStateInner::new(Arc::clone(&db), clients);
        (router(state, token.map(str::to_string)), db)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn create_brand(app: &Router) -> String {
        let (status, body) = send(app, "POST", "/api/brands", Some(json!({ "name": "Acme" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        body["brand"]["id"].as_str().unwrap().to_string()
    }

    async fn create_ticket(app: &Router, brand_id: &str, subject: &str) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/tickets",
            Some(json!({
                "brand_id": brand_id,
                "channel_type": "kakao",
                "customer_name": "Kim",
                "subject": subject,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["ticket"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn reply_is_saved_when_the_channel_is_not_configured() {
        let (app, _db) = test_app(None);
        let brand_id = create_brand(&app).await;
        let ticket_id = create_ticket(&app, &brand_id, "Where is my order?").await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/tickets/reply",
            Some(json!({ "ticketId": ticket_id, "message": "Shipping today" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"]["sender_type"], "agent");
        assert_eq!(body["delivery"]["delivered"], false);
        assert!(body["delivery"]["warning"].is_string());

        let (_, body) = send(&app, "GET", &format!("/api/tickets/{ticket_id}"), None).await;
        assert_eq!(body["ticket"]["status"], "in_progress");
        assert_eq!(body["ticket"]["messages"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reply_validates_its_input() {
        let (app, _db) = test_app(None);

        let (status, _) = send(&app, "POST", "/api/tickets/reply", Some(json!({ "message": "hi" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = uuid::Uuid::new_v4();
        let (status, body) = send(
            &app,
            "POST",
            "/api/tickets/reply",
            Some(json!({ "ticketId": missing, "message": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn ticket_list_treats_all_as_no_filter() {
        let (app, _db) = test_app(None);
        let brand_id = create_brand(&app).await;
        create_ticket(&app, &brand_id, "Refund please").await;
        create_ticket(&app, &brand_id, "Size question").await;

        let (status, body) = send(&app, "GET", "/api/tickets?brandId=all&status=all", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tickets"].as_array().unwrap().len(), 2);

        let (_, body) = send(&app, "GET", "/api/tickets?search=refund", None).await;
        assert_eq!(body["tickets"].as_array().unwrap().len(), 1);

        let (status, _) = send(&app, "GET", "/api/tickets?channelType=fax", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn resolving_a_ticket_stamps_resolved_at() {
        let (app, _db) = test_app(None);
        let brand_id = create_brand(&app).await;
        let ticket_id = create_ticket(&app, &brand_id, "Broken zipper").await;

        let (status, body) = send(
            &app,
            "PUT",
            "/api/tickets/status",
            Some(json!({ "ticketId": ticket_id, "status": "resolved" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ticket"]["status"], "resolved");
        assert!(body["ticket"]["resolved_at"].is_string());

        let (_, stats) = send(&app, "GET", "/api/tickets/stats", None).await;
        assert_eq!(stats, json!({ "total": 1, "pending": 0, "inProgress": 0, "resolved": 1 }));

        let (status, _) = send(&app, "PUT", "/api/tickets/status", Some(json!({ "ticketId": ticket_id }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn mark_read_flags_the_ticket() {
        let (app, _db) = test_app(None);
        let brand_id = create_brand(&app).await;
        let ticket_id = create_ticket(&app, &brand_id, "Unread inquiry").await;

        let (status, body) = send(&app, "PUT", "/api/tickets/read", Some(json!({ "ticketId": ticket_id }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ticket"]["is_read"], true);
        assert_eq!(body["ticket"]["status"], "pending");

        let (status, _) = send(&app, "PUT", "/api/tickets/read", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = uuid::Uuid::new_v4();
        let (status, _) = send(&app, "PUT", "/api/tickets/read", Some(json!({ "ticketId": missing }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ticket_for_unknown_brand_is_rejected() {
        let (app, _db) = test_app(None);
        let (status, _) = send(
            &app,
            "POST",
            "/api/tickets",
            Some(json!({
                "brand_id": uuid::Uuid::new_v4(),
                "channel_type": "coupang",
                "subject": "Lost parcel",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn channel_configs_upsert_and_delete() {
        let (app, _db) = test_app(None);
        let brand_id = create_brand(&app).await;

        let (status, _) = send(&app, "POST", "/api/channels", Some(json!({ "channel_type": "naverpay" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "POST",
            "/api/channels",
            Some(json!({ "brand_id": brand_id, "channel_type": "naverpay", "api_key": "k" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["channel"]["id"].as_str().unwrap().to_string();

        let (_, body) = send(
            &app,
            "POST",
            "/api/channels",
            Some(json!({ "brand_id": brand_id, "channel_type": "naverpay", "api_secret": "s" })),
        )
        .await;
        assert_eq!(body["channel"]["id"], id.as_str());

        let (_, body) = send(&app, "GET", &format!("/api/channels?brandId={brand_id}"), None).await;
        assert_eq!(body["channels"].as_array().unwrap().len(), 1);

        let (status, _) = send(&app, "DELETE", "/api/channels", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "DELETE", &format!("/api/channels?id={id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));

        let (status, _) = send(&app, "DELETE", &format!("/api/channels?id={id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sync_without_channels_reports_nothing_synced() {
        let (app, _db) = test_app(None);

        let (status, body) = send(&app, "POST", "/api/sync", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["totalSynced"], 0);
        assert_eq!(body["results"], json!([]));

        let missing = uuid::Uuid::new_v4();
        let (status, _) = send(&app, "POST", &format!("/api/sync?channelId={missing}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, "GET", "/api/sync", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["logs"], json!([]));
    }

    #[tokio::test]
    async fn quick_reply_usage_is_counted() {
        let (app, db) = test_app(None);
        let reply = db.create_quick_reply(None, "Thanks", "Thank you for waiting").unwrap();

        let (status, _) = send(&app, "POST", &format!("/api/quick-replies/{}/use", reply.id), None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, "GET", "/api/quick-replies", None).await;
        assert_eq!(body["quickReplies"][0]["usage_count"], 1);

        let (status, _) = send(&app, "POST", &format!("/api/quick-replies/{}/use", uuid::Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn configured_token_guards_every_route() {
        let (app, _db) = test_app(Some("s3cret"));

        let (status, body) = send(&app, "GET", "/api/brands", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let req = Request::builder()
            .uri("/api/brands")
            .header(header::AUTHORIZATION, "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn demo_router_serves_empty_reads_and_refuses_writes() {
        let app = demo_router();

        let (status, body) = send(&app, "GET", "/api/tickets", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tickets"], json!([]));
        assert!(body["message"].is_string());

        let (_, stats) = send(&app, "GET", "/api/tickets/stats", None).await;
        assert_eq!(stats["total"], 0);

        let (status, body) = send(&app, "POST", "/api/brands", Some(json!({ "name": "Acme" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "database is not configured");
    }
}

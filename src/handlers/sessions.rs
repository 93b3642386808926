use crate::{error::AppResult, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

/// GET /api/sessions
pub async fn list_sessions(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let sessions = state.registry.summary();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "active": sessions.len(),
        "max_concurrent_sessions": state.registry.max_sessions(),
        "by_status": state.registry.status_counts(),
        "sessions": sessions
    })))
}

/// DELETE /api/sessions/{pc_id}
///
/// Ends the interview early. A summary still goes out if the candidate answered anything.
pub async fn terminate_session(state: web::Data<AppState>, path: web::Path<String>) -> AppResult<HttpResponse> {
    let pc_id = path.into_inner();
    state.signaling.terminate(&pc_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "terminating",
        "pc_id": pc_id
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_state;
    use crate::transport::SessionDescription;
    use actix_web::{http::StatusCode, test, App};
    use std::time::Duration;

    #[actix_web::test]
    async fn test_list_and_terminate() {
        let state = test_state(3);
        let answer = state
            .signaling
            .handle_offer(SessionDescription::offer("v=0\r\n"), None)
            .await
            .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .route("/api/sessions", web::get().to(list_sessions))
                .route("/api/sessions/{pc_id}", web::delete().to(terminate_session)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/sessions").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["active"], 1);
        assert_eq!(body["sessions"][0]["pc_id"], answer.pc_id.as_str());
        assert_eq!(body["sessions"][0]["status"], "connecting");

        let req = test::TestRequest::delete()
            .uri(&format!("/api/sessions/{}", answer.pc_id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        // never connected, so termination cancels and cleanup runs right away
        for _ in 0..100 {
            if state.registry.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(state.registry.is_empty());

        let req = test::TestRequest::delete()
            .uri(&format!("/api/sessions/{}", answer.pc_id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}

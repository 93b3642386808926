//! `/api/setup`: the deprecated process-wide setup channel.
//!
//! Offers that carry `request_data` don't need it; it stays for clients that post the
//! setup first and connect afterwards.

use crate::{error::AppResult, setup::SetupContext, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn post_setup(state: web::Data<AppState>, body: web::Json<SetupContext>) -> AppResult<HttpResponse> {
    let setup = body.into_inner();
    state.setup_store.record(setup.clone());

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "received": setup
    })))
}

pub async fn get_setup(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "setup": state.setup_store.current()
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_state;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_setup_roundtrip_keeps_unknown_fields() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state(2)))
                .route("/api/setup", web::post().to(post_setup))
                .route("/api/setup", web::get().to(get_setup)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/setup").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["setup"].is_null());

        let req = test::TestRequest::post()
            .uri("/api/setup")
            .set_json(json!({"jobTitle": "SRE", "company": "Acme", "salaryBand": "L5"}))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["received"]["jobTitle"], "SRE");

        let req = test::TestRequest::get().uri("/api/setup").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["setup"]["company"], "Acme");
        assert_eq!(body["setup"]["salaryBand"], "L5");
    }
}

//! `/api/offer`: SDP offer/answer exchange and trickled ICE candidates.

use crate::{
    error::{AppError, AppResult},
    setup::SetupContext,
    state::AppState,
    transport::{IceCandidate, SessionDescription},
};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

fn default_offer_type() -> String {
    "offer".to_string()
}

#[derive(Debug, Deserialize)]
pub struct OfferRequest {
    pub sdp: String,
    #[serde(rename = "type", default = "default_offer_type")]
    pub kind: String,
    /// Interview setup travelling with the offer. `null` or `{}` count as absent.
    #[serde(default)]
    pub request_data: Option<serde_json::Value>,
}

impl OfferRequest {
    fn setup(&self) -> AppResult<Option<SetupContext>> {
        match &self.request_data {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::Object(fields)) if fields.is_empty() => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|err| AppError::BadRequest(format!("invalid request_data: {}", err))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CandidatesRequest {
    pub pc_id: String,
    #[serde(default)]
    pub candidates: Vec<IceCandidate>,
}

/// POST /api/offer
pub async fn post_offer(state: web::Data<AppState>, body: web::Json<OfferRequest>) -> AppResult<HttpResponse> {
    let request = body.into_inner();
    let setup = request.setup()?;
    let offer = SessionDescription {
        sdp: request.sdp,
        kind: request.kind,
    };

    let answer = state.signaling.handle_offer(offer, setup).await?;
    Ok(HttpResponse::Ok().json(answer))
}

/// PATCH /api/offer
pub async fn patch_offer(state: web::Data<AppState>, body: web::Json<CandidatesRequest>) -> AppResult<HttpResponse> {
    let request = body.into_inner();
    state
        .signaling
        .handle_candidates(&request.pc_id, request.candidates)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_state;
    use actix_web::{http::StatusCode, test, App};

    macro_rules! offer_app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state))
                    .route("/api/offer", web::post().to(post_offer))
                    .route("/api/offer", web::patch().to(patch_offer)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_offer_returns_answer_and_registers_session() {
        let state = test_state(2);
        let app = offer_app!(state.clone());

        let req = test::TestRequest::post()
            .uri("/api/offer")
            .set_json(json!({
                "sdp": "v=0\r\n",
                "type": "offer",
                "request_data": {"jobTitle": "Backend Engineer", "focusAreas": ["technical"]}
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["type"], "answer");
        let pc_id = body["pc_id"].as_str().unwrap();
        assert!(body["sdp"].as_str().unwrap().contains(&format!("/ws/media/{}", pc_id)));

        let session = state.registry.get(pc_id).unwrap();
        assert_eq!(session.conversation.interview().pool_size(), 5);
        assert_eq!(
            state.setup_store.current().and_then(|s| s.job_title().map(str::to_string)),
            Some("Backend Engineer".to_string())
        );
    }

    #[actix_web::test]
    async fn test_candidates_for_unknown_pc_id_is_404() {
        let app = offer_app!(test_state(2));

        let req = test::TestRequest::patch()
            .uri("/api/offer")
            .set_json(json!({"pc_id": "nope", "candidates": [{"candidate": "candidate:1", "sdpMid": "0"}]}))
            .to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_candidates_accepted_for_known_pc_id() {
        let state = test_state(2);
        let app = offer_app!(state.clone());

        let req = test::TestRequest::post()
            .uri("/api/offer")
            .set_json(json!({"sdp": "v=0\r\n", "type": "offer", "request_data": null}))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let pc_id = body["pc_id"].as_str().unwrap().to_string();

        let req = test::TestRequest::patch()
            .uri("/api/offer")
            .set_json(json!({"pc_id": pc_id, "candidates": [{"candidate": "candidate:1", "sdpMLineIndex": 0}]}))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(state.connector.bridge(&pc_id).unwrap().candidate_count(), 1);
    }

    #[actix_web::test]
    async fn test_capacity_and_invalid_offers_rejected() {
        let app = offer_app!(test_state(1));

        let req = test::TestRequest::post()
            .uri("/api/offer")
            .set_json(json!({"sdp": "v=0\r\n", "type": "answer"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/offer")
            .set_json(json!({"sdp": "v=0\r\n", "request_data": {"focusAreas": "technical"}}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        for expected in [StatusCode::OK, StatusCode::SERVICE_UNAVAILABLE] {
            let req = test::TestRequest::post()
                .uri("/api/offer")
                .set_json(json!({"sdp": "v=0\r\n"}))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), expected);
        }
    }
}

//! Route-level specifications for the check-in HTTP surface, driven through
//! the router with `tower::ServiceExt::oneshot`.

mod common {
    use std::sync::{Arc, Mutex};

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, Response};
    use serde_json::Value;
    use venue_checkin::checkin::{
        checkin_router, CheckinApp, CheckinLedger, CheckinRecord, LedgerError, VenueDefinition,
        VenueId,
    };

    #[derive(Default)]
    pub(super) struct MemoryLedger {
        records: Mutex<Vec<CheckinRecord>>,
    }

    impl CheckinLedger for MemoryLedger {
        fn append(&self, record: CheckinRecord) -> Result<(), LedgerError> {
            self.records
                .lock()
                .expect("ledger mutex poisoned")
                .push(record);
            Ok(())
        }

        fn records(&self) -> Result<Vec<CheckinRecord>, LedgerError> {
            Ok(self.records.lock().expect("ledger mutex poisoned").clone())
        }
    }

    pub(super) fn build_router() -> (axum::Router, Arc<CheckinApp<MemoryLedger>>) {
        let ledger = Arc::new(MemoryLedger::default());
        let app = CheckinApp::new(10, ledger);
        app.registry
            .register(VenueDefinition {
                id: VenueId("v-1".to_string()),
                name: "Practical Bay 1".to_string(),
                venue_type: "practical".to_string(),
                capacity: 1,
            })
            .expect("venue registration succeeds");
        (checkin_router(app.clone()), app)
    }

    pub(super) fn staff_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        authorized_request(method, uri, "staff", body)
    }

    pub(super) fn candidate_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        authorized_request(method, uri, "candidate", body)
    }

    fn authorized_request(
        method: &str,
        uri: &str,
        role: &str,
        body: Option<Value>,
    ) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", "Bearer test-token")
            .header("x-auth-role", role);
        match body {
            Some(value) => builder
                .header("content-type", "application/json")
                .body(Body::from(value.to_string()))
                .expect("request builds"),
            None => builder.body(Body::empty()).expect("request builds"),
        }
    }

    pub(super) fn anonymous_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(value) => builder
                .header("content-type", "application/json")
                .body(Body::from(value.to_string()))
                .expect("request builds"),
            None => builder.body(Body::empty()).expect("request builds"),
        }
    }

    pub(super) async fn json_body(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body reads");
        serde_json::from_slice(&bytes).expect("body is json")
    }
}

mod status {
    use super::common::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn public_snapshot_redacts_occupants() {
        let (router, _app) = build_router();

        let checkin = staff_request(
            "POST",
            "/api/v1/checkin",
            Some(json!({"venue_id": "v-1", "candidate_id": "cand-a", "schedule_id": "sched-a"})),
        );
        let response = router.clone().oneshot(checkin).await.expect("dispatch");
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(anonymous_request("GET", "/api/v1/public/venues/status", None))
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload["summary"]["total_venues"], json!(1));
        assert_eq!(payload["venues"][0]["status"], json!("occupied"));
        assert!(payload["venues"][0].get("current_occupant").is_none());

        let response = router
            .clone()
            .oneshot(staff_request("GET", "/api/v1/public/venues/status", None))
            .await
            .expect("dispatch");
        let payload = json_body(response).await;
        assert_eq!(payload["venues"][0]["current_occupant"], json!("cand-a"));
    }

    #[tokio::test]
    async fn summary_waiting_matches_view_counts() {
        let (router, _app) = build_router();

        for (candidate, schedule) in [("cand-a", "sched-a"), ("cand-b", "sched-b"), ("cand-c", "sched-c")] {
            let request = staff_request(
                "POST",
                "/api/v1/checkin",
                Some(json!({
                    "venue_id": "v-1",
                    "candidate_id": candidate,
                    "schedule_id": schedule,
                })),
            );
            let response = router.clone().oneshot(request).await.expect("dispatch");
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = router
            .clone()
            .oneshot(anonymous_request("GET", "/api/v1/public/venues/status", None))
            .await
            .expect("dispatch");
        let payload = json_body(response).await;
        let total_waiting = payload["summary"]["total_waiting"].as_u64().expect("count");
        let summed: u64 = payload["venues"]
            .as_array()
            .expect("venues array")
            .iter()
            .map(|view| view["waiting_count"].as_u64().expect("count"))
            .sum();
        assert_eq!(total_waiting, 2);
        assert_eq!(total_waiting, summed);
        assert!(payload["revision"].is_u64());
        assert!(payload.get("generated_at").is_some());
    }
}

mod checkin {
    use super::common::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn token_round_trip_over_http() {
        let (router, _app) = build_router();

        let response = router
            .clone()
            .oneshot(candidate_request(
                "GET",
                "/api/v1/candidates/cand-a/qrcode?schedule_id=sched-a",
                None,
            ))
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        let token = payload["token"].as_str().expect("token string").to_string();
        assert!(payload.get("expires_at").is_some());

        let response = router
            .clone()
            .oneshot(candidate_request(
                "POST",
                "/api/v1/checkin",
                Some(json!({"venue_id": "v-1", "token": token})),
            ))
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload["success"], json!(true));
        assert_eq!(payload["new_status"], json!("occupied"));
    }

    #[tokio::test]
    async fn replayed_token_conflicts_with_stable_code() {
        let (router, app) = build_router();
        let issued = app.tokens.issue(
            &venue_checkin::checkin::CandidateId("cand-a".to_string()),
            &venue_checkin::checkin::ScheduleId("sched-a".to_string()),
        );

        let first = candidate_request(
            "POST",
            "/api/v1/checkin",
            Some(json!({"venue_id": "v-1", "token": issued.token})),
        );
        let response = router.clone().oneshot(first).await.expect("dispatch");
        assert_eq!(response.status(), StatusCode::OK);

        let replay = candidate_request(
            "POST",
            "/api/v1/checkin",
            Some(json!({"venue_id": "v-1", "token": issued.token})),
        );
        let response = router.clone().oneshot(replay).await.expect("dispatch");
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let payload = json_body(response).await;
        assert_eq!(payload["code"], json!("already_consumed"));
        assert!(payload["message"].is_string());
    }

    #[tokio::test]
    async fn manual_checkin_requires_staff() {
        let (router, _app) = build_router();

        let response = router
            .clone()
            .oneshot(anonymous_request(
                "POST",
                "/api/v1/checkin",
                Some(json!({"venue_id": "v-1", "candidate_id": "cand-a", "schedule_id": "sched-a"})),
            ))
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let payload = json_body(response).await;
        assert_eq!(payload["code"], json!("auth_required"));

        let response = router
            .clone()
            .oneshot(candidate_request(
                "POST",
                "/api/v1/checkin",
                Some(json!({"venue_id": "v-1", "candidate_id": "cand-a", "schedule_id": "sched-a"})),
            ))
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let payload = json_body(response).await;
        assert_eq!(payload["code"], json!("staff_role_required"));
    }

    #[tokio::test]
    async fn ambiguous_identity_is_a_validation_error() {
        let (router, app) = build_router();
        let issued = app.tokens.issue(
            &venue_checkin::checkin::CandidateId("cand-a".to_string()),
            &venue_checkin::checkin::ScheduleId("sched-a".to_string()),
        );

        let response = router
            .clone()
            .oneshot(staff_request(
                "POST",
                "/api/v1/checkin",
                Some(json!({
                    "venue_id": "v-1",
                    "token": issued.token,
                    "candidate_id": "cand-b",
                    "schedule_id": "sched-b",
                })),
            ))
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payload = json_body(response).await;
        assert_eq!(payload["code"], json!("validation_error"));
    }

    #[tokio::test]
    async fn unknown_venue_returns_not_found() {
        let (router, _app) = build_router();
        let response = router
            .clone()
            .oneshot(staff_request(
                "POST",
                "/api/v1/checkin",
                Some(json!({"venue_id": "v-404", "candidate_id": "cand-a", "schedule_id": "sched-a"})),
            ))
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let payload = json_body(response).await;
        assert_eq!(payload["code"], json!("venue_not_found"));
    }
}

mod queue_position {
    use super::common::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn position_reflects_queue_membership() {
        let (router, _app) = build_router();

        for (candidate, schedule) in [("cand-a", "sched-a"), ("cand-b", "sched-b")] {
            let request = staff_request(
                "POST",
                "/api/v1/checkin",
                Some(json!({
                    "venue_id": "v-1",
                    "candidate_id": candidate,
                    "schedule_id": schedule,
                })),
            );
            router.clone().oneshot(request).await.expect("dispatch");
        }

        let response = router
            .clone()
            .oneshot(candidate_request(
                "GET",
                "/api/v1/candidates/cand-b/queue-position",
                None,
            ))
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload["venue_id"], json!("v-1"));
        assert_eq!(payload["position"], json!(1));

        let response = router
            .clone()
            .oneshot(candidate_request(
                "GET",
                "/api/v1/candidates/cand-a/queue-position",
                None,
            ))
            .await
            .expect("dispatch");
        let payload = json_body(response).await;
        assert_eq!(payload["position"], json!(null));
        assert_eq!(payload["venue_id"], json!(null));
    }
}

mod administration {
    use super::common::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn venue_registration_is_staff_only() {
        let (router, _app) = build_router();
        let body = json!({
            "id": "v-2",
            "name": "Theory Room 1",
            "venue_type": "theory",
            "capacity": 1,
        });

        let response = router
            .clone()
            .oneshot(candidate_request("POST", "/api/v1/venues", Some(body.clone())))
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = router
            .clone()
            .oneshot(staff_request("POST", "/api/v1/venues", Some(body.clone())))
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = router
            .clone()
            .oneshot(staff_request("POST", "/api/v1/venues", Some(body)))
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let payload = json_body(response).await;
        assert_eq!(payload["code"], json!("venue_exists"));
    }

    #[tokio::test]
    async fn maintenance_venue_refuses_checkins_over_http() {
        let (router, _app) = build_router();

        let response = router
            .clone()
            .oneshot(staff_request(
                "PUT",
                "/api/v1/venues/v-1/status",
                Some(json!({"status": "maintenance"})),
            ))
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(staff_request(
                "POST",
                "/api/v1/checkin",
                Some(json!({"venue_id": "v-1", "candidate_id": "cand-a", "schedule_id": "sched-a"})),
            ))
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let payload = json_body(response).await;
        assert_eq!(payload["code"], json!("venue_unavailable"));
    }

    #[tokio::test]
    async fn release_promotes_over_http() {
        let (router, _app) = build_router();

        for (candidate, schedule) in [("cand-a", "sched-a"), ("cand-b", "sched-b")] {
            let request = staff_request(
                "POST",
                "/api/v1/checkin",
                Some(json!({
                    "venue_id": "v-1",
                    "candidate_id": candidate,
                    "schedule_id": schedule,
                })),
            );
            router.clone().oneshot(request).await.expect("dispatch");
        }

        let response = router
            .clone()
            .oneshot(staff_request("POST", "/api/v1/venues/v-1/release", None))
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload["success"], json!(true));
        assert_eq!(payload["new_status"], json!("occupied"));
        assert_eq!(payload["promoted_candidate"], json!("cand-b"));

        let response = router
            .clone()
            .oneshot(staff_request("POST", "/api/v1/venues/v-1/release", None))
            .await
            .expect("dispatch");
        let payload = json_body(response).await;
        assert_eq!(payload["new_status"], json!("available"));
        assert_eq!(payload["promoted_candidate"], json!(null));
    }

    #[tokio::test]
    async fn release_is_staff_only() {
        let (router, _app) = build_router();
        let response = router
            .clone()
            .oneshot(candidate_request("POST", "/api/v1/venues/v-1/release", None))
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}

// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{admin, attempts, auth, dashboard, practical, questions},
    state::AppState,
    utils::jwt::{auth_middleware, teacher_middleware},
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    let allow_origin = if allowed.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(allowed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the main application router.
///
/// * Student routes are public; students identify themselves per submission.
/// * Admin routes need a teacher JWT.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let body_limit = state.config.max_upload_bytes;

    let auth_routes = Router::new().route("/login", post(auth::login));

    let student_routes = Router::new()
        .route("/class-sets", get(questions::list_class_sets))
        .route("/assignments", get(questions::list_assignments))
        .route("/questions", get(questions::list_questions))
        .route("/questions/{id}", get(questions::get_question))
        .route("/questions/{id}/image", get(questions::question_image))
        .route("/attempts", post(attempts::submit_attempt))
        .route("/attempts/{submission_id}", get(attempts::get_attempt))
        .route(
            "/attempts/{submission_id}/drawing",
            get(attempts::attempt_drawing),
        )
        .route(
            "/practicals/resistance",
            post(practical::analyse_resistance),
        );

    let admin_routes = Router::new()
        .route(
            "/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route("/questions/generate", post(admin::generate_question))
        .route("/questions/scan", post(admin::upload_scan))
        .route(
            "/questions/{id}",
            get(admin::get_question)
                .put(admin::update_question)
                .delete(admin::delete_question),
        )
        .route("/questions/{id}/assets/{kind}", put(admin::replace_asset))
        .route("/questions/{id}/mark-scheme", get(admin::mark_scheme_image))
        .route("/attempts", get(dashboard::list_attempts))
        .route("/analytics", get(dashboard::analytics))
        // Auth first, then the role check
        .layer(middleware::from_fn(teacher_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let api = student_routes
        .nest("/auth", auth_routes)
        .nest("/admin", admin_routes);

    Router::new()
        .nest("/api", api)
        // Outermost first: trace, then CORS, then the body limit
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, utils::jwt::sign_jwt};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    const SECRET: &str = "router-test-secret";

    fn app() -> Router {
        create_router(AppState::in_memory(Config::for_tests(SECRET)))
    }

    #[tokio::test]
    async fn public_routes_need_no_token() {
        let response = app()
            .oneshot(Request::get("/api/class-sets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_routes_need_the_teacher_role() {
        let token = sign_jwt(1, "someone", "student", SECRET, 60).unwrap();
        let response = app()
            .oneshot(
                Request::get("/api/admin/analytics")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let token = sign_jwt(1, "physics", "teacher", SECRET, 60).unwrap();
        let response = app()
            .oneshot(
                Request::get("/api/admin/analytics")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn generation_without_ai_is_unavailable() {
        let token = sign_jwt(1, "physics", "teacher", SECRET, 60).unwrap();
        let response = app()
            .oneshot(
                Request::post("/api/admin/questions/generate")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"subject":"Physics","topic":"Waves","difficulty":"easy","max_marks":3}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn cors_preflight_passes_through_the_layer_stack() {
        let mut config = Config::for_tests(SECRET);
        config.cors_origins = vec!["https://panphy.example".to_string()];
        let app = create_router(AppState::in_memory(config));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/attempts")
                    .header(header::ORIGIN, "https://panphy.example")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://panphy.example"
        );
    }
}

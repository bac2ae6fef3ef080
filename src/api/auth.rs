use axum::{extract::State, routing::post, Json, Router};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::repositories;
use crate::schemas::auth::{LoginRequest, TokenResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let user = repositories::users::find_by_username(state.db(), &payload.username)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or(ApiError::Unauthorized("Incorrect username or password"))?;

    if !user.is_active {
        return Err(ApiError::Unauthorized("Incorrect username or password"));
    }

    let verified = security::verify_password(&payload.password, &user.hashed_password)
        .map_err(|e| ApiError::internal(e, "Failed to verify password"))?;

    if !verified {
        return Err(ApiError::Unauthorized("Incorrect username or password"));
    }

    let access_token = security::create_access_token(&user.id, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to issue access token"))?;

    Ok(Json(TokenResponse { access_token, token_type: "bearer" }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::test_support;

    #[tokio::test]
    async fn login_issues_usable_bearer_token() {
        let ctx = test_support::setup_test_context().await;
        test_support::insert_student(ctx.state.db(), "student01").await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "username": "student01", "password": "test-pass" })),
            ))
            .await
            .expect("login");
        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "response: {body}");
        let token = body["access_token"].as_str().expect("token").to_string();

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/v1/attempts/my-attempts",
                Some(&token),
                None,
            ))
            .await
            .expect("authenticated read");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let ctx = test_support::setup_test_context().await;
        test_support::insert_student(ctx.state.db(), "student01").await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "username": "student01", "password": "wrong" })),
            ))
            .await
            .expect("login");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/v1/attempts/my-attempts",
                None,
                None,
            ))
            .await
            .expect("unauthenticated read");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

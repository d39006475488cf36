use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

/// 認証リクエスト
#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    /// ログイン名
    pub username: String,
    /// パスワード
    pub password: String,
}

/// 認証レスポンス
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
}

/// 認証ハンドラー
///
/// POST /api/v1/auth
///
/// ユーザー名とパスワードを照合するだけで、セッションやトークンは発行しない。
/// - ユーザー不在: 404
/// - パスワード不一致: 400
///
/// # Security
/// - password はログに出力しない
pub async fn authenticate(
    State(state): State<AppState>,
    Json(request): Json<AuthRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    validate_auth_request(&request)?;

    state
        .auth_service
        .authenticate(&request.username, &request.password)
        .await?;

    Ok(Json(AuthResponse {
        message: "認証に成功しました".to_string(),
    }))
}

/// 認証リクエストのバリデーション
fn validate_auth_request(request: &AuthRequest) -> Result<(), AppError> {
    if request.username.trim().is_empty() {
        return Err(AppError::Validation("ユーザー名は必須です".to_string()));
    }
    if request.password.is_empty() {
        return Err(AppError::Validation("パスワードは必須です".to_string()));
    }
    Ok(())
}

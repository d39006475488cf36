use axum::{
    Form, Json,
    extract::{Path, State, rejection::FormRejection},
    http::{HeaderMap, header},
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

const MIN_PASSWORD_CHARS: usize = 8;

// === リセットリクエスト ===

#[derive(Debug, Deserialize)]
pub struct ResetRequestRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ResetRequestResponse {
    pub message: String,
}

/// POST /api/v1/password-reset
///
/// 登録済みメールアドレスにリセットリンクを送信する。
/// ユーザーが存在しない場合は 404
pub async fn request_password_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ResetRequestRequest>,
) -> Result<Json<ResetRequestResponse>, AppError> {
    validate_email(&request.email)?;

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok());

    state
        .password_reset_service
        .request_reset(&request.email, host)
        .await?;

    Ok(Json(ResetRequestResponse {
        message: "パスワードリセット用のリンクを送信しました".to_string(),
    }))
}

// === リセット確認 ===

/// リセット画面の状態
///
/// フロントエンドはこの値をもとに画面を描画する。
/// リンクが無効な理由（uid不正・ユーザー不在・トークン不一致）は区別しない
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct ResetConfirmPage {
    pub valid_link: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uidb64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub success: bool,
}

impl ResetConfirmPage {
    fn invalid_link() -> Self {
        Self::default()
    }

    fn form(uidb64: String, token: String) -> Self {
        Self {
            valid_link: true,
            uidb64: Some(uidb64),
            token: Some(token),
            ..Self::default()
        }
    }

    fn form_error(uidb64: String, token: String, error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::form(uidb64, token)
        }
    }

    fn completed() -> Self {
        Self {
            valid_link: true,
            success: true,
            ..Self::default()
        }
    }
}

/// 新パスワード入力フォーム
#[derive(Debug, Default, Deserialize)]
pub struct SetPasswordForm {
    pub new_password1: Option<String>,
    pub new_password2: Option<String>,
}

/// GET /api/v1/reset-password/{uidb64}/{token}
///
/// リンクが有効ならフォーム表示用の状態を返す
pub async fn show_reset_form(
    State(state): State<AppState>,
    Path((uidb64, token)): Path<(String, String)>,
) -> Result<Json<ResetConfirmPage>, AppError> {
    let user = state
        .password_reset_service
        .user_for_link(&uidb64, &token)
        .await?;

    let page = match user {
        Some(_) => ResetConfirmPage::form(uidb64, token),
        None => ResetConfirmPage::invalid_link(),
    };

    Ok(Json(page))
}

/// POST /api/v1/reset-password/{uidb64}/{token}
///
/// リンクの検証を本文より先に行う。フォームとして読めない本文は未入力扱い
///
/// # Security
/// - token, new_password1, new_password2 はログに出力しない
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Path((uidb64, token)): Path<(String, String)>,
    form: Result<Form<SetPasswordForm>, FormRejection>,
) -> Result<Json<ResetConfirmPage>, AppError> {
    let Some(user) = state
        .password_reset_service
        .user_for_link(&uidb64, &token)
        .await?
    else {
        return Ok(Json(ResetConfirmPage::invalid_link()));
    };

    let form = submitted_form(form);

    let new_password = match validate_new_passwords(&form) {
        Ok(password) => password,
        Err(message) => {
            return Ok(Json(ResetConfirmPage::form_error(uidb64, token, message)));
        }
    };

    state
        .password_reset_service
        .set_password(&user, new_password)
        .await?;

    Ok(Json(ResetConfirmPage::completed()))
}

/// 送信された本文をフォームとして取り出す
fn submitted_form(form: Result<Form<SetPasswordForm>, FormRejection>) -> SetPasswordForm {
    match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "リセットフォームの本文を読み取れません");
            SetPasswordForm::default()
        }
    }
}

/// メールアドレスのバリデーション
fn validate_email(email: &str) -> Result<(), AppError> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(AppError::Validation(
            "有効なメールアドレスを入力してください".to_string(),
        ));
    }
    Ok(())
}

/// 新パスワードのバリデーション
///
/// 成功時は設定するパスワードを返す
fn validate_new_passwords(form: &SetPasswordForm) -> Result<&str, &'static str> {
    let (Some(password1), Some(password2)) = (
        form.new_password1.as_deref().filter(|p| !p.is_empty()),
        form.new_password2.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err("両方のパスワードを入力してください");
    };

    if password1 != password2 {
        return Err("パスワードが一致しません");
    }

    if password1.chars().count() < MIN_PASSWORD_CHARS {
        return Err("パスワードは8文字以上で入力してください");
    }

    Ok(password1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{body::Body, extract::FromRequest, http::Request};
    use sqlx::postgres::PgPoolOptions;

    fn form(password1: Option<&str>, password2: Option<&str>) -> SetPasswordForm {
        SetPasswordForm {
            new_password1: password1.map(str::to_string),
            new_password2: password2.map(str::to_string),
        }
    }

    /// DB に接続しない状態（接続は遅延される）
    fn lazy_state() -> AppState {
        let config: Config = envy::from_iter([(
            "DATABASE_URL".to_string(),
            "postgres://localhost/exchange".to_string(),
        )])
        .unwrap();
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/exchange")
            .unwrap();
        AppState::new(pool, config)
    }

    /// 本文を Form として抽出した結果
    async fn extract_form(
        content_type: &str,
        body: &'static str,
    ) -> Result<Form<SetPasswordForm>, FormRejection> {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/reset-password/Nw/token")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        Form::<SetPasswordForm>::from_request(request, &()).await
    }

    #[test]
    fn test_validate_empty_email() {
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_validate_invalid_email() {
        assert!(validate_email("invalid-email").is_err());
    }

    #[test]
    fn test_validate_valid_email() {
        assert!(validate_email("test@example.com").is_ok());
    }

    #[test]
    fn test_new_passwords_missing() {
        assert_eq!(
            validate_new_passwords(&form(None, Some("password123"))),
            Err("両方のパスワードを入力してください")
        );
        assert_eq!(
            validate_new_passwords(&form(Some("password123"), Some(""))),
            Err("両方のパスワードを入力してください")
        );
    }

    #[test]
    fn test_new_passwords_mismatch() {
        assert_eq!(
            validate_new_passwords(&form(Some("password123"), Some("password124"))),
            Err("パスワードが一致しません")
        );
    }

    #[test]
    fn test_new_passwords_mismatch_checked_before_length() {
        assert_eq!(
            validate_new_passwords(&form(Some("short"), Some("other"))),
            Err("パスワードが一致しません")
        );
    }

    #[test]
    fn test_new_passwords_too_short() {
        assert_eq!(
            validate_new_passwords(&form(Some("short"), Some("short"))),
            Err("パスワードは8文字以上で入力してください")
        );
    }

    #[test]
    fn test_new_passwords_length_counts_characters() {
        // 8文字（24バイト）
        let password = "パスワードです。";
        assert_eq!(validate_new_passwords(&form(Some(password), Some(password))), Ok(password));
        // 7文字
        let password = "パスワードです";
        assert!(validate_new_passwords(&form(Some(password), Some(password))).is_err());
    }

    #[test]
    fn test_new_passwords_valid() {
        assert_eq!(
            validate_new_passwords(&form(Some("password123"), Some("password123"))),
            Ok("password123")
        );
    }

    #[test]
    fn test_invalid_link_page_serialization() {
        let json = serde_json::to_value(ResetConfirmPage::invalid_link()).unwrap();
        assert_eq!(json, serde_json::json!({ "valid_link": false }));
    }

    #[test]
    fn test_form_error_page_serialization() {
        let page = ResetConfirmPage::form_error(
            "Nw".to_string(),
            "abc".to_string(),
            "パスワードが一致しません",
        );
        let json = serde_json::to_value(page).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "valid_link": true,
                "uidb64": "Nw",
                "token": "abc",
                "error": "パスワードが一致しません",
            })
        );
    }

    #[test]
    fn test_completed_page_serialization() {
        let json = serde_json::to_value(ResetConfirmPage::completed()).unwrap();
        assert_eq!(json, serde_json::json!({ "valid_link": true, "success": true }));
    }

    #[tokio::test]
    async fn test_show_reset_form_with_undecodable_uid() {
        let response = show_reset_form(
            State(lazy_state()),
            Path(("!!!".to_string(), "a".repeat(32))),
        )
        .await
        .unwrap();
        assert_eq!(response.0, ResetConfirmPage::invalid_link());
    }

    #[tokio::test]
    async fn test_submitted_form_reads_urlencoded_body() {
        let form = submitted_form(
            extract_form(
                "application/x-www-form-urlencoded",
                "new_password1=password123&new_password2=password123",
            )
            .await,
        );
        assert_eq!(validate_new_passwords(&form), Ok("password123"));
    }

    #[tokio::test]
    async fn test_submitted_form_non_form_body_is_empty() {
        let extracted = extract_form("application/json", r#"{"new_password1":"x"}"#).await;
        assert!(extracted.is_err());

        let form = submitted_form(extracted);
        assert_eq!(
            validate_new_passwords(&form),
            Err("両方のパスワードを入力してください")
        );
    }

    #[tokio::test]
    async fn test_confirm_non_form_body_with_invalid_link() {
        let response = confirm_password_reset(
            State(lazy_state()),
            Path(("!!!".to_string(), "a".repeat(32))),
            extract_form("application/json", "{}").await,
        )
        .await
        .unwrap();
        assert_eq!(response.0, ResetConfirmPage::invalid_link());
    }

    #[tokio::test]
    async fn test_confirm_with_undecodable_uid_does_not_touch_password() {
        let response = confirm_password_reset(
            State(lazy_state()),
            Path(("not-a-uid".to_string(), "a".repeat(32))),
            Ok(Form(form(Some("password123"), Some("password123")))),
        )
        .await
        .unwrap();
        assert_eq!(response.0, ResetConfirmPage::invalid_link());
    }
}

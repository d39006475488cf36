use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use time::OffsetDateTime;

use crate::config::Config;
use crate::error::AppError;
use crate::models::User;
use crate::repositories::UserRepository;
use crate::services::{EmailService, auth::hash_password, reset_token};

/// リセットURLのパス部分
pub const RESET_PATH: &str = "/api/v1/reset-password";

/// パスワードリセットサービス
///
/// トークンは保存せず、リンクを開くたびに現在のユーザー情報から検証する
#[derive(Clone)]
pub struct PasswordResetService {
    user_repo: UserRepository,
    email_service: EmailService,
    config: Arc<Config>,
}

impl PasswordResetService {
    /// 新しい PasswordResetService を作成
    pub fn new(user_repo: UserRepository, email_service: EmailService, config: Arc<Config>) -> Self {
        Self {
            user_repo,
            email_service,
            config,
        }
    }

    /// パスワードリセットをリクエスト
    ///
    /// `request_host` はリクエストの Host ヘッダー（URLベース未設定時に使用）
    ///
    /// # Security
    /// - トークン・URLはログに出力しない
    pub async fn request_reset(
        &self,
        email: &str,
        request_host: Option<&str>,
    ) -> Result<(), AppError> {
        tracing::info!(email = %email, "パスワードリセットリクエスト");

        let user = self.user_repo.find_by_email(email).await?.ok_or_else(|| {
            tracing::info!(email = %email, "パスワードリセット: ユーザー不在");
            AppError::UserNotFound
        })?;

        let token = reset_token::generate(&user, OffsetDateTime::now_utc());
        let base = reset_url_base(&self.config, request_host);
        let reset_url = build_reset_url(&base, &encode_uid(user.id), &token);

        self.email_service
            .send_password_reset_email(&user.email, &reset_url)
            .await?;

        tracing::info!(user_id = %user.id, "パスワードリセットメール送信完了");

        Ok(())
    }

    /// リセットリンクに対応するユーザーを取得
    ///
    /// uid のデコード失敗・ユーザー不在・トークン不一致はすべて `None`（無効なリンク）。
    /// DB エラーのみ `Err` として返す
    pub async fn user_for_link(&self, uidb64: &str, token: &str) -> Result<Option<User>, AppError> {
        let Some(user_id) = decode_uid(uidb64) else {
            tracing::warn!("リセットリンク: uid デコード失敗");
            return Ok(None);
        };

        let Some(user) = self.user_repo.find_by_id(user_id).await? else {
            tracing::warn!(user_id = %user_id, "リセットリンク: ユーザー不在");
            return Ok(None);
        };

        if !reset_token::verify(&user, token, OffsetDateTime::now_utc()) {
            tracing::warn!(user_id = %user_id, "リセットリンク: トークン検証失敗");
            return Ok(None);
        }

        Ok(Some(user))
    }

    /// 新しいパスワードを設定
    ///
    /// # Security
    /// - 新パスワードはログに出力しない
    pub async fn set_password(&self, user: &User, new_password: &str) -> Result<(), AppError> {
        let password_hash = hash_password(new_password)?;

        self.user_repo
            .update_password(user.id, &password_hash)
            .await?;

        tracing::info!(user_id = %user.id, "パスワードリセット完了");

        Ok(())
    }
}

/// リセットURLのベースを決定
///
/// 設定値 > Host ヘッダー > サーバーの待受アドレス の順
fn reset_url_base(config: &Config, request_host: Option<&str>) -> String {
    match (&config.password_reset_url_base, request_host) {
        (Some(base), _) => base.clone(),
        (None, Some(host)) => format!("http://{}", host),
        (None, None) => format!("http://{}:{}", config.host, config.port),
    }
}

/// ユーザーIDを URL セーフな base64（パディングなし）にエンコード
pub fn encode_uid(user_id: i64) -> String {
    URL_SAFE_NO_PAD.encode(user_id.to_string())
}

/// `encode_uid` の逆変換。不正な入力は `None`
pub fn decode_uid(uidb64: &str) -> Option<i64> {
    let bytes = URL_SAFE_NO_PAD.decode(uidb64.trim_end_matches('=')).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    text.parse().ok()
}

/// リセットURLを構築
pub fn build_reset_url(base: &str, uidb64: &str, token: &str) -> String {
    format!(
        "{}{}/{}/{}",
        base.trim_end_matches('/'),
        RESET_PATH,
        uidb64,
        token
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(vars: &[(&str, &str)]) -> Config {
        let mut env = vec![(
            "DATABASE_URL".to_string(),
            "postgres://localhost/exchange".to_string(),
        )];
        env.extend(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        envy::from_iter(env).unwrap()
    }

    #[test]
    fn test_reset_url_base_prefers_config() {
        let config = config(&[("PASSWORD_RESET_URL_BASE", "https://exchange.example.com")]);
        assert_eq!(
            reset_url_base(&config, Some("api.internal:8000")),
            "https://exchange.example.com"
        );
    }

    #[test]
    fn test_reset_url_base_from_host_header() {
        let config = config(&[]);
        assert_eq!(
            reset_url_base(&config, Some("api.example.com")),
            "http://api.example.com"
        );
    }

    #[test]
    fn test_reset_url_base_fallback_to_listen_address() {
        let config = config(&[("HOST", "127.0.0.1"), ("PORT", "8080")]);
        assert_eq!(reset_url_base(&config, None), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_encode_uid() {
        assert_eq!(encode_uid(7), "Nw");
        assert_eq!(encode_uid(42), "NDI");
        assert_eq!(encode_uid(123456), "MTIzNDU2");
    }

    #[test]
    fn test_decode_uid() {
        assert_eq!(decode_uid("Nw"), Some(7));
        assert_eq!(decode_uid(&encode_uid(987654321)), Some(987654321));
    }

    #[test]
    fn test_decode_uid_accepts_padding() {
        assert_eq!(decode_uid("Nw=="), Some(7));
        assert_eq!(decode_uid("NDI="), Some(42));
    }

    #[test]
    fn test_decode_uid_invalid() {
        assert_eq!(decode_uid(""), None);
        assert_eq!(decode_uid("!!!"), None);
        // "abc" は数値ではない
        assert_eq!(decode_uid(&URL_SAFE_NO_PAD.encode("abc")), None);
        // 不正なUTF-8
        assert_eq!(decode_uid(&URL_SAFE_NO_PAD.encode([0xff, 0xfe])), None);
        // i64 を超える
        assert_eq!(decode_uid(&URL_SAFE_NO_PAD.encode("99999999999999999999")), None);
    }

    #[test]
    fn test_build_reset_url() {
        assert_eq!(
            build_reset_url("https://exchange.example.com", "Nw", "abc123"),
            "https://exchange.example.com/api/v1/reset-password/Nw/abc123"
        );
    }

    #[test]
    fn test_build_reset_url_trims_trailing_slash() {
        assert_eq!(
            build_reset_url("http://localhost:3000/", "Nw", "abc123"),
            "http://localhost:3000/api/v1/reset-password/Nw/abc123"
        );
    }
}

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::repositories::UserRepository;
use crate::services::{AuthService, EmailService, PasswordResetService};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// 認証サービス
    pub auth_service: AuthService,
    /// パスワードリセットサービス
    pub password_reset_service: PasswordResetService,
}

impl AppState {
    /// 新しい AppState を作成
    ///
    /// 設定は各サービスへ構築時に明示的に渡す
    pub fn new(db_pool: PgPool, config: Config) -> Self {
        let config = Arc::new(config);
        let user_repo = UserRepository::new(db_pool);
        let email_service = EmailService::new(config.clone());

        let auth_service = AuthService::new(user_repo.clone());
        let password_reset_service =
            PasswordResetService::new(user_repo, email_service, config);

        Self {
            auth_service,
            password_reset_service,
        }
    }
}

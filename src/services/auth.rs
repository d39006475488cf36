use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::error::AppError;
use crate::models::User;
use crate::repositories::UserRepository;

/// パスワードをargon2idでハッシュ化
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!(error = ?e, "パスワードハッシュ生成エラー");
            AppError::Internal(anyhow::anyhow!("password hash error"))
        })?;
    Ok(hash.to_string())
}

/// パスワードを保存済みハッシュと照合
///
/// PHC 形式として読めないハッシュ（旧システムの `pbkdf2_sha256$...` など）は不一致扱い。
/// 該当ユーザーはパスワードリセットで argon2 ハッシュに移行する
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = ?e, "未対応のパスワードハッシュ形式");
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// 認証サービス
#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
}

impl AuthService {
    /// 新しい AuthService を作成
    pub fn new(user_repo: UserRepository) -> Self {
        Self { user_repo }
    }

    /// ログイン名とパスワードでユーザー認証を実行
    ///
    /// セッションは発行しない（照合結果のみ返す）
    pub async fn authenticate(&self, name: &str, password: &str) -> Result<User, AppError> {
        let user = self
            .user_repo
            .find_by_name(name)
            .await?
            .ok_or_else(|| {
                tracing::warn!(username = %name, "認証失敗: ユーザー不在");
                AppError::UserNotFound
            })?;

        if verify_password(password, &user.password_hash) {
            tracing::info!(user_id = %user.id, "認証成功");
            Ok(user)
        } else {
            tracing::warn!(user_id = %user.id, "認証失敗: パスワード不一致");
            Err(AppError::InvalidPassword)
        }
    }
}

use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;

const PASSWORD_RESET_SUBJECT: &str = "パスワードリセットのご案内";

/// メール送信サービス
///
/// `email` feature 有効時は lettre で送信し（SMTP 設定不足はエラー）、
/// 無効時（開発環境）はログ出力のみ
#[derive(Clone)]
pub struct EmailService {
    config: Arc<Config>,
}

impl EmailService {
    /// 新しい EmailService を作成
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// パスワードリセットメールを送信
    ///
    /// `email` feature 有効時は SMTP 設定が揃っていなければエラー
    pub async fn send_password_reset_email(
        &self,
        to: &str,
        reset_url: &str,
    ) -> Result<(), AppError> {
        let body = password_reset_body(reset_url);
        self.deliver(to, PASSWORD_RESET_SUBJECT, body).await
    }

    /// 開発モード: メール送信せずログ出力のみ
    #[cfg(not(feature = "email"))]
    async fn deliver(&self, to: &str, subject: &str, body: String) -> Result<(), AppError> {
        tracing::info!(
            to = %to,
            from = %self.config.smtp_from_address,
            subject = %subject,
            "メール送信（開発モード）"
        );
        tracing::info!("{}", body);

        Ok(())
    }

    #[cfg(feature = "email")]
    async fn deliver(&self, to: &str, subject: &str, body: String) -> Result<(), AppError> {
        use anyhow::Context;
        use lettre::message::Mailbox;
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
        use secrecy::ExposeSecret;

        let (Some(host), Some(username), Some(password)) = (
            &self.config.smtp_host,
            &self.config.smtp_username,
            &self.config.smtp_password,
        ) else {
            tracing::error!(to = %to, "SMTP 設定が不足しているためメールを送信できません");
            return Err(AppError::Internal(anyhow::anyhow!("smtp is not configured")));
        };

        let message = Message::builder()
            .from(
                self.config
                    .smtp_from_address
                    .parse::<Mailbox>()
                    .context("invalid from address")?,
            )
            .to(to.parse::<Mailbox>().context("invalid recipient address")?)
            .subject(subject)
            .body(body)
            .context("failed to build email")?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .context("failed to create smtp relay")?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                username.expose_secret().clone(),
                password.expose_secret().clone(),
            ))
            .build();

        mailer.send(message).await.map_err(|e| {
            tracing::error!(error = ?e, to = %to, "メール送信失敗");
            AppError::Internal(anyhow::anyhow!("failed to send email"))
        })?;

        tracing::info!(to = %to, "メール送信完了");

        Ok(())
    }
}

/// パスワードリセットメール本文
fn password_reset_body(reset_url: &str) -> String {
    format!("パスワードをリセットするには次のリンクを開いてください: {reset_url}")
}

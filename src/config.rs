use secrecy::SecretBox;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub database_url: SecretBox<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    // SMTP設定（オプション - email機能有効時のみ使用）
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<SecretBox<String>>,
    pub smtp_password: Option<SecretBox<String>>,
    /// 送信元アドレス（未設定時は DEFAULT_FROM_ADDRESS）
    #[serde(default = "default_smtp_from_address")]
    pub smtp_from_address: String,

    // パスワードリセット設定
    /// リセットURLのベース（例: https://exchange.example.com）
    /// 未設定時はリクエストの Host ヘッダーから組み立てる
    #[serde(default)]
    pub password_reset_url_base: Option<String>,

    // CORS設定
    /// 許可するオリジン（未設定時は全オリジンを許可）
    #[serde(default)]
    pub cors_allow_origin: Option<String>,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_FROM_ADDRESS: &str = "noreply@localhost";

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_smtp_from_address() -> String {
    DEFAULT_FROM_ADDRESS.to_string()
}

impl Config {
    pub fn load() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// SMTP送信に必要な設定が揃っているか
    pub fn smtp_configured(&self) -> bool {
        self.smtp_host.is_some() && self.smtp_username.is_some() && self.smtp_password.is_some()
    }
}

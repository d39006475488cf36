use sqlx::FromRow;

/// `users` テーブルの行
///
/// password_hash は `password` カラムを読み替えたもの（通常は argon2 PHC 文字列）
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

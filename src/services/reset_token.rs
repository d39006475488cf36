//! ステートレスなパスワードリセットトークン
//!
//! トークンは DB に保存しない。ユーザーのメールアドレス・ID・現在のパスワードハッシュと
//! 1時間単位に切り捨てた時刻から毎回計算し直す。
//!
//! - パスワードが変わると発行済みトークンはすべて無効になる
//! - 有効期間は時間バケット単位で量子化される。バケット B で発行したトークンは
//!   現在時刻のバケットが B+23 以内なら有効（発行時刻によって約23時間〜24時間）

use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::models::User;

/// 時間バケットの長さ（秒）
pub const BUCKET_SECS: i64 = 3600;

/// 検証時に遡るバケット数
pub const WINDOW_BUCKETS: i64 = 24;

/// トークン長（16進文字数）
pub const TOKEN_LEN: usize = 32;

/// 時刻を1時間境界に切り捨てたUNIX秒
pub fn time_bucket(now: OffsetDateTime) -> i64 {
    let secs = now.unix_timestamp();
    secs - secs.rem_euclid(BUCKET_SECS)
}

/// リセットトークンを生成
///
/// # Security
/// 戻り値はログに出力しないこと
pub fn generate(user: &User, now: OffsetDateTime) -> String {
    token_for_bucket(user, time_bucket(now))
}

/// 提示されたトークンを検証
///
/// 現在のバケットから1時間ずつ遡って24バケット分を再計算し、一致すれば成功。
/// 失敗理由（期限切れ・改ざん・パスワード変更済み・形式不正）は区別せず false を返す
pub fn verify(user: &User, presented: &str, now: OffsetDateTime) -> bool {
    if !is_well_formed(presented) {
        return false;
    }

    let current = time_bucket(now);
    for k in 0..WINDOW_BUCKETS {
        let Some(bucket) = current.checked_sub(k * BUCKET_SECS) else {
            return false;
        };
        if token_for_bucket(user, bucket) == presented {
            return true;
        }
    }

    false
}

fn token_for_bucket(user: &User, bucket: i64) -> String {
    let canonical = format!(
        "{}-{}-{}-{}",
        user.email, user.id, user.password_hash, bucket
    );

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let mut digest = format!("{:x}", hasher.finalize());
    digest.truncate(TOKEN_LEN);
    digest
}

fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN && token.bytes().all(|b| b.is_ascii_hexdigit())
}

//! Communicator Identity
//!
//! エディタのセッションごとに 1 つ生成する UUID v4。
//! render ページの URL（`?uuid=...`）に埋め込み、iframe 内のレンダラーが
//! どの親エディタに属するかを判別するのに使う。

use url::Url;
use uuid::Uuid;

use crate::IDENTITY_QUERY_PARAM;

/// 生成後は変更されない識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommunicatorIdentity(Uuid);

impl CommunicatorIdentity {
    /// OS / ブラウザの乱数源から新しい Identity を生成する
    pub fn generate() -> Self {
        CommunicatorIdentity(Uuid::new_v4())
    }

    /// 16 バイトの乱数から UUID v4 を組み立てる（テスト用に決定的な値を作る）
    pub fn from_random_bytes(bytes: [u8; 16]) -> Self {
        CommunicatorIdentity(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }

    /// 文字列表現を検証して取り込む
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(CommunicatorIdentity)
    }

    /// render ページの URL から Identity を取り出す
    pub fn from_render_page_url(url: &str) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let (_, value) = parsed
            .query_pairs()
            .find(|(key, _)| key == IDENTITY_QUERY_PARAM)?;
        Self::parse(&value)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for CommunicatorIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

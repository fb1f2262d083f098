//! origin（`scheme://host[:port]`）
//!
//! ブラウザの `new URL(url).origin` と同じ正規化を行う:
//! スキームとホストは小文字、既定ポート（http:80 / https:443）は省略、パス以降は捨てる。

use url::Url;

use crate::error::TransportError;

/// 送受信の宛先・送信元を表す origin
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin(String);

impl Origin {
    /// 任意の URL から origin を計算する
    ///
    /// # エラー
    /// - URL として解釈できない
    /// - opaque origin（`data:` など）
    pub fn parse(url: &str) -> Result<Self, TransportError> {
        let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let origin = parsed.origin();
        if !origin.is_tuple() {
            return Err(TransportError::OpaqueOrigin(url.to_string()));
        }
        Ok(Origin(origin.ascii_serialization()))
    }

    /// シリアライズ済みの origin 文字列
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 受信イベントの `event.origin`（ブラウザが正規化済み）と一致するか
    pub fn matches(&self, event_origin: &str) -> bool {
        self.0 == event_origin
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

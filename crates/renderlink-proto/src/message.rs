//! メッセージエンベロープとタグ
//!
//! ## Wire Format
//! ```text
//! { "type": "<TAG>", ...タグごとに決まったフィールド (camelCase) }
//! ```
//!
//! 例:
//! ```text
//! { "type": "SET_MARKDOWN_CONTENT", "content": ["# Title", "body"] }
//! { "type": "ON_HEIGHT_CHANGE", "height": 480 }
//! { "type": "RENDERER_READY" }
//! ```

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtoError;
use crate::payload::{BaseConfiguration, ScrollState, SlideOptions};
use crate::Side;

/// メッセージタグ（`type` フィールドの値）
///
/// 閉じた列挙。ここにないタグはデコード境界で拒否される。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommunicationMessageType {
    SetBaseConfiguration,
    SetMarkdownContent,
    SetDarkMode,
    SetScrollState,
    EnableRendererScrollSource,
    DisableRendererScrollSource,
    OnHeightChange,
    OnFirstHeadingChange,
    RendererReady,
    GetWordCount,
    OnWordCountCalculated,
    ExtensionEvent,
    SetSlideOptions,
}

impl CommunicationMessageType {
    /// すべてのタグ
    pub const ALL: [CommunicationMessageType; 13] = [
        CommunicationMessageType::SetBaseConfiguration,
        CommunicationMessageType::SetMarkdownContent,
        CommunicationMessageType::SetDarkMode,
        CommunicationMessageType::SetScrollState,
        CommunicationMessageType::EnableRendererScrollSource,
        CommunicationMessageType::DisableRendererScrollSource,
        CommunicationMessageType::OnHeightChange,
        CommunicationMessageType::OnFirstHeadingChange,
        CommunicationMessageType::RendererReady,
        CommunicationMessageType::GetWordCount,
        CommunicationMessageType::OnWordCountCalculated,
        CommunicationMessageType::ExtensionEvent,
        CommunicationMessageType::SetSlideOptions,
    ];

    /// ワイヤー上のタグ文字列
    pub fn as_str(&self) -> &'static str {
        match self {
            CommunicationMessageType::SetBaseConfiguration => "SET_BASE_CONFIGURATION",
            CommunicationMessageType::SetMarkdownContent => "SET_MARKDOWN_CONTENT",
            CommunicationMessageType::SetDarkMode => "SET_DARKMODE",
            CommunicationMessageType::SetScrollState => "SET_SCROLL_STATE",
            CommunicationMessageType::EnableRendererScrollSource => "ENABLE_RENDERER_SCROLL_SOURCE",
            CommunicationMessageType::DisableRendererScrollSource => "DISABLE_RENDERER_SCROLL_SOURCE",
            CommunicationMessageType::OnHeightChange => "ON_HEIGHT_CHANGE",
            CommunicationMessageType::OnFirstHeadingChange => "ON_FIRST_HEADING_CHANGE",
            CommunicationMessageType::RendererReady => "RENDERER_READY",
            CommunicationMessageType::GetWordCount => "GET_WORD_COUNT",
            CommunicationMessageType::OnWordCountCalculated => "ON_WORD_COUNT_CALCULATED",
            CommunicationMessageType::ExtensionEvent => "EXTENSION_EVENT",
            CommunicationMessageType::SetSlideOptions => "SET_SLIDE_OPTIONS",
        }
    }

    /// タグ文字列からタグを復元する。未知のタグは `None`。
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == tag)
    }

    /// このタグのメッセージを `side` が送信してよいか
    ///
    /// ```text
    /// editor → renderer : SET_BASE_CONFIGURATION, SET_MARKDOWN_CONTENT, SET_DARKMODE,
    ///                     SET_SCROLL_STATE, DISABLE_RENDERER_SCROLL_SOURCE,
    ///                     GET_WORD_COUNT, SET_SLIDE_OPTIONS
    /// renderer → editor : RENDERER_READY, ON_HEIGHT_CHANGE, ON_FIRST_HEADING_CHANGE,
    ///                     ENABLE_RENDERER_SCROLL_SOURCE, SET_SCROLL_STATE,
    ///                     ON_WORD_COUNT_CALCULATED, EXTENSION_EVENT
    /// ```
    pub fn sent_by(&self, side: Side) -> bool {
        use CommunicationMessageType::*;
        match self {
            // スクロール位置は両方向
            SetScrollState => true,
            SetBaseConfiguration | SetMarkdownContent | SetDarkMode | DisableRendererScrollSource
            | GetWordCount | SetSlideOptions => side == Side::Editor,
            RendererReady | OnHeightChange | OnFirstHeadingChange | EnableRendererScrollSource
            | OnWordCountCalculated | ExtensionEvent => side == Side::Renderer,
        }
    }
}

impl core::fmt::Display for CommunicationMessageType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// エディタとレンダラーの間でやり取りするメッセージ
///
/// `type` フィールドで判別される tagged union。各バリアントはそのタグに
/// 必要なフィールドをすべて持つ（省略可能なのは `firstHeading` と `payload` のみ）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    #[serde(rename_all = "camelCase")]
    SetBaseConfiguration { base_configuration: BaseConfiguration },

    SetMarkdownContent { content: Vec<String> },

    #[serde(rename = "SET_DARKMODE")]
    SetDarkMode { activated: bool },

    #[serde(rename_all = "camelCase")]
    SetScrollState { scroll_state: ScrollState },

    EnableRendererScrollSource,

    DisableRendererScrollSource,

    OnHeightChange { height: f64 },

    #[serde(rename_all = "camelCase")]
    OnFirstHeadingChange {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        first_heading: Option<String>,
    },

    RendererReady,

    GetWordCount,

    OnWordCountCalculated { words: u32 },

    #[serde(rename_all = "camelCase")]
    ExtensionEvent {
        event_name: String,
        #[serde(default)]
        payload: Value,
    },

    #[serde(rename_all = "camelCase")]
    SetSlideOptions { slide_options: SlideOptions },
}

impl Message {
    /// このメッセージのタグ
    pub fn message_type(&self) -> CommunicationMessageType {
        use CommunicationMessageType as T;
        match self {
            Message::SetBaseConfiguration { .. } => T::SetBaseConfiguration,
            Message::SetMarkdownContent { .. } => T::SetMarkdownContent,
            Message::SetDarkMode { .. } => T::SetDarkMode,
            Message::SetScrollState { .. } => T::SetScrollState,
            Message::EnableRendererScrollSource => T::EnableRendererScrollSource,
            Message::DisableRendererScrollSource => T::DisableRendererScrollSource,
            Message::OnHeightChange { .. } => T::OnHeightChange,
            Message::OnFirstHeadingChange { .. } => T::OnFirstHeadingChange,
            Message::RendererReady => T::RendererReady,
            Message::GetWordCount => T::GetWordCount,
            Message::OnWordCountCalculated { .. } => T::OnWordCountCalculated,
            Message::ExtensionEvent { .. } => T::ExtensionEvent,
            Message::SetSlideOptions { .. } => T::SetSlideOptions,
        }
    }

    /// 構造化データ（postMessage の `event.data` 相当）からデコードする
    ///
    /// # エラー
    /// - オブジェクトでない → `NotAnObject`
    /// - `type` がない → `MissingType`
    /// - 未知のタグ → `UnknownType`
    /// - フィールド不足・型違い → `InvalidPayload`
    pub fn from_value(value: Value) -> Result<Self, ProtoError> {
        let tag = {
            let object = value.as_object().ok_or(ProtoError::NotAnObject)?;
            let raw_tag = object
                .get("type")
                .and_then(Value::as_str)
                .ok_or(ProtoError::MissingType)?;
            CommunicationMessageType::from_tag(raw_tag)
                .ok_or_else(|| ProtoError::UnknownType(raw_tag.to_string()))?
        };

        serde_json::from_value(value).map_err(|e| ProtoError::InvalidPayload {
            tag: tag.as_str(),
            reason: e.to_string(),
        })
    }

    /// JSON 文字列からデコードする
    pub fn from_json_str(json: &str) -> Result<Self, ProtoError> {
        let value: Value = serde_json::from_str(json).map_err(|_| ProtoError::NotAnObject)?;
        Self::from_value(value)
    }

    /// 構造化データにエンコードする
    pub fn to_value(&self) -> Result<Value, ProtoError> {
        serde_json::to_value(self).map_err(|e| ProtoError::EncodeFailed(e.to_string()))
    }

    /// JSON 文字列にエンコードする
    pub fn to_json_string(&self) -> Result<String, ProtoError> {
        serde_json::to_string(self).map_err(|e| ProtoError::EncodeFailed(e.to_string()))
    }
}

//! メッセージに載せるペイロード型
//!
//! いずれもこのクレートにとっては不透明なデータで、意味を解釈するのは
//! エディタ側・レンダラー側のアプリケーションコード。

use alloc::string::String;

use serde::{Deserialize, Serialize};

/// スクロール位置
///
/// エディタとレンダラーの間で「どの行が先頭に見えているか」を同期するために使う。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollState {
    /// 画面先頭に見えているソース行（1 始まり）
    pub first_line_in_view: u32,
    /// その行の中でスクロールしている割合（0〜100）
    pub scrolled_percentage: f64,
}

impl ScrollState {
    pub fn new(first_line_in_view: u32, scrolled_percentage: f64) -> Self {
        ScrollState {
            first_line_in_view,
            scrolled_percentage,
        }
    }
}

impl Default for ScrollState {
    fn default() -> Self {
        ScrollState::new(1, 0.0)
    }
}

/// iframe 内で使うレンダラーの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererType {
    /// 通常のノート表示
    Document,
    /// スライドショー表示
    Slideshow,
    /// Message of the day
    Motd,
    /// ランディングページのイントロ
    Intro,
}

impl RendererType {
    /// ワイヤー上の文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            RendererType::Document => "document",
            RendererType::Slideshow => "slideshow",
            RendererType::Motd => "motd",
            RendererType::Intro => "intro",
        }
    }

    /// ワイヤー上の文字列から復元する
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "document" => Some(RendererType::Document),
            "slideshow" => Some(RendererType::Slideshow),
            "motd" => Some(RendererType::Motd),
            "intro" => Some(RendererType::Intro),
            _ => None,
        }
    }
}

/// ハンドシェイク時に一度だけ送るレンダラーの基本設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseConfiguration {
    /// 相対リンク解決に使うエディタ側の URL
    pub base_url: String,
    /// 使用するレンダラー
    pub renderer_type: RendererType,
}

/// スライドショーの表示オプション
///
/// すべて省略可能。省略されたものはレンダラー側の既定値を使う。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_slide: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_slide_stoppable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_transition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_number: Option<bool>,
}

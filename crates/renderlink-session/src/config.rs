//! Communicator の設定
//!
//! ホスト（JS）はプレーンなオブジェクトで渡す。フィールド名は camelCase。
//!
//! ```text
//! editor:   { baseUrl, rendererBaseUrl, rendererType?, adaptFrameHeightToContent? }
//! renderer: { editorBaseUrl }
//! ```

use serde::Deserialize;
use url::Url;

use renderlink_proto::RendererType;
use renderlink_transport::{Origin, TransportError};

use crate::error::SessionError;
use crate::identity::CommunicatorIdentity;
use crate::{IDENTITY_QUERY_PARAM, RENDER_PAGE_PATH};

fn default_renderer_type() -> RendererType {
    RendererType::Document
}

/// エディタ側の設定
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// エディタページの URL。`SET_BASE_CONFIGURATION` の `baseUrl` として送る
    pub base_url: String,
    /// レンダラーを配信しているオリジンのベース URL
    pub renderer_base_url: String,
    /// 最初に使うレンダラー
    #[serde(default = "default_renderer_type")]
    pub renderer_type: RendererType,
    /// `ON_HEIGHT_CHANGE` に合わせて iframe の高さを変えるか
    #[serde(default)]
    pub adapt_frame_height_to_content: bool,
}

impl EditorConfig {
    pub fn new(base_url: impl Into<String>, renderer_base_url: impl Into<String>) -> Self {
        EditorConfig {
            base_url: base_url.into(),
            renderer_base_url: renderer_base_url.into(),
            renderer_type: default_renderer_type(),
            adapt_frame_height_to_content: false,
        }
    }

    pub fn with_renderer_type(mut self, renderer_type: RendererType) -> Self {
        self.renderer_type = renderer_type;
        self
    }

    pub fn with_adapt_frame_height(mut self, adapt: bool) -> Self {
        self.adapt_frame_height_to_content = adapt;
        self
    }

    /// レンダラーの origin（送信先・受信元の検証に使う）
    pub fn renderer_origin(&self) -> Result<Origin, SessionError> {
        Ok(Origin::parse(&self.renderer_base_url)?)
    }

    /// iframe に読み込ませる render ページの URL
    ///
    /// `<rendererBaseUrl>/render?uuid=<identity>`
    pub fn render_page_url(&self, identity: &CommunicatorIdentity) -> Result<String, SessionError> {
        let base = Url::parse(&self.renderer_base_url).map_err(|e| TransportError::InvalidUrl {
            url: self.renderer_base_url.clone(),
            reason: e.to_string(),
        })?;
        let mut url = base.join(RENDER_PAGE_PATH).map_err(|e| TransportError::InvalidUrl {
            url: self.renderer_base_url.clone(),
            reason: e.to_string(),
        })?;
        url.query_pairs_mut()
            .clear()
            .append_pair(IDENTITY_QUERY_PARAM, &identity.to_string());
        Ok(url.to_string())
    }

    /// すべての URL が解釈できるか確認する
    pub fn validate(&self) -> Result<(), SessionError> {
        Url::parse(&self.base_url).map_err(|e| TransportError::InvalidUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        self.renderer_origin()?;
        Ok(())
    }
}

/// レンダラー側の設定
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererConfig {
    /// エディタを配信しているオリジンのベース URL
    pub editor_base_url: String,
}

impl RendererConfig {
    pub fn new(editor_base_url: impl Into<String>) -> Self {
        RendererConfig {
            editor_base_url: editor_base_url.into(),
        }
    }

    /// エディタの origin（送信先・受信元の検証に使う）
    pub fn editor_origin(&self) -> Result<Origin, SessionError> {
        Ok(Origin::parse(&self.editor_base_url)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_editor_config_from_json_with_defaults() {
        let config: EditorConfig = serde_json::from_value(json!({
            "baseUrl": "https://md.example.com/n/features",
            "rendererBaseUrl": "https://render.example.com/"
        }))
        .unwrap();
        assert_eq!(config.renderer_type, RendererType::Document);
        assert!(!config.adapt_frame_height_to_content);
        assert_eq!(config.renderer_origin().unwrap().as_str(), "https://render.example.com");
        config.validate().unwrap();
    }

    #[test]
    fn test_editor_config_explicit_fields() {
        let config: EditorConfig = serde_json::from_value(json!({
            "baseUrl": "https://md.example.com/",
            "rendererBaseUrl": "https://render.example.com/",
            "rendererType": "motd",
            "adaptFrameHeightToContent": true
        }))
        .unwrap();
        assert_eq!(config.renderer_type, RendererType::Motd);
        assert!(config.adapt_frame_height_to_content);
    }

    #[test]
    fn test_render_page_url() {
        let config = EditorConfig::new("https://md.example.com/", "https://render.example.com/app/");
        let identity = CommunicatorIdentity::from_random_bytes([0; 16]);
        let url = config.render_page_url(&identity).unwrap();
        assert_eq!(
            url,
            "https://render.example.com/app/render?uuid=00000000-0000-4000-8000-000000000000"
        );
        assert_eq!(CommunicatorIdentity::from_render_page_url(&url), Some(identity));
    }

    #[test]
    fn test_invalid_urls_rejected() {
        let config = EditorConfig::new("not a url", "https://render.example.com/");
        assert!(matches!(config.validate(), Err(SessionError::Config(_))));

        let config = EditorConfig::new("https://md.example.com/", "::");
        assert!(config.renderer_origin().is_err());
    }

    #[test]
    fn test_renderer_config() {
        let config: RendererConfig =
            serde_json::from_value(json!({ "editorBaseUrl": "http://localhost:3000/" })).unwrap();
        assert_eq!(config.editor_origin().unwrap().as_str(), "http://localhost:3000");
    }
}

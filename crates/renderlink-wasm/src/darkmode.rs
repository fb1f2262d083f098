//! ブラウザからダークモード設定を読み書きする
//!
//! どの API が使えなくても例外にはせず、ログに残して「未設定」「ライト」として扱う。

use wasm_bindgen::prelude::*;
use web_sys::Window;

use renderlink_session::{
    color_scheme_storage_value, forced_from_color_scheme, DarkModeConfig, DARK_MODE_MEDIA_QUERY,
    FORCED_COLOR_SCHEME_KEY,
};

/// localStorage の強制値とブラウザの設定を読む
pub fn read_config(window: &Window) -> DarkModeConfig {
    DarkModeConfig {
        forced_to_dark: read_forced(window),
        browser_is_dark: browser_prefers_dark(window),
    }
}

/// 強制値を localStorage に保存する（`None` は削除）
pub fn store_forced(window: &Window, forced_to_dark: Option<bool>) {
    let storage = match window.local_storage() {
        Ok(Some(storage)) => storage,
        _ => {
            log::warn!("localStorage is not available, forced color scheme not saved");
            return;
        }
    };
    let result = match color_scheme_storage_value(forced_to_dark) {
        Some(value) => storage.set_item(FORCED_COLOR_SCHEME_KEY, value),
        None => storage.remove_item(FORCED_COLOR_SCHEME_KEY),
    };
    if let Err(e) = result {
        log::warn!("Saving the color scheme failed: {:?}", e);
    }
}

fn read_forced(window: &Window) -> Option<bool> {
    match window.local_storage() {
        Ok(Some(storage)) => match storage.get_item(FORCED_COLOR_SCHEME_KEY) {
            Ok(stored) => forced_from_color_scheme(stored.as_deref()),
            Err(e) => {
                log::warn!("Reading the color scheme failed: {:?}", e);
                None
            }
        },
        _ => {
            log::debug!("localStorage is not available");
            None
        }
    }
}

fn browser_prefers_dark(window: &Window) -> bool {
    match window.match_media(DARK_MODE_MEDIA_QUERY) {
        Ok(Some(query)) => query.matches(),
        _ => {
            log::debug!("matchMedia is not available");
            false
        }
    }
}

/// 現在のダークモード設定を読む
///
/// # 戻り値
/// `{ forcedToDark: boolean | undefined, browserIsDark: boolean, dark: boolean }`
#[wasm_bindgen(js_name = "loadDarkModeConfig")]
pub fn load_dark_mode_config() -> Result<JsValue, JsError> {
    let config = match web_sys::window() {
        Some(window) => read_config(&window),
        None => DarkModeConfig::default(),
    };
    let out = js_sys::Object::new();
    let forced = config.forced_to_dark.map_or(JsValue::UNDEFINED, JsValue::from_bool);
    js_sys::Reflect::set(&out, &"forcedToDark".into(), &forced)
        .and_then(|_| js_sys::Reflect::set(&out, &"browserIsDark".into(), &config.browser_is_dark.into()))
        .and_then(|_| js_sys::Reflect::set(&out, &"dark".into(), &config.is_dark().into()))
        .map_err(|e| JsError::new(&format!("Building the dark mode config failed: {:?}", e)))?;
    Ok(out.into())
}

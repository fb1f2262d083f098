//! 拡張機能イベントのエミッタ
//!
//! レンダラー内の拡張（チャート、埋め込み動画など）が発行したイベントは
//! `EXTENSION_EVENT` としてエディタに届き、ここで購読者に配られる。
//!
//! ## イベント名のパターン
//!
//! `.` 区切りのセグメントで照合する。
//!
//! ```text
//! "vega.render"  … 完全一致
//! "vega.*"       … * は 1 セグメントに一致（"vega.render" ○ / "vega.a.b" ×）
//! "vega.**"      … ** は 0 個以上のセグメントに一致（"vega" ○ / "vega.a.b" ○）
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::Value;

type ExtensionHandler = Rc<RefCell<dyn FnMut(&str, &Value)>>;

struct Listener {
    id: u64,
    pattern: Vec<String>,
    active: Rc<Cell<bool>>,
    handler: ExtensionHandler,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<Listener>,
}

/// 拡張イベントのエミッタ
///
/// `Clone` は同じ購読者リストを共有するハンドルを作る。
#[derive(Clone, Default)]
pub struct ExtensionEventEmitter {
    listeners: Rc<RefCell<Listeners>>,
}

impl ExtensionEventEmitter {
    pub fn new() -> Self {
        ExtensionEventEmitter::default()
    }

    /// `pattern` に一致するイベントの購読を登録する
    pub fn on<F>(&self, pattern: &str, handler: F) -> ExtensionListener
    where
        F: FnMut(&str, &Value) + 'static,
    {
        let active = Rc::new(Cell::new(true));
        let handler: ExtensionHandler = Rc::new(RefCell::new(handler));
        let mut listeners = self.listeners.borrow_mut();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push(Listener {
            id,
            pattern: pattern.split('.').map(str::to_string).collect(),
            active: active.clone(),
            handler,
        });
        ExtensionListener {
            listeners: Rc::downgrade(&self.listeners),
            id,
            active,
        }
    }

    /// イベントを発行し、呼び出した購読者数を返す
    pub fn emit(&self, event_name: &str, payload: &Value) -> usize {
        let segments: Vec<&str> = event_name.split('.').collect();
        let matching: Vec<(Rc<Cell<bool>>, ExtensionHandler)> = self
            .listeners
            .borrow()
            .entries
            .iter()
            .filter(|l| pattern_matches(&l.pattern, &segments))
            .map(|l| (l.active.clone(), l.handler.clone()))
            .collect();

        let mut called = 0;
        for (active, handler) in matching {
            if !active.get() {
                continue;
            }
            match handler.try_borrow_mut() {
                Ok(mut handler) => {
                    (&mut *handler)(event_name, payload);
                    called += 1;
                }
                Err(_) => log::warn!("Extension listener for {} is already running", event_name),
            }
        }
        if called == 0 {
            log::debug!("No extension listener for {}", event_name);
        }
        called
    }

    /// 購読者数
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().entries.len()
    }
}

/// 購読解除用ハンドル
pub struct ExtensionListener {
    listeners: std::rc::Weak<RefCell<Listeners>>,
    id: u64,
    active: Rc<Cell<bool>>,
}

impl ExtensionListener {
    /// 購読を解除する。何度呼んでもよい。
    pub fn off(&self) {
        if !self.active.replace(false) {
            return;
        }
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.borrow_mut().entries.retain(|l| l.id != self.id);
        }
    }
}

fn pattern_matches(pattern: &[String], name: &[&str]) -> bool {
    match pattern.split_first() {
        None => name.is_empty(),
        Some((head, rest)) if head == "**" => {
            (0..=name.len()).any(|skip| pattern_matches(rest, &name[skip..]))
        }
        Some((head, rest)) => match name.split_first() {
            Some((first, remaining)) => {
                (head == "*" || head == first) && pattern_matches(rest, remaining)
            }
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn segments(name: &str) -> Vec<&str> {
        name.split('.').collect()
    }

    fn pattern(p: &str) -> Vec<String> {
        p.split('.').map(str::to_string).collect()
    }

    #[test]
    fn test_pattern_exact() {
        assert!(pattern_matches(&pattern("vega.render"), &segments("vega.render")));
        assert!(!pattern_matches(&pattern("vega.render"), &segments("vega.error")));
        assert!(!pattern_matches(&pattern("vega"), &segments("vega.render")));
    }

    #[test]
    fn test_pattern_single_wildcard() {
        assert!(pattern_matches(&pattern("vega.*"), &segments("vega.render")));
        assert!(!pattern_matches(&pattern("vega.*"), &segments("vega.a.b")));
        assert!(!pattern_matches(&pattern("vega.*"), &segments("vega")));
        assert!(pattern_matches(&pattern("*"), &segments("anything")));
    }

    #[test]
    fn test_pattern_multi_wildcard() {
        assert!(pattern_matches(&pattern("vega.**"), &segments("vega")));
        assert!(pattern_matches(&pattern("vega.**"), &segments("vega.a.b")));
        assert!(pattern_matches(&pattern("**.done"), &segments("a.b.done")));
        assert!(!pattern_matches(&pattern("**.done"), &segments("a.b.fail")));
        assert!(pattern_matches(&pattern("**"), &segments("x.y")));
    }

    #[test]
    fn test_emit_calls_matching_listeners_in_order() {
        let emitter = ExtensionEventEmitter::new();
        let calls = Rc::new(RefCell::new(Vec::new()));

        let l = calls.clone();
        emitter.on("gist.*", move |name, payload| {
            l.borrow_mut().push(format!("wild:{}:{}", name, payload["id"]));
        });
        let l = calls.clone();
        emitter.on("gist.loaded", move |name, _| {
            l.borrow_mut().push(format!("exact:{}", name));
        });
        let l = calls.clone();
        emitter.on("youtube.*", move |name, _| {
            l.borrow_mut().push(format!("other:{}", name));
        });

        let called = emitter.emit("gist.loaded", &json!({ "id": 7 }));
        assert_eq!(called, 2);
        assert_eq!(
            *calls.borrow(),
            vec!["wild:gist.loaded:7".to_string(), "exact:gist.loaded".to_string()]
        );
    }

    #[test]
    fn test_off_stops_delivery() {
        let emitter = ExtensionEventEmitter::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let listener = emitter.on("**", move |_, _| h.set(h.get() + 1));

        emitter.emit("a", &Value::Null);
        listener.off();
        listener.off();
        emitter.emit("a", &Value::Null);
        assert_eq!(hits.get(), 1);
        assert_eq!(emitter.listener_count(), 0);
    }
}

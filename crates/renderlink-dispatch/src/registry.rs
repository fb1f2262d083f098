//! 購読レジストリとディスパッチャ実装

use alloc::collections::BTreeMap;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use renderlink_proto::{CommunicationMessageType, Message};

use crate::error::HandlerError;

/// ハンドラの戻り値
pub type HandlerResult = Result<(), HandlerError>;

type SharedHandler = Rc<RefCell<dyn FnMut(&Message) -> HandlerResult>>;

/// 登録済みハンドラ 1 件
struct HandlerEntry {
    /// レジストリ内で一意な ID
    id: u64,
    /// 購読解除されたら false になる（ディスパッチ中のスナップショットからも参照される）
    active: Rc<Cell<bool>>,
    callback: SharedHandler,
}

/// タグ → ハンドラ列
#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: BTreeMap<CommunicationMessageType, Vec<HandlerEntry>>,
}

impl Registry {
    fn remove(&mut self, tag: CommunicationMessageType, id: u64) {
        if let Some(entries) = self.handlers.get_mut(&tag) {
            entries.retain(|entry| entry.id != id);
            if entries.is_empty() {
                self.handlers.remove(&tag);
            }
        }
    }
}

/// 受信メッセージをタグごとの購読者に配るディスパッチャ
///
/// `Clone` は同じレジストリを共有するハンドルを作るだけ。
///
/// ## 再入
///
/// `dispatch` はハンドラを呼ぶ前にレジストリの借用を手放すので、
/// ハンドラの中から `subscribe` / `unsubscribe` / `dispatch` を呼んでよい。
/// ただし実行中のハンドラ自身を再入で呼ぶことはできず、その呼び出しはスキップされる。
#[derive(Clone, Default)]
pub struct ReceiveDispatcher {
    registry: Rc<RefCell<Registry>>,
}

impl ReceiveDispatcher {
    /// 空のディスパッチャを生成する
    pub fn new() -> Self {
        ReceiveDispatcher::default()
    }

    /// `tag` のメッセージを受け取るハンドラを登録する
    ///
    /// 同じタグに複数のハンドラを登録でき、登録順に呼ばれる。
    /// 戻り値の [`Subscription`] を drop しても購読は解除されない。
    /// 解除するには [`Subscription::unsubscribe`] を呼ぶ。
    pub fn subscribe<F>(&self, tag: CommunicationMessageType, handler: F) -> Subscription
    where
        F: FnMut(&Message) -> HandlerResult + 'static,
    {
        let active = Rc::new(Cell::new(true));
        let callback: SharedHandler = Rc::new(RefCell::new(handler));

        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.handlers.entry(tag).or_default().push(HandlerEntry {
            id,
            active: active.clone(),
            callback,
        });
        log::debug!("Set handler #{} for {}", id, tag);

        Subscription {
            registry: Rc::downgrade(&self.registry),
            tag,
            id,
            active,
        }
    }

    /// `message` のタグに登録されたハンドラをすべて呼ぶ
    ///
    /// - 登録順に呼ぶ
    /// - ハンドラが `Err` を返してもログに残して残りのハンドラを続行する
    /// - 呼び出し前に購読解除されたハンドラは呼ばない
    pub fn dispatch(&self, message: &Message) -> DispatchReport {
        let tag = message.message_type();
        let snapshot: Vec<(u64, Rc<Cell<bool>>, SharedHandler)> = {
            let registry = self.registry.borrow();
            match registry.handlers.get(&tag) {
                Some(entries) => entries
                    .iter()
                    .map(|e| (e.id, e.active.clone(), e.callback.clone()))
                    .collect(),
                None => Vec::new(),
            }
        };

        let mut report = DispatchReport::default();
        if snapshot.is_empty() {
            log::trace!("No handler for {}", tag);
            return report;
        }

        log::debug!("Received event {} ({} handlers)", tag, snapshot.len());
        for (id, active, callback) in snapshot {
            if !active.get() {
                report.skipped += 1;
                continue;
            }
            let mut handler = match callback.try_borrow_mut() {
                Ok(handler) => handler,
                Err(_) => {
                    log::warn!("Handler #{} for {} is already running, skipped", id, tag);
                    report.skipped += 1;
                    continue;
                }
            };
            match (&mut *handler)(message) {
                Ok(()) => report.invoked += 1,
                Err(e) => {
                    log::error!("Handler #{} for {} failed: {}", id, tag, e);
                    report.invoked += 1;
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// 全ハンドラを解除する
    pub fn clear(&self) {
        let mut registry = self.registry.borrow_mut();
        for entries in registry.handlers.values() {
            for entry in entries {
                entry.active.set(false);
            }
        }
        registry.handlers.clear();
    }
}

/// 購読を解除するためのハンドル
///
/// ディスパッチャより長く生きても問題ない（その場合 `unsubscribe` は何もしない）。
pub struct Subscription {
    registry: Weak<RefCell<Registry>>,
    tag: CommunicationMessageType,
    id: u64,
    active: Rc<Cell<bool>>,
}

impl Subscription {
    /// 購読を解除する。何度呼んでもよい。
    ///
    /// ディスパッチ中に呼んだ場合、まだ呼ばれていなければこのメッセージでも呼ばれない。
    /// すでに実行中の呼び出しは中断しない。
    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.borrow_mut().remove(self.tag, self.id);
            log::debug!("Removed handler #{} for {}", self.id, self.tag);
        }
    }

    /// まだ購読中か
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// 購読しているタグ
    pub fn message_type(&self) -> CommunicationMessageType {
        self.tag
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("tag", &self.tag)
            .field("id", &self.id)
            .field("active", &self.active.get())
            .finish()
    }
}

/// `dispatch` 1 回分の結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// 呼び出したハンドラ数（失敗したものを含む）
    pub invoked: usize,
    /// `Err` を返したハンドラ数
    pub failed: usize,
    /// 解除済み・再入のため呼ばなかったハンドラ数
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::{String, ToString};
    use alloc::vec;
    use renderlink_proto::CommunicationMessageType as T;

    fn heading(text: &str) -> Message {
        Message::OnFirstHeadingChange {
            first_heading: Some(text.to_string()),
        }
    }

    #[test]
    fn test_handlers_called_in_registration_order() {
        let dispatcher = ReceiveDispatcher::new();
        let calls = Rc::new(RefCell::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let calls = calls.clone();
            dispatcher.subscribe(T::OnFirstHeadingChange, move |_| {
                calls.borrow_mut().push(name);
                Ok(())
            });
        }

        let report = dispatcher.dispatch(&heading("Title"));
        assert_eq!(report.invoked, 3);
        assert_eq!(*calls.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_only_matching_tag_is_dispatched() {
        let dispatcher = ReceiveDispatcher::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        dispatcher.subscribe(T::OnHeightChange, move |_| {
            h.set(h.get() + 1);
            Ok(())
        });

        let report = dispatcher.dispatch(&heading("x"));
        assert_eq!(report, DispatchReport::default());
        assert_eq!(hits.get(), 0);

        dispatcher.dispatch(&Message::OnHeightChange { height: 10.0 });
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_failing_handler_does_not_stop_others() {
        let dispatcher = ReceiveDispatcher::new();
        let after = Rc::new(Cell::new(false));

        dispatcher.subscribe(T::GetWordCount, |_| Err(HandlerError::new("boom")));
        let a = after.clone();
        dispatcher.subscribe(T::GetWordCount, move |_| {
            a.set(true);
            Ok(())
        });

        let report = dispatcher.dispatch(&Message::GetWordCount);
        assert_eq!(report.invoked, 2);
        assert_eq!(report.failed, 1);
        assert!(after.get(), "失敗したハンドラの後も続行すべき");
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let dispatcher = ReceiveDispatcher::new();
        let sub = dispatcher.subscribe(T::RendererReady, |_| Ok(()));
        assert_eq!(dispatcher.dispatch(&Message::RendererReady).invoked, 1);

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert_eq!(dispatcher.dispatch(&Message::RendererReady).invoked, 0);
    }

    #[test]
    fn test_dropping_subscription_keeps_handler() {
        let dispatcher = ReceiveDispatcher::new();
        let hits = Rc::new(Cell::new(0));
        {
            let h = hits.clone();
            let _sub = dispatcher.subscribe(T::RendererReady, move |_| {
                h.set(h.get() + 1);
                Ok(())
            });
        }
        dispatcher.dispatch(&Message::RendererReady);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_unsubscribe_from_inside_own_handler() {
        let dispatcher = ReceiveDispatcher::new();
        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let s = seen.clone();
        let own = slot.clone();
        let sub = dispatcher.subscribe(T::OnFirstHeadingChange, move |msg| {
            if let Message::OnFirstHeadingChange { first_heading } = msg {
                s.borrow_mut().push(first_heading.clone().unwrap_or_default());
            }
            if let Some(sub) = own.borrow().as_ref() {
                sub.unsubscribe();
            }
            Ok(())
        });
        *slot.borrow_mut() = Some(sub);

        // 2 通のバッチ: 1 通目の処理中に解除 → 2 通目では呼ばれない
        dispatcher.dispatch(&heading("one"));
        dispatcher.dispatch(&heading("two"));
        assert_eq!(*seen.borrow(), vec!["one".to_string()]);
    }

    #[test]
    fn test_unsubscribe_later_handler_during_dispatch() {
        let dispatcher = ReceiveDispatcher::new();
        let second_called = Rc::new(Cell::new(false));
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let victim = slot.clone();
        dispatcher.subscribe(T::GetWordCount, move |_| {
            if let Some(sub) = victim.borrow().as_ref() {
                sub.unsubscribe();
            }
            Ok(())
        });
        let c = second_called.clone();
        let sub = dispatcher.subscribe(T::GetWordCount, move |_| {
            c.set(true);
            Ok(())
        });
        *slot.borrow_mut() = Some(sub);

        let report = dispatcher.dispatch(&Message::GetWordCount);
        assert!(!second_called.get());
        assert_eq!(report.invoked, 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_subscribe_from_inside_handler() {
        let dispatcher = ReceiveDispatcher::new();
        let late_hits = Rc::new(Cell::new(0));

        let d = dispatcher.clone();
        let hits = late_hits.clone();
        let added = Rc::new(Cell::new(false));
        dispatcher.subscribe(T::RendererReady, move |_| {
            if !added.replace(true) {
                let hits = hits.clone();
                d.subscribe(T::RendererReady, move |_| {
                    hits.set(hits.get() + 1);
                    Ok(())
                });
            }
            Ok(())
        });

        // 追加されたハンドラは次のメッセージから有効
        dispatcher.dispatch(&Message::RendererReady);
        assert_eq!(late_hits.get(), 0);
        dispatcher.dispatch(&Message::RendererReady);
        assert_eq!(late_hits.get(), 1);
    }

    #[test]
    fn test_reentrant_dispatch_skips_running_handler() {
        let dispatcher = ReceiveDispatcher::new();
        let depth = Rc::new(Cell::new(0));

        let d = dispatcher.clone();
        let dep = depth.clone();
        dispatcher.subscribe(T::GetWordCount, move |msg| {
            dep.set(dep.get() + 1);
            let inner = d.dispatch(msg);
            assert_eq!(inner.skipped, 1);
            Ok(())
        });

        dispatcher.dispatch(&Message::GetWordCount);
        assert_eq!(depth.get(), 1);
    }

    #[test]
    fn test_clear_deactivates_subscriptions() {
        let dispatcher = ReceiveDispatcher::new();
        let sub = dispatcher.subscribe(T::SetDarkMode, |_| Ok(()));
        dispatcher.clear();
        assert!(!sub.is_active());
        assert_eq!(dispatcher.dispatch(&Message::SetDarkMode { activated: true }).invoked, 0);
    }
}

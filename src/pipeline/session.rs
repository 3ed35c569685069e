//! セッション単位の状態
//!
//! 直前のスキャン結果と世代番号だけを持つ。セッション間で共有される状態は無い。

use super::ScanResult;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct Session {
    generation: Arc<AtomicU64>,
    last: Option<ScanResult>,
}

/// 別スレッドから進行中のスキャンを破棄するためのハンドル
#[derive(Debug, Clone)]
pub struct AbandonHandle {
    generation: Arc<AtomicU64>,
}

impl AbandonHandle {
    /// 進行中のスキャンを破棄済みにする（仕分けが行われなくなる）
    pub fn abandon(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直前のスキャン結果
    pub fn last_result(&self) -> Option<&ScanResult> {
        self.last.as_ref()
    }

    pub fn abandon_handle(&self) -> AbandonHandle {
        AbandonHandle {
            generation: Arc::clone(&self.generation),
        }
    }

    pub(super) fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(super) fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    pub(super) fn finish(&mut self, result: ScanResult) {
        self.last = Some(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_tracking() {
        let session = Session::new();
        let first = session.begin();
        assert!(session.is_current(first));

        let second = session.begin();
        assert!(!session.is_current(first));
        assert!(session.is_current(second));
    }

    #[test]
    fn test_abandon_handle_invalidates_current() {
        let session = Session::new();
        let generation = session.begin();
        session.abandon_handle().abandon();
        assert!(!session.is_current(generation));
    }

    #[test]
    fn test_sessions_are_independent() {
        let a = Session::new();
        let b = Session::new();
        let ga = a.begin();
        b.begin();
        b.begin();
        assert!(a.is_current(ga));
        assert!(a.last_result().is_none());
    }
}

//! 外部停止信号
//!
//! 控制循环在每个节拍开始时检查一次，不会打断正在进行的读写。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 可跨线程触发的停止信号（例如在 Ctrl-C 处理函数中调用 [`StopSignal::trigger`]）
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_is_shared_between_clones() {
        let signal = StopSignal::new();
        let remote = signal.clone();
        assert!(!signal.is_triggered());

        std::thread::spawn(move || remote.trigger()).join().unwrap();
        assert!(signal.is_triggered());
    }
}

//! 固定周期节拍
//!
//! 以绝对时间锚点计算下一次唤醒，单次迭代的耗时自动从休眠中扣除。
//! 迭代耗时超过周期（overrun）时不休眠，并把锚点重置到当前时间，避免累积延迟。

use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    next_tick: Instant,
    overruns: u64,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Ticker {
            period,
            next_tick: Instant::now() + period,
            overruns: 0,
        }
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// 累计 overrun 次数
    #[inline]
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// 休眠到下一个锚点；发生 overrun 时返回 `false`
    pub fn wait(&mut self) -> bool {
        let now = Instant::now();
        if self.next_tick > now {
            spin_sleep::sleep(self.next_tick - now);
            self.next_tick += self.period;
            true
        } else {
            warn!(
                "Control loop overrun: tick took {:?} longer than the {:?} period",
                now.duration_since(self.next_tick),
                self.period
            );
            self.overruns += 1;
            self.next_tick = now + self.period;
            false
        }
    }
}

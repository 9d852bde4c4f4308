//! レート制限時の再試行ポリシー
//!
//! 再試行は例外処理のループではなく、画像ごとの状態遷移
//! `Analyzing(n) → Retrying(n) → Analyzing(n+1)` として表す。
//! 待ち時間は試行回数だけで決まる（乱数なし）。

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大試行回数（初回を含む）
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// 再試行しない
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// attempt 回目の試行が失敗した後にもう一度試せるか
    pub fn can_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// n 回目の再試行前の待ち時間: base * 2^(n-1)（上限 max_delay）
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// サーバー指定の Retry-After が長ければそちらを優先（上限 max_delay）
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.backoff(retry);
        retry_after
            .map_or(backoff, |server| server.max(backoff))
            .min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let p = policy();
        assert_eq!(p.backoff(1), Duration::from_millis(500));
        assert_eq!(p.backoff(2), Duration::from_millis(1000));
        assert_eq!(p.backoff(3), Duration::from_millis(2000));
        assert_eq!(p.backoff(4), Duration::from_secs(3));
        assert_eq!(p.backoff(40), Duration::from_secs(3));
    }

    #[test]
    fn test_backoff_is_deterministic() {
        let p = policy();
        assert_eq!(p.backoff(2), p.backoff(2));
    }

    #[test]
    fn test_retry_after_respected_within_cap() {
        let p = policy();
        assert_eq!(p.delay_for(1, Some(Duration::from_secs(2))), Duration::from_secs(2));
        assert_eq!(p.delay_for(3, Some(Duration::from_millis(10))), Duration::from_secs(2));
        assert_eq!(p.delay_for(1, Some(Duration::from_secs(60))), Duration::from_secs(3));
        assert_eq!(p.delay_for(1, None), Duration::from_millis(500));
    }

    #[test]
    fn test_attempts_bounded() {
        let p = policy();
        assert!(p.can_retry(1));
        assert!(p.can_retry(3));
        assert!(!p.can_retry(4));
        assert!(!RetryPolicy::none().can_retry(1));
    }
}

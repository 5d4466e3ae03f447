//! Wake-lock ownership
//!
//! Every acquisition carries a safety timeout. The OS drops the lock on its
//! own once the timeout passes, so `is_held` goes by the recorded expiry
//! rather than by whether `release` was ever called.

use std::time::Duration;

use crate::clock::SharedClock;
use crate::error::Result;

use super::platform::AudioPlatform;

pub struct WakeLock {
    tag: String,
    timeout: Duration,
    clock: SharedClock,
    expires_at: Option<Duration>,
}

impl WakeLock {
    pub fn new(tag: impl Into<String>, timeout: Duration, clock: SharedClock) -> Self {
        Self {
            tag: tag.into(),
            timeout,
            clock,
            expires_at: None,
        }
    }

    /// Acquire (or re-acquire) the lock with a fresh timeout
    pub fn acquire(&mut self, platform: &mut dyn AudioPlatform) -> Result<()> {
        // A lock past its timeout is already gone on the OS side
        if self.is_held() {
            platform.release_wake_lock();
        }
        self.expires_at = None;
        platform.acquire_wake_lock(&self.tag, self.timeout)?;
        self.expires_at = Some(self.clock.now() + self.timeout);
        log::debug!("wake lock '{}' acquired for {:?}", self.tag, self.timeout);
        Ok(())
    }

    /// Release if held. Safe to call any number of times.
    pub fn release(&mut self, platform: &mut dyn AudioPlatform) {
        if self.is_held() {
            platform.release_wake_lock();
            log::debug!("wake lock '{}' released", self.tag);
        }
        self.expires_at = None;
    }

    pub fn is_held(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| self.clock.now() < expires_at)
    }

    /// Forget an acquisition whose timeout has passed. Returns true if one did.
    pub fn expire_if_due(&mut self) -> bool {
        match self.expires_at {
            Some(expires_at) if self.clock.now() >= expires_at => {
                self.expires_at = None;
                log::info!("wake lock '{}' expired after {:?}", self.tag, self.timeout);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::MockPlatform;
    use std::sync::Arc;

    const TEN_MINUTES: Duration = Duration::from_secs(600);

    fn lock() -> (WakeLock, ManualClock, MockPlatform) {
        let clock = ManualClock::new();
        let lock = WakeLock::new("test::Lock", TEN_MINUTES, Arc::new(clock.clone()));
        (lock, clock, MockPlatform::new())
    }

    #[test]
    fn acquire_passes_tag_and_timeout() {
        let (mut lock, _, mut platform) = lock();
        lock.acquire(&mut platform).unwrap();
        assert!(lock.is_held());
        assert_eq!(
            platform.log().wake_lock_acquires,
            vec![("test::Lock".to_string(), TEN_MINUTES)]
        );
    }

    #[test]
    fn expires_after_timeout_without_release() {
        let (mut lock, clock, mut platform) = lock();
        lock.acquire(&mut platform).unwrap();
        clock.advance(Duration::from_secs(599));
        assert!(lock.is_held());
        clock.advance(Duration::from_secs(1));
        assert!(!lock.is_held());
        assert_eq!(platform.log().wake_lock_releases, 0);
    }

    #[test]
    fn expire_if_due_clears_once() {
        let (mut lock, clock, mut platform) = lock();
        lock.acquire(&mut platform).unwrap();
        assert!(!lock.expire_if_due());
        clock.advance(TEN_MINUTES);
        assert!(lock.expire_if_due());
        assert!(!lock.expire_if_due());
        assert!(!lock.is_held());
    }

    #[test]
    fn release_is_idempotent() {
        let (mut lock, _, mut platform) = lock();
        lock.acquire(&mut platform).unwrap();
        lock.release(&mut platform);
        lock.release(&mut platform);
        assert!(!lock.is_held());
        assert_eq!(platform.log().wake_lock_releases, 1);
    }

    #[test]
    fn release_without_acquire_is_noop() {
        let (mut lock, _, mut platform) = lock();
        lock.release(&mut platform);
        assert_eq!(platform.log().wake_lock_releases, 0);
    }

    #[test]
    fn reacquire_releases_previous_and_extends() {
        let (mut lock, clock, mut platform) = lock();
        lock.acquire(&mut platform).unwrap();
        clock.advance(Duration::from_secs(300));
        lock.acquire(&mut platform).unwrap();
        assert_eq!(platform.log().wake_lock_releases, 1);
        clock.advance(Duration::from_secs(599));
        assert!(lock.is_held());
        clock.advance(Duration::from_secs(1));
        assert!(!lock.is_held());
    }

    #[test]
    fn reacquire_after_timeout_skips_os_release() {
        let (mut lock, clock, mut platform) = lock();
        lock.acquire(&mut platform).unwrap();
        clock.advance(TEN_MINUTES + Duration::from_secs(5));
        lock.acquire(&mut platform).unwrap();
        assert_eq!(platform.log().wake_lock_releases, 0);
        assert_eq!(platform.log().wake_lock_acquires.len(), 2);
        assert!(lock.is_held());
    }

    #[test]
    fn release_after_timeout_skips_os_release() {
        let (mut lock, clock, mut platform) = lock();
        lock.acquire(&mut platform).unwrap();
        clock.advance(TEN_MINUTES);
        lock.release(&mut platform);
        assert_eq!(platform.log().wake_lock_releases, 0);
        assert!(!lock.expire_if_due());
    }

    #[test]
    fn failed_acquire_leaves_lock_free() {
        let (mut lock, _, mut platform) = lock();
        platform.configure(|b| b.fail_wake_lock = true);
        assert!(lock.acquire(&mut platform).is_err());
        assert!(!lock.is_held());
    }
}

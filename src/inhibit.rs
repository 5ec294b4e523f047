//! Registry of outstanding lock inhibitions.
//!
//! Cookies are never expired: an inhibitor that dies without calling
//! `Uninhibit` keeps automatic locking suppressed until the daemon restarts.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::LockdError;

/// Identifier handed out by [`InhibitionRegistry::inhibit`].
pub type Cookie = u64;

/// Set of outstanding inhibition cookies.
#[derive(Debug, Default)]
pub struct InhibitionRegistry {
    tokens: BTreeSet<Cookie>,
    next_cookie: Cookie,
}

impl InhibitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new inhibition and return its cookie.
    pub fn inhibit(&mut self) -> Cookie {
        let cookie = self.next_cookie;
        self.next_cookie += 1;
        self.tokens.insert(cookie);
        debug!("Inhibition {} registered ({} outstanding)", cookie, self.tokens.len());
        cookie
    }

    /// Release the inhibition identified by `cookie`.
    pub fn uninhibit(&mut self, cookie: Cookie) -> Result<(), LockdError> {
        if !self.tokens.remove(&cookie) {
            return Err(LockdError::NotFound(cookie));
        }
        debug!("Inhibition {} released ({} outstanding)", cookie, self.tokens.len());
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_is_empty() {
        let registry = InhibitionRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_cookies_are_unique_and_increasing() {
        let mut registry = InhibitionRegistry::new();
        let a = registry.inhibit();
        let b = registry.inhibit();
        registry.uninhibit(b).unwrap();
        let c = registry.inhibit();

        assert!(a < b);
        assert!(b < c, "Released cookies must not be reused");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_empty_only_after_every_cookie_released() {
        let mut registry = InhibitionRegistry::new();
        let cookies: Vec<_> = (0..4).map(|_| registry.inhibit()).collect();

        // Release out of order
        for cookie in [cookies[2], cookies[0], cookies[3]] {
            registry.uninhibit(cookie).unwrap();
            assert!(!registry.is_empty());
        }

        registry.uninhibit(cookies[1]).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_uninhibit_unknown_cookie() {
        let mut registry = InhibitionRegistry::new();
        let cookie = registry.inhibit();

        let err = registry.uninhibit(cookie + 100).unwrap_err();
        assert!(matches!(err, LockdError::NotFound(c) if c == cookie + 100));
        assert_eq!(registry.len(), 1, "Failed uninhibit must not mutate the registry");
    }

    #[test]
    fn test_double_uninhibit_fails() {
        let mut registry = InhibitionRegistry::new();
        let cookie = registry.inhibit();
        let other = registry.inhibit();

        registry.uninhibit(cookie).unwrap();
        assert!(matches!(
            registry.uninhibit(cookie),
            Err(LockdError::NotFound(_))
        ));
        assert_eq!(registry.len(), 1);

        registry.uninhibit(other).unwrap();
        assert!(registry.is_empty());
    }
}

//! Shared token registry
//!
//! A concurrent mint -> [`Token`] map. The engine owns one registry per pool
//! (candidates, active trades, closed) and hands them to the loops as `Arc`s.
//! Every operation locks only the shard holding the key, so a reader never
//! observes a partially written token.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use tracing::debug;

use crate::token::Token;

/// Concurrent map of tracked tokens keyed by mint
pub struct TokenRegistry {
    name: &'static str,
    tokens: DashMap<Pubkey, Token>,
}

impl TokenRegistry {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            tokens: DashMap::new(),
        }
    }

    /// Registry name used in logs
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Copy of the token stored for `mint`
    pub fn get(&self, mint: &Pubkey) -> Option<Token> {
        self.tokens.get(mint).map(|entry| entry.value().clone())
    }

    /// Insert or replace a token
    ///
    /// `discovered_at` is set once: an existing entry keeps its timestamp, a
    /// new entry keeps the token's own or is stamped now.
    pub fn set(&self, mut token: Token) {
        let mint = *token.mint();
        match self.tokens.entry(mint) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get();
                token.discovered_at = existing
                    .discovered_at
                    .or(token.discovered_at)
                    .or_else(|| Some(Utc::now()));
                token.advance_revision(existing.revision());
                entry.insert(token);
            }
            Entry::Vacant(entry) => {
                token.discovered_at.get_or_insert_with(Utc::now);
                token.advance_revision(0);
                debug!("{}: added {}", self.name, mint);
                entry.insert(token);
            }
        }
    }

    /// Read-modify-write a token under its entry lock
    ///
    /// Returns `None` if the mint is not present.
    pub fn update<R>(&self, mint: &Pubkey, f: impl FnOnce(&mut Token) -> R) -> Option<R> {
        self.tokens.get_mut(mint).map(|mut entry| {
            let token = entry.value_mut();
            let result = f(token);
            let revision = token.revision();
            token.advance_revision(revision);
            result
        })
    }

    /// Remove and return a token
    pub fn remove(&self, mint: &Pubkey) -> Option<Token> {
        self.tokens.remove(mint).map(|(_, token)| token)
    }

    /// Delete a token; missing mints are a no-op
    pub fn delete(&self, mint: &Pubkey) {
        if self.tokens.remove(mint).is_some() {
            debug!("{}: deleted {}", self.name, mint);
        }
    }

    pub fn delete_all(&self) {
        self.tokens.clear();
    }

    pub fn count(&self) -> usize {
        self.tokens.len()
    }

    pub fn contains(&self, mint: &Pubkey) -> bool {
        self.tokens.contains_key(mint)
    }

    /// Deep copy of every entry
    pub fn snapshot(&self) -> HashMap<Pubkey, Token> {
        self.tokens
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tests::test_token;
    use chrono::Duration;
    use std::sync::Arc;

    #[test]
    fn test_set_get_count_delete() {
        let registry = TokenRegistry::new("candidates");
        let token = test_token();
        let mint = *token.mint();

        assert!(registry.get(&mint).is_none());
        registry.set(token);
        assert_eq!(registry.count(), 1);
        assert!(registry.contains(&mint));
        assert_eq!(registry.get(&mint).unwrap().mint(), &mint);

        registry.delete(&mint);
        registry.delete(&mint);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_delete_all() {
        let registry = TokenRegistry::new("candidates");
        for _ in 0..5 {
            registry.set(test_token());
        }
        assert_eq!(registry.count(), 5);
        registry.delete_all();
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_discovered_at_set_once() {
        let registry = TokenRegistry::new("candidates");
        let token = test_token();
        let mint = *token.mint();

        registry.set(token);
        let first = registry.get(&mint).unwrap().discovered_at.unwrap();

        // Re-setting with a different timestamp keeps the original
        let mut replacement = registry.get(&mint).unwrap();
        replacement.discovered_at = Some(first + Duration::hours(1));
        replacement.trading = true;
        registry.set(replacement);

        let stored = registry.get(&mint).unwrap();
        assert_eq!(stored.discovered_at, Some(first));
        assert!(stored.trading);
    }

    #[test]
    fn test_set_keeps_token_timestamp_on_first_insert() {
        let registry = TokenRegistry::new("active_trades");
        let mut token = test_token();
        let discovered = Utc::now() - Duration::minutes(3);
        token.discovered_at = Some(discovered);
        let mint = *token.mint();

        registry.set(token);
        assert_eq!(registry.get(&mint).unwrap().discovered_at, Some(discovered));
    }

    #[test]
    fn test_update_missing_returns_none() {
        let registry = TokenRegistry::new("candidates");
        assert!(registry.update(&Pubkey::new_unique(), |t| t.trading = true).is_none());
    }

    #[test]
    fn test_update_bumps_revision() {
        let registry = TokenRegistry::new("candidates");
        let token = test_token();
        let mint = *token.mint();
        registry.set(token);
        let before = registry.get(&mint).unwrap().revision();

        let result = registry.update(&mint, |t| {
            t.trading = true;
            t.history_len()
        });
        assert_eq!(result, Some(0));

        let stored = registry.get(&mint).unwrap();
        assert!(stored.trading);
        assert_eq!(stored.revision(), before + 1);
    }

    #[test]
    fn test_concurrent_updates_lose_nothing() {
        let registry = Arc::new(TokenRegistry::new("candidates"));
        let token = test_token();
        let mint = *token.mint();
        registry.set(token);
        let start = registry.get(&mint).unwrap().revision();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        registry.update(&mint, |_| ());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.get(&mint).unwrap().revision(), start + 800);
    }

    #[test]
    fn test_snapshot_never_sees_partial_writes() {
        let registry = Arc::new(TokenRegistry::new("candidates"));
        let mints: Vec<Pubkey> = (0..16)
            .map(|_| {
                let token = test_token();
                let mint = *token.mint();
                registry.set(token);
                mint
            })
            .collect();

        let writer = {
            let registry = registry.clone();
            let mints = mints.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    let mint = mints[i % mints.len()];
                    registry.update(&mint, |t| {
                        t.name = format!("gen-{}", i);
                        t.symbol = format!("gen-{}", i);
                    });
                }
            })
        };

        for _ in 0..200 {
            for token in registry.snapshot().values() {
                if token.name.starts_with("gen-") {
                    assert_eq!(token.name, token.symbol);
                }
            }
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let registry = TokenRegistry::new("candidates");
        let token = test_token();
        let mint = *token.mint();
        registry.set(token);

        let mut copy = registry.snapshot();
        copy.get_mut(&mint).unwrap().trading = true;
        assert!(!registry.get(&mint).unwrap().trading);
    }

    #[test]
    fn test_remove_returns_token() {
        let registry = TokenRegistry::new("active_trades");
        let token = test_token();
        let mint = *token.mint();
        registry.set(token);

        assert_eq!(registry.remove(&mint).unwrap().mint(), &mint);
        assert!(registry.remove(&mint).is_none());
    }
}

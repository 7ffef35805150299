// =============================================================================
// Symbol Set — the tracked universe
// =============================================================================
//
// Immutable between refreshes: readers clone an `Arc` to the current list and
// keep iterating it even if `replace` swaps in a new one meanwhile.  Tickers
// are never deleted, only deactivated, so historical analyses stay joinable.
// =============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::types::Symbol;

#[derive(Debug, Default)]
pub struct SymbolSet {
    inner: RwLock<Arc<BTreeMap<String, Symbol>>>,
}

impl SymbolSet {
    pub fn new(symbols: impl IntoIterator<Item = Symbol>) -> Self {
        Self {
            inner: RwLock::new(Arc::new(index(symbols))),
        }
    }

    /// Active symbols in lexical ticker order.
    pub fn active(&self) -> Vec<Symbol> {
        let current = self.inner.read().clone();
        current.values().filter(|s| s.active).cloned().collect()
    }

    /// Every known symbol, active or not, in lexical ticker order.
    pub fn all(&self) -> Vec<Symbol> {
        self.inner.read().values().cloned().collect()
    }

    pub fn get(&self, ticker: &str) -> Option<Symbol> {
        self.inner.read().get(ticker).cloned()
    }

    /// `true` when `ticker` is tracked and active.
    pub fn contains(&self, ticker: &str) -> bool {
        self.inner.read().get(ticker).is_some_and(|s| s.active)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Swap in a new universe. Tickers present before but missing from
    /// `symbols` are kept with `active = false`.
    pub fn replace(&self, symbols: impl IntoIterator<Item = Symbol>) {
        let mut next = index(symbols);
        let mut guard = self.inner.write();
        let mut deactivated = 0usize;
        for (ticker, old) in guard.iter() {
            if !next.contains_key(ticker) {
                let mut retired = old.clone();
                retired.active = false;
                next.insert(ticker.clone(), retired);
                deactivated += 1;
            }
        }
        *guard = Arc::new(next);
        info!(total = guard.len(), deactivated, "symbol set replaced");
    }
}

fn index(symbols: impl IntoIterator<Item = Symbol>) -> BTreeMap<String, Symbol> {
    symbols
        .into_iter()
        .map(|s| (s.ticker.clone(), s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> SymbolSet {
        let mut inactive = Symbol::new("AC.TO", "Air Canada");
        inactive.active = false;
        SymbolSet::new(vec![
            Symbol::new("TD.TO", "Toronto-Dominion Bank"),
            Symbol::new("RY.TO", "Royal Bank of Canada"),
            inactive,
            Symbol::new("BMO.TO", "Bank of Montreal"),
        ])
    }

    #[test]
    fn active_is_sorted_and_filtered() {
        let tickers: Vec<_> = set().active().into_iter().map(|s| s.ticker).collect();
        assert_eq!(tickers, vec!["BMO.TO", "RY.TO", "TD.TO"]);
    }

    #[test]
    fn contains_ignores_inactive() {
        let s = set();
        assert!(s.contains("RY.TO"));
        assert!(!s.contains("AC.TO"));
        assert!(!s.contains("ZZZ.TO"));
        assert!(s.get("AC.TO").is_some());
    }

    #[test]
    fn replace_deactivates_instead_of_deleting() {
        let s = set();
        s.replace(vec![Symbol::new("RY.TO", "Royal Bank of Canada")]);
        assert_eq!(s.len(), 4);
        assert!(s.contains("RY.TO"));
        assert!(!s.contains("TD.TO"));
        assert!(!s.get("TD.TO").unwrap().active);
        assert_eq!(s.active().len(), 1);
    }
}

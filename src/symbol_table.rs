use std::collections::HashMap;
use std::fmt;

use edit_distance::edit_distance;
use itertools::Itertools;

/// Information recorded for a declared label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolInfo {
    /// Address of the word the label precedes.
    pub address: usize,

    /// One-based source line of the declaration.
    pub line: usize,
}

/// Mapping from label names to addresses, built by the first assembler pass.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct SymbolTable {
    inner: HashMap<String, SymbolInfo>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            inner: HashMap::new(),
        }
    }

    /// Declares `label` at `address`.
    ///
    /// # Returns
    /// The previous declaration if the label has already been declared. The table is left
    /// unchanged in that case.
    pub(crate) fn define_symbol(&mut self, label: &str, address: usize, line: usize) -> Result<(), SymbolInfo> {
        if let Some(previous) = self.inner.get(label) {
            return Err(*previous);
        }

        self.inner.insert(label.to_string(), SymbolInfo { address, line });

        Ok(())
    }

    pub fn get_symbol_by_label<S: AsRef<str>>(&self, label: S) -> Option<&SymbolInfo> {
        self.inner.get(label.as_ref())
    }

    /// Returns the address of `label`.
    pub fn address<S: AsRef<str>>(&self, label: S) -> Option<usize> {
        self.get_symbol_by_label(label).map(|info| info.address)
    }

    /// Finds the declared label with the most similar spelling to `label`, if any is close
    /// enough to be a plausible typo.
    pub fn suggest(&self, label: &str) -> Option<&str> {
        suggest(label, self.inner.keys().map(String::as_str))
    }

    /// Iterates the symbols ordered by address, then by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SymbolInfo)> {
        self.inner.iter()
            .map(|(label, info)| (label.as_str(), info))
            .sorted_by_key(|(label, info)| (info.address, *label))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (label, info) in self.iter() {
            writeln!(f, "{:<12} {}", label, info.address)?;
        }

        Ok(())
    }
}

/// Returns the candidate closest to `word` within an edit distance of two.
pub(crate) fn suggest<'c, I>(word: &str, candidates: I) -> Option<&'c str>
where
    I: IntoIterator<Item = &'c str>,
{
    candidates.into_iter()
        .map(|candidate| (edit_distance(word, candidate), candidate))
        .filter(|(distance, _)| *distance > 0 && *distance <= 2)
        .min()
        .map(|(_, candidate)| candidate)
}

#[test]
fn test_define_and_lookup() {
    let mut table = SymbolTable::new();

    assert_eq!(table.define_symbol("start", 0, 1), Ok(()));
    assert_eq!(table.define_symbol("five", 7, 9), Ok(()));

    assert_eq!(table.address("start"), Some(0));
    assert_eq!(table.address("five"), Some(7));
    assert_eq!(table.address("six"), None);
    assert_eq!(table.len(), 2);
}

#[test]
fn test_duplicate_keeps_first() {
    let mut table = SymbolTable::new();

    table.define_symbol("L", 3, 4).unwrap();
    assert_eq!(table.define_symbol("L", 5, 6), Err(SymbolInfo { address: 3, line: 4 }));
    assert_eq!(table.address("L"), Some(3));
}

#[test]
fn test_suggest() {
    let mut table = SymbolTable::new();
    table.define_symbol("counter", 0, 1).unwrap();
    table.define_symbol("done", 1, 2).unwrap();

    assert_eq!(table.suggest("countr"), Some("counter"));
    assert_eq!(table.suggest("dnoe"), Some("done"));
    assert_eq!(table.suggest("elsewhere"), None);
}

#[test]
fn test_iter_is_ordered_by_address() {
    let mut table = SymbolTable::new();
    table.define_symbol("b", 2, 3).unwrap();
    table.define_symbol("a", 0, 1).unwrap();
    table.define_symbol("c", 2, 3).unwrap();

    let labels: Vec<_> = table.iter().map(|(label, _)| label).collect();
    assert_eq!(labels, vec!["a", "b", "c"]);
}

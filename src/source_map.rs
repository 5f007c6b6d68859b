//! Mapping between memory addresses and source lines.

use std::collections::HashMap;
use std::iter::FromIterator;

/// Mapping from memory addresses into the source lines that produced them. This type is generic
/// over the location type; the assembler produces one-based line numbers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMap<V> {
    inner: HashMap<usize, V>,
}

impl<V> FromIterator<(usize, V)> for SourceMap<V> {
    fn from_iter<I>(iter: I) -> Self
        where I: IntoIterator<Item = (usize, V)>
    {
        SourceMap {
            inner: HashMap::from_iter(iter),
        }
    }
}

impl<V> SourceMap<V> {
    pub fn new() -> SourceMap<V> {
        SourceMap {
            inner: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, addr: usize, location: V) {
        self.inner.insert(addr, location);
    }

    /// Returns the location in the original source code which
    /// defined the value for the given memory location.
    pub fn get_source(&self, addr: usize) -> Option<&V> {
        self.inner.get(&addr)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl SourceMap<usize> {
    /// Returns the text of the source line which produced the given memory location.
    pub fn source_line<'s>(&self, addr: usize, source: &'s str) -> Option<&'s str> {
        let line = *self.get_source(addr)?;
        source.lines().nth(line.checked_sub(1)?)
    }
}

#[test]
fn test_source_line() {
    let source = "# header\n  add 1 2 3\n\nhalt\n";
    let map: SourceMap<usize> = vec![(0, 2), (1, 4)].into_iter().collect();

    assert_eq!(map.source_line(0, source), Some("  add 1 2 3"));
    assert_eq!(map.source_line(1, source), Some("halt"));
    assert_eq!(map.source_line(2, source), None);
}

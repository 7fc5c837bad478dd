// SPDX-License-Identifier: MPL-2.0

//! Download/upload arrow glyphs

use std::fmt;

const DOWN_ARROWS: [&str; 8] = ["⇣", "↡", "⬇", "↓", "⇓", "⇩", "↧", "⇊"];
const UP_ARROWS: [&str; 8] = ["⇡", "↟", "⬆", "↑", "⇑", "⇧", "↥", "⇈"];

/// Index into the fixed table of arrow glyph pairs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrowPair(usize);

impl ArrowPair {
    pub const COUNT: usize = DOWN_ARROWS.len();

    pub fn new(index: usize) -> Option<Self> {
        (index < Self::COUNT).then_some(Self(index))
    }

    /// Looks a pair up by its download glyph.
    pub fn from_down_glyph(glyph: &str) -> Option<Self> {
        DOWN_ARROWS.iter().position(|down| *down == glyph).map(Self)
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn down(self) -> &'static str {
        DOWN_ARROWS[self.0]
    }

    pub fn up(self) -> &'static str {
        UP_ARROWS[self.0]
    }

    pub fn next(self) -> Self {
        Self((self.0 + 1) % Self::COUNT)
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..Self::COUNT).map(Self)
    }
}

impl fmt::Display for ArrowPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}) {}  -  {}", self.0 + 1, self.down(), self.up())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pair() {
        let pair = ArrowPair::default();
        assert_eq!(pair.down(), "⇣");
        assert_eq!(pair.up(), "⇡");
    }

    #[test]
    fn test_next_wraps_around() {
        let last = ArrowPair::new(7).unwrap();
        assert_eq!(last.down(), "⇊");
        assert_eq!(last.next(), ArrowPair::default());
        assert_eq!(ArrowPair::default().next().index(), 1);
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert_eq!(ArrowPair::new(8), None);
        assert!(ArrowPair::new(0).is_some());
    }

    #[test]
    fn test_from_down_glyph() {
        assert_eq!(ArrowPair::from_down_glyph("↓"), ArrowPair::new(3));
        assert_eq!(ArrowPair::from_down_glyph("↑"), None);
        assert_eq!(ArrowPair::from_down_glyph(""), None);
    }

    #[test]
    fn test_display_label() {
        assert_eq!(ArrowPair::new(3).unwrap().to_string(), "4) ↓  -  ↑");
    }

    #[test]
    fn test_all_pairs_distinct() {
        let downs: Vec<_> = ArrowPair::all().map(ArrowPair::down).collect();
        assert_eq!(downs.len(), 8);
        for (i, d) in downs.iter().enumerate() {
            assert!(!downs[i + 1..].contains(d));
        }
    }
}

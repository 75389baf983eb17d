//! Glyph widths for the 14 standard PDF fonts.
//!
//! AFM-derived glyph metrics. Used as a fallback when a simple
//! font's resource dictionary carries no `Widths` array (legal for the
//! standard fonts per ISO 32000-1 9.6.2.2) and no embedded font program is
//! present to measure glyphs from directly.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Per-glyph widths (in 1/1000 em units) for one of the standard fonts.
pub struct FontMetrics {
    /// Width to use when a character code has no explicit entry.
    pub default_width: u32,
    /// Character -> width, for the printable ASCII range.
    pub widths: HashMap<char, u32>,
}

/// AFM-derived widths for Helvetica. Bold/Oblique variants of the same
/// family reuse this table; real glyph programs differ slightly in the
/// bold stems but differences within the ASCII range are small enough that
/// Collapsed the same way here.
fn helvetica_widths() -> HashMap<char, u32> {
    let ascii: &[(char, u32)] = &[
        (' ', 278),
        ('!', 278),
        ('"', 355),
        ('#', 556),
        ('$', 556),
        ('%', 889),
        ('&', 667),
        ('\'', 191),
        ('(', 333),
        (')', 333),
        ('*', 389),
        ('+', 584),
        (',', 278),
        ('-', 333),
        ('.', 278),
        ('/', 278),
        ('0', 556),
        ('1', 556),
        ('2', 556),
        ('3', 556),
        ('4', 556),
        ('5', 556),
        ('6', 556),
        ('7', 556),
        ('8', 556),
        ('9', 556),
        (':', 278),
        (';', 278),
        ('<', 584),
        ('=', 584),
        ('>', 584),
        ('?', 556),
        ('@', 1015),
        ('[', 278),
        ('\\', 278),
        (']', 278),
        ('^', 469),
        ('_', 556),
        ('`', 333),
        ('{', 334),
        ('|', 260),
        ('}', 334),
        ('~', 584),
    ];
    let mut map: HashMap<char, u32> = ascii.iter().copied().collect();
    for (c, w) in [
        ('A', 667),
        ('B', 667),
        ('C', 722),
        ('D', 722),
        ('E', 667),
        ('F', 611),
        ('G', 778),
        ('H', 722),
        ('I', 278),
        ('J', 500),
        ('K', 667),
        ('L', 556),
        ('M', 833),
        ('N', 722),
        ('O', 778),
        ('P', 667),
        ('Q', 778),
        ('R', 722),
        ('S', 667),
        ('T', 611),
        ('U', 722),
        ('V', 667),
        ('W', 944),
        ('X', 667),
        ('Y', 667),
        ('Z', 611),
    ] {
        map.insert(c, w);
    }
    for (c, w) in [
        ('a', 556),
        ('b', 556),
        ('c', 500),
        ('d', 556),
        ('e', 556),
        ('f', 278),
        ('g', 556),
        ('h', 556),
        ('i', 222),
        ('j', 222),
        ('k', 500),
        ('l', 222),
        ('m', 833),
        ('n', 556),
        ('o', 556),
        ('p', 556),
        ('q', 556),
        ('r', 333),
        ('s', 500),
        ('t', 278),
        ('u', 556),
        ('v', 500),
        ('w', 722),
        ('x', 500),
        ('y', 500),
        ('z', 500),
    ] {
        map.insert(c, w);
    }
    map
}

/// AFM-derived widths for Times-Roman. Times-Bold/Italic variants reuse
/// this table for the same reason the Helvetica family does above.
fn times_widths() -> HashMap<char, u32> {
    let mut map = HashMap::new();
    for (c, w) in [
        (' ', 250),
        ('!', 333),
        ('"', 408),
        ('#', 500),
        ('$', 500),
        ('%', 833),
        ('&', 778),
        ('\'', 180),
        ('(', 333),
        (')', 333),
        ('*', 500),
        ('+', 564),
        (',', 250),
        ('-', 333),
        ('.', 250),
        ('/', 278),
        ('0', 500),
        ('1', 500),
        ('2', 500),
        ('3', 500),
        ('4', 500),
        ('5', 500),
        ('6', 500),
        ('7', 500),
        ('8', 500),
        ('9', 500),
        (':', 278),
        (';', 278),
        ('<', 564),
        ('=', 564),
        ('>', 564),
        ('?', 444),
        ('@', 921),
    ] {
        map.insert(c, w);
    }
    for (c, w) in [
        ('A', 722),
        ('B', 667),
        ('C', 667),
        ('D', 722),
        ('E', 611),
        ('F', 556),
        ('G', 722),
        ('H', 722),
        ('I', 333),
        ('J', 389),
        ('K', 722),
        ('L', 611),
        ('M', 889),
        ('N', 722),
        ('O', 722),
        ('P', 556),
        ('Q', 722),
        ('R', 667),
        ('S', 556),
        ('T', 611),
        ('U', 722),
        ('V', 722),
        ('W', 944),
        ('X', 722),
        ('Y', 722),
        ('Z', 611),
    ] {
        map.insert(c, w);
    }
    for (c, w) in [
        ('a', 444),
        ('b', 500),
        ('c', 444),
        ('d', 500),
        ('e', 444),
        ('f', 333),
        ('g', 500),
        ('h', 500),
        ('i', 278),
        ('j', 278),
        ('k', 500),
        ('l', 278),
        ('m', 778),
        ('n', 500),
        ('o', 500),
        ('p', 500),
        ('q', 500),
        ('r', 333),
        ('s', 389),
        ('t', 278),
        ('u', 500),
        ('v', 500),
        ('w', 722),
        ('x', 500),
        ('y', 500),
        ('z', 444),
    ] {
        map.insert(c, w);
    }
    map
}

/// Courier is fixed-pitch: every printable character, in every style, is
/// exactly 600/1000 em wide.
fn courier_widths() -> HashMap<char, u32> {
    (32u8..=126).map(|b| (b as char, 600)).collect()
}

/// Standard-14 metrics table, keyed by BaseFont name.
pub static FONT_METRICS: LazyLock<HashMap<&'static str, FontMetrics>> = LazyLock::new(|| {
    let mut m = HashMap::new();
    for name in [
        "Helvetica",
        "Helvetica-Bold",
        "Helvetica-Oblique",
        "Helvetica-BoldOblique",
        "Arial",
        "Arial,Bold",
        "Arial,Italic",
        "Arial,BoldItalic",
    ] {
        m.insert(
            name,
            FontMetrics {
                default_width: 556,
                widths: helvetica_widths(),
            },
        );
    }
    for name in [
        "Times-Roman",
        "Times-Bold",
        "Times-Italic",
        "Times-BoldItalic",
        "TimesNewRoman",
        "TimesNewRoman,Bold",
        "TimesNewRoman,Italic",
        "TimesNewRoman,BoldItalic",
    ] {
        m.insert(
            name,
            FontMetrics {
                default_width: 500,
                widths: times_widths(),
            },
        );
    }
    for name in [
        "Courier",
        "Courier-Bold",
        "Courier-Oblique",
        "Courier-BoldOblique",
    ] {
        m.insert(
            name,
            FontMetrics {
                default_width: 600,
                widths: courier_widths(),
            },
        );
    }
    m
});

/// Look up the Standard-14 metrics table for a BaseFont name, stripping a
/// subset-tag prefix (`ABCDEF+Helvetica` -> `Helvetica`) if present.
pub fn get_font_metrics(basefont: &str) -> Option<&'static FontMetrics> {
    let name = strip_subset_tag(basefont);
    FONT_METRICS.get(name)
}

fn strip_subset_tag(basefont: &str) -> &str {
    if basefont.len() > 7 && basefont.as_bytes()[6] == b'+' {
        let (tag, rest) = basefont.split_at(6);
        if tag.bytes().all(|b| b.is_ascii_uppercase()) {
            return &rest[1..];
        }
    }
    basefont
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_space_width() {
        let m = get_font_metrics("Helvetica").unwrap();
        assert_eq!(m.widths[&' '], 278);
    }

    #[test]
    fn subset_tag_is_stripped() {
        let m = get_font_metrics("ABCDEF+Courier").unwrap();
        assert_eq!(m.widths[&'A'], 600);
    }

    #[test]
    fn unknown_font_returns_none() {
        assert!(get_font_metrics("SomeEmbeddedFont").is_none());
    }
}

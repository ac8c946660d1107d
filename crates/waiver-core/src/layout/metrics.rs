//! Helvetica glyph metrics and greedy word wrap

/// Advance widths (1/1000 em) for printable ASCII 0x20..=0x7E, from the
/// Helvetica AFM shipped with the standard 14 fonts.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Advance widths for WinAnsiEncoding bytes 0x80..=0xFF. Slots the encoding
/// leaves undefined hold 0 and are never produced by [`win_ansi_byte`].
const HELVETICA_WIN_ANSI_HIGH: [u16; 128] = [
    556, 0, 222, 556, 333, 1000, 556, 556, 333, 1000, 667, 333, 1000, 0, 611, 0, // 0x80
    0, 222, 222, 333, 333, 350, 556, 1000, 333, 1000, 500, 333, 944, 0, 500, 667, // 0x90
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333, // 0xA0
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611, // 0xB0
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278, // 0xC0
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611, // 0xD0
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278, // 0xE0
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500, // 0xF0
];

/// Byte printed for characters WinAnsiEncoding cannot represent.
pub const REPLACEMENT_BYTE: u8 = b'?';

/// WinAnsiEncoding (Windows-1252) byte for `c`, if it has one.
pub fn win_ansi_byte(c: char) -> Option<u8> {
    let byte = match c {
        '\u{20}'..='\u{7E}' | '\u{A0}'..='\u{FF}' => c as u32 as u8,
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

/// Width of the glyph actually printed for `c`; unmappable characters are
/// measured as the replacement glyph they render as.
pub fn glyph_width(c: char) -> u16 {
    byte_width(win_ansi_byte(c).unwrap_or(REPLACEMENT_BYTE))
}

fn byte_width(byte: u8) -> u16 {
    match byte {
        0x20..=0x7E => HELVETICA_ASCII[(byte - 0x20) as usize],
        0x80..=0xFF => HELVETICA_WIN_ANSI_HIGH[(byte - 0x80) as usize],
        _ => HELVETICA_ASCII[(REPLACEMENT_BYTE - 0x20) as usize],
    }
}

/// Rendered width of `text` in points at `font_size`.
pub fn text_width(text: &str, font_size: f64) -> f64 {
    to_points(text_units(text), font_size)
}

fn text_units(text: &str) -> u32 {
    text.chars().map(|c| glyph_width(c) as u32).sum()
}

fn to_points(units: u32, font_size: f64) -> f64 {
    units as f64 * font_size / 1000.0
}

/// Break `text` into lines no wider than `max_width`.
///
/// Explicit newlines always break; spaces and tabs separate words. Words are
/// packed greedily with single spaces between them; a word that is wider than
/// a whole line on its own is split at character boundaries, which is the
/// only time a word is broken.
/// An empty paragraph yields an empty line so vertical spacing survives.
pub fn wrap_text(text: &str, max_width: f64, font_size: f64) -> Vec<String> {
    let fits = |units: u32| to_points(units, font_size) <= max_width;
    let space = glyph_width(' ') as u32;
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        let mut current = String::new();
        let mut current_units = 0u32;

        for word in paragraph.split([' ', '\t']).filter(|w| !w.is_empty()) {
            let word_units = text_units(word);

            if !current.is_empty() {
                if fits(current_units + space + word_units) {
                    current.push(' ');
                    current.push_str(word);
                    current_units += space + word_units;
                    continue;
                }
                lines.push(std::mem::take(&mut current));
            }

            current_units = if fits(word_units) {
                current.push_str(word);
                word_units
            } else {
                split_long_word(word, &fits, &mut lines, &mut current)
            };
        }

        lines.push(current);
    }

    lines
}

/// Emit full-width chunks of `word` into `lines`, leaving the remainder in
/// `current`. Returns the remainder's width in glyph units.
fn split_long_word(
    word: &str,
    fits: &dyn Fn(u32) -> bool,
    lines: &mut Vec<String>,
    current: &mut String,
) -> u32 {
    let mut units = 0u32;
    for c in word.chars() {
        let w = glyph_width(c) as u32;
        // always take at least one glyph per line, even if it alone overflows
        if !fits(units + w) && !current.is_empty() {
            lines.push(std::mem::take(current));
            units = 0;
        }
        current.push(c);
        units += w;
    }
    units
}

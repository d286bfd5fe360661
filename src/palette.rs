use crate::error::{WallmaskError, WallmaskResult};

/// A named palette entry. Parametrized styles carry one of these; the name
/// becomes part of the output filename, so it is stable and CamelCase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Color {
    pub name: &'static str,
    pub rgb: [u8; 3],
}

/// Fixed palette, sorted by name. `Black` and `White` must stay present:
/// `ColorOverlay_Black` / `ColorOverlay_White` are the canonical forms of the
/// old BlackOverlay / WhiteOverlay outputs.
const PALETTE_HEX: &[(&str, &str)] = &[
    ("Black", "#000000"),
    ("Blue", "#1e66f5"),
    ("Cyan", "#04a5e5"),
    ("Green", "#40a02b"),
    ("Magenta", "#dd7878"),
    ("Orange", "#fe640b"),
    ("Purple", "#8839ef"),
    ("Red", "#d20f39"),
    ("White", "#ffffff"),
    ("Yellow", "#df8e1d"),
];

pub fn all_colors() -> Vec<Color> {
    PALETTE_HEX
        .iter()
        .map(|(name, hex)| Color {
            name,
            rgb: parse_hex(hex).expect("static palette entries are valid hex"),
        })
        .collect()
}

/// Case-insensitive lookup, used by the CLI `--colors` subset flag.
pub fn color_by_name(name: &str) -> WallmaskResult<Color> {
    all_colors()
        .into_iter()
        .find(|c| c.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            let known = PALETTE_HEX
                .iter()
                .map(|(n, _)| *n)
                .collect::<Vec<_>>()
                .join(", ");
            WallmaskError::planning(format!("unknown color '{name}' (palette: {known})"))
        })
}

fn parse_hex(s: &str) -> Option<[u8; 3]> {
    let s = s.strip_prefix('#').unwrap_or(s);
    if s.len() != 6 {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).ok();
    Some([byte(0)?, byte(2)?, byte(4)?])
}

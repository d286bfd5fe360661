use crate::palette::Color;

/// A named composition rule. Closed sum type: base styles carry no parameter,
/// the three color families carry a palette [`Color`]. Composition dispatches
/// on this with one exhaustive match, never by string lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Style {
    Blur,
    Flip,
    InverseBlur,
    InverseBlurDarker,
    InverseNegate,
    InversePixelate,
    Negate,
    Pixelate,
    ThroughBlack,
    ColorOverlay(Color),
    ColorOverlayBlur(Color),
    ColorThrough(Color),
}

/// Wallpaper-scoped derived bitmap kinds. Each is a pure function of the
/// wallpaper pixels plus fixed parameters; none depends on a mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectKind {
    Blurred,
    BlurredDark,
    BlurredDarker,
    Brightened,
    Flipped,
    Negated,
    Pixelated,
}

impl EffectKind {
    pub fn stem(self) -> &'static str {
        match self {
            Self::Blurred => "blurred",
            Self::BlurredDark => "blurred_dark",
            Self::BlurredDarker => "blurred_darker",
            Self::Brightened => "brightened",
            Self::Flipped => "flipped",
            Self::Negated => "negated",
            Self::Pixelated => "pixelated",
        }
    }
}

impl Style {
    /// Canonical name; doubles as the output filename stem. Parametrized
    /// styles append the color name so distinct keys never collide.
    pub fn name(&self) -> String {
        match self {
            Self::Blur => "Blur".to_string(),
            Self::Flip => "Flip".to_string(),
            Self::InverseBlur => "InverseBlur".to_string(),
            Self::InverseBlurDarker => "InverseBlurDarker".to_string(),
            Self::InverseNegate => "InverseNegate".to_string(),
            Self::InversePixelate => "InversePixelate".to_string(),
            Self::Negate => "Negate".to_string(),
            Self::Pixelate => "Pixelate".to_string(),
            Self::ThroughBlack => "ThroughBlack".to_string(),
            Self::ColorOverlay(c) => format!("ColorOverlay_{}", c.name),
            Self::ColorOverlayBlur(c) => format!("ColorOverlayBlur_{}", c.name),
            Self::ColorThrough(c) => format!("ColorThrough_{}", c.name),
        }
    }

    /// Family name without the color parameter, used by the CLI subset flag.
    pub fn family(&self) -> &'static str {
        match self {
            Self::Blur => "Blur",
            Self::Flip => "Flip",
            Self::InverseBlur => "InverseBlur",
            Self::InverseBlurDarker => "InverseBlurDarker",
            Self::InverseNegate => "InverseNegate",
            Self::InversePixelate => "InversePixelate",
            Self::Negate => "Negate",
            Self::Pixelate => "Pixelate",
            Self::ThroughBlack => "ThroughBlack",
            Self::ColorOverlay(_) => "ColorOverlay",
            Self::ColorOverlayBlur(_) => "ColorOverlayBlur",
            Self::ColorThrough(_) => "ColorThrough",
        }
    }

    pub const BASE_FAMILIES: &'static [&'static str] = &[
        "Blur",
        "Flip",
        "InverseBlur",
        "InverseBlurDarker",
        "InverseNegate",
        "InversePixelate",
        "Negate",
        "Pixelate",
        "ThroughBlack",
    ];

    pub const COLOR_FAMILIES: &'static [&'static str] =
        &["ColorOverlay", "ColorOverlayBlur", "ColorThrough"];

    /// Static effect-dependency table. Exact set membership: an effect is
    /// derived for a wallpaper only when a missing style actually lists it.
    pub fn required_effects(&self) -> &'static [EffectKind] {
        match self {
            Self::Blur => &[EffectKind::BlurredDark, EffectKind::Brightened],
            Self::InverseBlur => &[EffectKind::BlurredDark],
            Self::InverseBlurDarker => &[EffectKind::BlurredDarker],
            Self::Flip => &[EffectKind::Flipped],
            Self::Negate | Self::InverseNegate => &[EffectKind::Negated],
            Self::Pixelate | Self::InversePixelate => &[EffectKind::Pixelated],
            Self::ColorOverlayBlur(_) => &[EffectKind::Blurred],
            Self::ThroughBlack | Self::ColorOverlay(_) | Self::ColorThrough(_) => &[],
        }
    }

    /// Whether the composition rule multiplies the base by the mask shadow.
    pub fn needs_shadow(&self) -> bool {
        matches!(
            self,
            Self::Blur
                | Self::Flip
                | Self::InverseBlur
                | Self::InverseBlurDarker
                | Self::ColorOverlay(_)
                | Self::ColorOverlayBlur(_)
        )
    }

    /// Whether the rule reads the full-chroma logo raster (rather than just
    /// the binary stencil). Only the ColorThrough family does.
    pub fn needs_logo(&self) -> bool {
        matches!(self, Self::ColorThrough(_))
    }

    /// All styles for a run: base styles plus each color family crossed with
    /// the color subset, sorted by name for deterministic enumeration.
    pub fn enumerate(colors: &[Color]) -> Vec<Style> {
        let mut styles = vec![
            Self::Blur,
            Self::Flip,
            Self::InverseBlur,
            Self::InverseBlurDarker,
            Self::InverseNegate,
            Self::InversePixelate,
            Self::Negate,
            Self::Pixelate,
            Self::ThroughBlack,
        ];
        for &c in colors {
            styles.push(Self::ColorOverlay(c));
            styles.push(Self::ColorOverlayBlur(c));
            styles.push(Self::ColorThrough(c));
        }
        styles.sort_by_key(|s| s.name());
        styles
    }
}

// WorkIndex sets are ordered by canonical name.
impl Ord for Style {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name().cmp(&other.name())
    }
}

impl PartialOrd for Style {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

//! Declarative transformation parameters.
//!
//! A [`TransformParams`] is what a caller asked for, parsed out of a query
//! string. It says nothing about *how* the pixels get changed; that is the
//! job of [`imaging`](crate::imaging), which resolves these parameters into a
//! concrete [`TransformOptions`](crate::imaging::TransformOptions) bag.
//!
//! ## Query vocabulary
//!
//! | Key | Type | Valid values |
//! |---|---|---|
//! | `w`, `h` | integer | 1–8192 |
//! | `q`, `quality` | integer | 1–100 |
//! | `format` | name | `jpeg` (`jpg`), `png`, `webp`, `gif`, `avif` |
//! | `thumbnail` | integer | 1–8192 (square edge) |
//! | `fit` | name | `cover`, `contain`, `fill`, `inside`, `outside` |
//! | `rotate` | integer | 0, 90, 180, 270 |
//! | `flip` | name | `h`, `v`, `both` |
//! | `blur` | float | 0.3–1000 |
//! | `sharpen` | float | >0–100 |
//! | `grayscale`, `greyscale` | flag | presence alone sets it |
//! | `gravity` | name | `center`, `north`, `south`, `east`, `west`, `northeast`, `northwest`, `southeast`, `southwest`, `smart` |
//! | `preset` | name | see [`Preset`] |
//!
//! Out-of-range values are rejected, never clamped. Unknown keys are ignored
//! and an empty value (`w=`) counts as unset.
//!
//! ## Presets
//!
//! A preset fills only fields the caller left unset, after all explicit
//! fields have been parsed:
//!
//! | preset | width | height | fit | quality | format | blur |
//! |---|---|---|---|---|---|---|
//! | `thumb` | 150 | 150 | cover | 80 | webp | – |
//! | `small` | 400 | – | – | 85 | webp | – |
//! | `medium` | 800 | – | – | 85 | webp | – |
//! | `large` | 1200 | – | – | 85 | webp | – |
//! | `hero` | 1920 | – | – | 90 | webp | – |
//! | `placeholder` | 20 | – | – | 20 | webp | 5 |

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest accepted edge for `w`, `h` and `thumbnail`.
pub const MAX_DIMENSION: u32 = 8192;

pub const BLUR_RANGE: (f32, f32) = (0.3, 1000.0);
pub const MAX_SHARPEN: f32 = 100.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamsError {
    #[error("{param}: {value:?} is not a valid number")]
    NotANumber { param: &'static str, value: String },
    #[error("{param} must be {expected}, got {value}")]
    OutOfRange {
        param: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("{param}: unknown value {value:?} (expected one of: {expected})")]
    UnknownValue {
        param: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Declares a closed vocabulary enum with `as_str`, `FromStr` and `Display`.
macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident, $param:literal {
            $($variant:ident => $text:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParamsError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($text $(| $alias)* => Ok($name::$variant),)+
                    _ => Err(ParamsError::UnknownValue {
                        param: $param,
                        value: s.to_string(),
                        expected: concat!($($text, " "),+).trim_ascii_end(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary! {
    /// How the image is fitted into a `w`×`h` box.
    Fit, "fit" {
        Cover => "cover",
        Contain => "contain",
        Fill => "fill",
        Inside => "inside",
        Outside => "outside",
    }
}

vocabulary! {
    Flip, "flip" {
        Horizontal => "h",
        Vertical => "v",
        Both => "both",
    }
}

vocabulary! {
    /// Crop anchor. The compound directions parse but degrade to a simpler
    /// anchor when resolved for the backend.
    Gravity, "gravity" {
        Center => "center",
        North => "north",
        South => "south",
        East => "east",
        West => "west",
        NorthEast => "northeast",
        NorthWest => "northwest",
        SouthEast => "southeast",
        SouthWest => "southwest",
        Smart => "smart",
    }
}

vocabulary! {
    OutputFormat, "format" {
        Jpeg => "jpeg" | "jpg",
        Png => "png",
        Webp => "webp",
        Gif => "gif",
        Avif => "avif",
    }
}

vocabulary! {
    /// Named bundle of defaults.
    Preset, "preset" {
        Thumb => "thumb",
        Small => "small",
        Medium => "medium",
        Large => "large",
        Hero => "hero",
        Placeholder => "placeholder",
    }
}

impl OutputFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Webp => "image/webp",
            OutputFormat::Gif => "image/gif",
            OutputFormat::Avif => "image/avif",
        }
    }

    /// Format implied by a file extension, if any.
    pub fn from_extension(ext: &str) -> Option<Self> {
        ext.parse().ok()
    }
}

/// Right-angle rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub fn from_degrees(degrees: i64) -> Result<Self, ParamsError> {
        match degrees {
            0 => Ok(Rotation::R0),
            90 => Ok(Rotation::R90),
            180 => Ok(Rotation::R180),
            270 => Ok(Rotation::R270),
            other => Err(ParamsError::OutOfRange {
                param: "rotate",
                expected: "one of 0, 90, 180, 270",
                value: other.to_string(),
            }),
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 90,
            Rotation::R180 => 180,
            Rotation::R270 => 270,
        }
    }
}

/// Values a preset contributes. `None` leaves the field alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetDefaults {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: Option<Fit>,
    pub quality: u8,
    pub format: OutputFormat,
    pub blur: Option<f32>,
}

impl Preset {
    pub fn defaults(self) -> PresetDefaults {
        let sized = |width, quality| PresetDefaults {
            width: Some(width),
            height: None,
            fit: None,
            quality,
            format: OutputFormat::Webp,
            blur: None,
        };
        match self {
            Preset::Thumb => PresetDefaults {
                height: Some(150),
                fit: Some(Fit::Cover),
                ..sized(150, 80)
            },
            Preset::Small => sized(400, 85),
            Preset::Medium => sized(800, 85),
            Preset::Large => sized(1200, 85),
            Preset::Hero => sized(1920, 90),
            Preset::Placeholder => PresetDefaults {
                blur: Some(5.0),
                ..sized(20, 20)
            },
        }
    }
}

/// A validated, defaulted transformation request.
///
/// Fields are private: every way of populating one goes through its
/// validating setter, so a `TransformParams` value is always valid.
/// Setters for free-form numbers return `Result`; setters for closed
/// vocabularies cannot fail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformParams {
    width: Option<u32>,
    height: Option<u32>,
    quality: Option<u8>,
    format: Option<OutputFormat>,
    thumbnail: Option<u32>,
    fit: Option<Fit>,
    rotate: Option<Rotation>,
    flip: Option<Flip>,
    blur: Option<f32>,
    sharpen: Option<f32>,
    grayscale: bool,
    gravity: Option<Gravity>,
    preset: Option<Preset>,
}

fn check_dimension(param: &'static str, value: u32) -> Result<u32, ParamsError> {
    if (1..=MAX_DIMENSION).contains(&value) {
        Ok(value)
    } else {
        Err(ParamsError::OutOfRange {
            param,
            expected: "between 1 and 8192",
            value: value.to_string(),
        })
    }
}

impl TransformParams {
    /// Parse a query string. Accepts a bare query (`w=1&h=2`), one with a
    /// leading `?`, or a full URL.
    pub fn from_query(query: &str) -> Result<Self, ParamsError> {
        let query = match query.split_once('?') {
            Some((_, q)) => q,
            None if query.contains("://") => "",
            None => query,
        };
        let query = query.split('#').next().unwrap_or_default();
        let pairs = url::form_urlencoded::parse(query.as_bytes());
        Self::from_pairs(pairs.map(|(k, v)| (k.into_owned(), v.into_owned())))
    }

    /// Build from already-decoded key/value pairs, then apply the preset.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ParamsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            if matches!(key, "grayscale" | "greyscale") {
                params.grayscale = true;
                continue;
            }
            if value.is_empty() {
                continue;
            }
            params = match key {
                "w" => params.with_width(parse_number("width", value)?)?,
                "h" => params.with_height(parse_number("height", value)?)?,
                "q" | "quality" => params.with_quality(parse_number("quality", value)?)?,
                "thumbnail" => params.with_thumbnail(parse_number("thumbnail", value)?)?,
                "rotate" => params.with_rotate(Rotation::from_degrees(parse_number(
                    "rotate", value,
                )?)?),
                "sharpen" => params.with_sharpen(parse_number("sharpen", value)?)?,
                "blur" => params.with_blur(parse_number("blur", value)?)?,
                "fit" => params.with_fit(value.parse()?),
                "flip" => params.with_flip(value.parse()?),
                "gravity" => params.with_gravity(value.parse()?),
                "format" => params.with_format(value.parse()?),
                "preset" => params.with_preset(value.parse()?),
                _ => params,
            };
        }
        Ok(params.expand_preset())
    }

    // -------------------------------------------------------------------------
    // Validating setters
    // -------------------------------------------------------------------------

    pub fn with_width(mut self, width: u32) -> Result<Self, ParamsError> {
        self.width = Some(check_dimension("width", width)?);
        Ok(self)
    }

    pub fn with_height(mut self, height: u32) -> Result<Self, ParamsError> {
        self.height = Some(check_dimension("height", height)?);
        Ok(self)
    }

    pub fn with_thumbnail(mut self, edge: u32) -> Result<Self, ParamsError> {
        self.thumbnail = Some(check_dimension("thumbnail", edge)?);
        Ok(self)
    }

    /// Quality must be 1–100 inclusive.
    pub fn with_quality(mut self, quality: i64) -> Result<Self, ParamsError> {
        if !(1..=100).contains(&quality) {
            return Err(ParamsError::OutOfRange {
                param: "quality",
                expected: "between 1 and 100",
                value: quality.to_string(),
            });
        }
        self.quality = Some(quality as u8);
        Ok(self)
    }

    pub fn with_blur(mut self, sigma: f32) -> Result<Self, ParamsError> {
        let (min, max) = BLUR_RANGE;
        if !(min..=max).contains(&sigma) {
            return Err(ParamsError::OutOfRange {
                param: "blur",
                expected: "between 0.3 and 1000",
                value: sigma.to_string(),
            });
        }
        self.blur = Some(sigma);
        Ok(self)
    }

    pub fn with_sharpen(mut self, radius: f32) -> Result<Self, ParamsError> {
        if !(radius > 0.0 && radius <= MAX_SHARPEN) {
            return Err(ParamsError::OutOfRange {
                param: "sharpen",
                expected: "greater than 0 and at most 100",
                value: radius.to_string(),
            });
        }
        self.sharpen = Some(radius);
        Ok(self)
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_fit(mut self, fit: Fit) -> Self {
        self.fit = Some(fit);
        self
    }

    pub fn with_rotate(mut self, rotate: Rotation) -> Self {
        self.rotate = Some(rotate);
        self
    }

    pub fn with_flip(mut self, flip: Flip) -> Self {
        self.flip = Some(flip);
        self
    }

    pub fn with_gravity(mut self, gravity: Gravity) -> Self {
        self.gravity = Some(gravity);
        self
    }

    pub fn with_grayscale(mut self, grayscale: bool) -> Self {
        self.grayscale = grayscale;
        self
    }

    /// Record the preset name. Its defaults are filled in by
    /// [`expand_preset`](Self::expand_preset).
    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.preset = Some(preset);
        self
    }

    /// Fill still-unset fields from the preset. Explicit values win.
    pub fn expand_preset(mut self) -> Self {
        let Some(preset) = self.preset else {
            return self;
        };
        let d = preset.defaults();
        self.width = self.width.or(d.width);
        self.height = self.height.or(d.height);
        self.fit = self.fit.or(d.fit);
        self.quality = self.quality.or(Some(d.quality));
        self.format = self.format.or(Some(d.format));
        self.blur = self.blur.or(d.blur);
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn width(&self) -> Option<u32> {
        self.width
    }

    pub fn height(&self) -> Option<u32> {
        self.height
    }

    pub fn quality(&self) -> Option<u8> {
        self.quality
    }

    pub fn format(&self) -> Option<OutputFormat> {
        self.format
    }

    pub fn thumbnail(&self) -> Option<u32> {
        self.thumbnail
    }

    pub fn fit(&self) -> Option<Fit> {
        self.fit
    }

    pub fn rotate(&self) -> Option<Rotation> {
        self.rotate
    }

    pub fn flip(&self) -> Option<Flip> {
        self.flip
    }

    pub fn blur(&self) -> Option<f32> {
        self.blur
    }

    pub fn sharpen(&self) -> Option<f32> {
        self.sharpen
    }

    pub fn grayscale(&self) -> bool {
        self.grayscale
    }

    pub fn gravity(&self) -> Option<Gravity> {
        self.gravity
    }

    pub fn preset(&self) -> Option<Preset> {
        self.preset
    }

    /// True when the caller asked for nothing at all (the web-defaults case).
    ///
    /// `fit` and `gravity` alone don't count: without a target size they
    /// have nothing to act on.
    pub fn is_empty(&self) -> bool {
        self.width.is_none()
            && self.height.is_none()
            && self.quality.is_none()
            && self.format.is_none()
            && self.thumbnail.is_none()
            && self.rotate.is_none()
            && self.flip.is_none()
            && self.blur.is_none()
            && self.sharpen.is_none()
            && !self.grayscale
            && self.preset.is_none()
    }

    /// Stable textual form covering every field in a fixed order, with `-`
    /// for unset values. Feeds the cache-key hash.
    pub fn canonical_string(&self) -> String {
        fn opt<T: fmt::Display>(v: Option<T>) -> String {
            v.map_or_else(|| "-".to_string(), |v| v.to_string())
        }
        format!(
            "w={};h={};q={};format={};thumbnail={};fit={};rotate={};flip={};blur={};sharpen={};grayscale={};gravity={};preset={}",
            opt(self.width),
            opt(self.height),
            opt(self.quality),
            opt(self.format),
            opt(self.thumbnail),
            opt(self.fit),
            opt(self.rotate.map(Rotation::degrees)),
            opt(self.flip),
            opt(self.blur),
            opt(self.sharpen),
            u8::from(self.grayscale),
            opt(self.gravity),
            opt(self.preset),
        )
    }
}

fn parse_number<T: FromStr>(param: &'static str, value: &str) -> Result<T, ParamsError> {
    value.parse().map_err(|_| ParamsError::NotANumber {
        param,
        value: value.to_string(),
    })
}

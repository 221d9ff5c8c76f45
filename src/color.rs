//! Parsing the textual color a color-picker helper prints.
//!
//! Exactly two forms are accepted, `rgb(r,g,b)` and `rgba(r,g,b,a)`, with
//! 0–255 channels and an alpha in 0–1. Whitespace around the whole reply
//! is trimmed; nothing inside it is tolerated.

use std::sync::LazyLock;

use regex::Regex;

static COLOR_REPLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(rgba?)\((\d{1,3}),(\d{1,3}),(\d{1,3})(?:,(\d+(?:\.\d+)?))?\)$")
        .expect("color reply pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorError {
    #[error("not an rgb()/rgba() color: {0:?}")]
    Malformed(String),

    #[error("channel value {0} out of range 0-255")]
    Channel(u16),

    #[error("alpha {0} out of range 0-1")]
    Alpha(String),
}

/// Parse `rgb(r,g,b)` (alpha 1.0) or `rgba(r,g,b,a)`.
pub fn parse_color_reply(reply: &str) -> Result<Rgba, ColorError> {
    let trimmed = reply.trim();
    let malformed = || ColorError::Malformed(trimmed.to_owned());
    let caps = COLOR_REPLY.captures(trimmed).ok_or_else(malformed)?;

    // rgb takes no alpha, rgba requires one.
    let has_alpha = &caps[1] == "rgba";
    if has_alpha != caps.get(5).is_some() {
        return Err(malformed());
    }

    let channel = |i: usize| -> Result<u8, ColorError> {
        let value: u16 = caps[i].parse().map_err(|_| malformed())?;
        u8::try_from(value).map_err(|_| ColorError::Channel(value))
    };
    let (r, g, b) = (channel(2)?, channel(3)?, channel(4)?);

    let a = match caps.get(5) {
        Some(m) => {
            let a: f32 = m.as_str().parse().map_err(|_| malformed())?;
            if !(0.0..=1.0).contains(&a) {
                return Err(ColorError::Alpha(m.as_str().to_owned()));
            }
            a
        }
        None => 1.0,
    };

    Ok(Rgba { r, g, b, a })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_is_opaque() {
        assert_eq!(
            parse_color_reply("rgb(255,128,0)").unwrap(),
            Rgba {
                r: 255,
                g: 128,
                b: 0,
                a: 1.0
            }
        );
    }

    #[test]
    fn rgba_keeps_alpha() {
        let c = parse_color_reply("rgba(1,2,3,0.25)").unwrap();
        assert_eq!((c.r, c.g, c.b), (1, 2, 3));
        assert_eq!(c.a, 0.25);
        assert_eq!(parse_color_reply("rgba(0,0,0,1)").unwrap().a, 1.0);
        assert_eq!(parse_color_reply("rgba(0,0,0,0)").unwrap().a, 0.0);
    }

    #[test]
    fn outer_whitespace_is_trimmed() {
        assert!(parse_color_reply("  rgb(0,0,0)\n").is_ok());
    }

    #[test]
    fn inner_whitespace_is_rejected() {
        assert!(matches!(
            parse_color_reply("rgb(0, 0, 0)"),
            Err(ColorError::Malformed(_))
        ));
    }

    #[test]
    fn alpha_must_match_the_form() {
        assert!(matches!(
            parse_color_reply("rgb(0,0,0,0.5)"),
            Err(ColorError::Malformed(_))
        ));
        assert!(matches!(
            parse_color_reply("rgba(0,0,0)"),
            Err(ColorError::Malformed(_))
        ));
    }

    #[test]
    fn out_of_range_values() {
        assert_eq!(
            parse_color_reply("rgb(256,0,0)"),
            Err(ColorError::Channel(256))
        );
        assert_eq!(
            parse_color_reply("rgba(0,0,0,1.5)"),
            Err(ColorError::Alpha("1.5".into()))
        );
    }

    #[test]
    fn other_notations_are_rejected() {
        for reply in ["#ff0000", "RGB(0,0,0)", "hsl(0,0%,0%)", "rgb(0,0,0);", "", "rgb(-1,0,0)"] {
            assert!(parse_color_reply(reply).is_err(), "{reply:?} accepted");
        }
    }
}

/// Names the host wants tried first.
pub const AUDIO_DRIVER_ENV: &str = "RETROPLAT_AUDIO_DRIVER";
pub const VIDEO_DRIVER_ENV: &str = "RETROPLAT_VIDEO_DRIVER";

/// Driver names requested by the environment, in the order given.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DriverHints {
    pub audio: Vec<String>,
    pub video: Vec<String>,
}

impl DriverHints {
    pub fn from_env() -> Self {
        Self {
            audio: parse_hint(std::env::var(AUDIO_DRIVER_ENV).ok().as_deref()),
            video: parse_hint(std::env::var(VIDEO_DRIVER_ENV).ok().as_deref()),
        }
    }
}

/// Split a comma-separated list of driver names. Names are compared case-insensitively so
/// they are lowercased here.
pub fn parse_hint(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_lists() {
        assert!(parse_hint(None).is_empty());
        assert!(parse_hint(Some(" , ")).is_empty());
        assert_eq!(parse_hint(Some("VESA")), vec!["vesa"]);
        assert_eq!(
            parse_hint(Some("notcurses, vesa,,")),
            vec!["notcurses", "vesa"]
        );
    }
}

use std::fmt::Display;

/// Average bitrate of an audio stream, in kbps
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Bitrate(f64);

impl Bitrate {
    pub fn from_kbps(kbps: f64) -> Self {
        Self(kbps)
    }
}

impl Display for Bitrate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}kbps", self.0.round())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_rounded_kbps() {
        assert_eq!(Bitrate::from_kbps(128.).0, 128.0);
        assert_eq!(Bitrate::from_kbps(129.478).to_string(), "129kbps");
        assert!(Bitrate::from_kbps(48.) < Bitrate::from_kbps(129.5));
    }
}

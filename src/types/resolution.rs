use std::{fmt::Display, str::FromStr};

/// Vertical resolution of a video stream, displayed as e.g. "1080p"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Resolution(u32);

impl Resolution {
    pub fn from_height(height: u32) -> Self {
        Self(height)
    }
}

impl FromStr for Resolution {
    type Err = Box<dyn std::error::Error + Sync + Send>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(num_prefix) = s.trim().to_lowercase().strip_suffix('p') {
            Ok(Self(num_prefix.parse()?))
        } else {
            Err(Box::from("Resolution does not end with 'p'"))
        }
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}p", self.0)
    }
}

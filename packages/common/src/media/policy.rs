use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Named target resolution for a derived image variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Thumb,
    Small,
    Medium,
    Large,
    Original,
}

impl SizeClass {
    /// Every size class, in ascending width order with `Original` last.
    pub const ALL: [SizeClass; 5] = [
        SizeClass::Thumb,
        SizeClass::Small,
        SizeClass::Medium,
        SizeClass::Large,
        SizeClass::Original,
    ];

    /// The suffix appended to object names, e.g. `thumb` in `x-thumb.webp`.
    pub fn suffix(self) -> &'static str {
        match self {
            SizeClass::Thumb => "thumb",
            SizeClass::Small => "small",
            SizeClass::Medium => "medium",
            SizeClass::Large => "large",
            SizeClass::Original => "original",
        }
    }

    /// Inverse of [`SizeClass::suffix`].
    pub fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "thumb" => Some(SizeClass::Thumb),
            "small" => Some(SizeClass::Small),
            "medium" => Some(SizeClass::Medium),
            "large" => Some(SizeClass::Large),
            "original" => Some(SizeClass::Original),
            _ => None,
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for SizeClass {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SizeClass::from_suffix(s).ok_or(())
    }
}

/// Target width and re-encode quality for one resized class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassTarget {
    pub width: u32,
    pub quality: u8,
}

/// Immutable variant-generation policy, injected into the generator.
///
/// Changing the table only affects new uploads; already-stored variants keep
/// the dimensions they were generated with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizePolicy {
    thumb: ClassTarget,
    small: ClassTarget,
    medium: ClassTarget,
    large: ClassTarget,
    original_quality: u8,
}

impl SizePolicy {
    pub fn new(
        thumb: ClassTarget,
        small: ClassTarget,
        medium: ClassTarget,
        large: ClassTarget,
        original_quality: u8,
    ) -> Self {
        Self {
            thumb,
            small,
            medium,
            large,
            original_quality,
        }
    }

    /// Target width for a class. `None` for `Original`, which keeps native
    /// dimensions.
    pub fn target_width(&self, class: SizeClass) -> Option<u32> {
        match class {
            SizeClass::Thumb => Some(self.thumb.width),
            SizeClass::Small => Some(self.small.width),
            SizeClass::Medium => Some(self.medium.width),
            SizeClass::Large => Some(self.large.width),
            SizeClass::Original => None,
        }
    }

    pub fn quality(&self, class: SizeClass) -> u8 {
        match class {
            SizeClass::Thumb => self.thumb.quality,
            SizeClass::Small => self.small.quality,
            SizeClass::Medium => self.medium.quality,
            SizeClass::Large => self.large.quality,
            SizeClass::Original => self.original_quality,
        }
    }
}

impl Default for SizePolicy {
    fn default() -> Self {
        Self {
            thumb: ClassTarget {
                width: 112,
                quality: 70,
            },
            small: ClassTarget {
                width: 400,
                quality: 75,
            },
            medium: ClassTarget {
                width: 800,
                quality: 80,
            },
            large: ClassTarget {
                width: 1200,
                quality: 85,
            },
            original_quality: 90,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_round_trip() {
        for class in SizeClass::ALL {
            assert_eq!(SizeClass::from_suffix(class.suffix()), Some(class));
        }
        assert_eq!(SizeClass::from_suffix("xl"), None);
    }

    #[test]
    fn default_policy_matches_table() {
        let policy = SizePolicy::default();
        assert_eq!(policy.target_width(SizeClass::Thumb), Some(112));
        assert_eq!(policy.target_width(SizeClass::Small), Some(400));
        assert_eq!(policy.target_width(SizeClass::Medium), Some(800));
        assert_eq!(policy.target_width(SizeClass::Large), Some(1200));
        assert_eq!(policy.target_width(SizeClass::Original), None);

        assert_eq!(policy.quality(SizeClass::Thumb), 70);
        assert_eq!(policy.quality(SizeClass::Small), 75);
        assert_eq!(policy.quality(SizeClass::Medium), 80);
        assert_eq!(policy.quality(SizeClass::Large), 85);
        assert_eq!(policy.quality(SizeClass::Original), 90);
    }

    #[test]
    fn alternate_policy_is_injectable() {
        let policy = SizePolicy::new(
            ClassTarget {
                width: 64,
                quality: 50,
            },
            ClassTarget {
                width: 128,
                quality: 55,
            },
            ClassTarget {
                width: 256,
                quality: 60,
            },
            ClassTarget {
                width: 512,
                quality: 65,
            },
            80,
        );
        assert_eq!(policy.target_width(SizeClass::Thumb), Some(64));
        assert_eq!(policy.quality(SizeClass::Original), 80);
    }
}

//! Size-tier policy for handlers that keep several representations of one image

use std::fmt;

use crate::request::Request;

/// Representation tiers, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SizeTier {
    Micro,
    Mini,
    Full,
}

impl SizeTier {
    /// The tier to try when this one has no stored representation.
    pub fn next_larger(self) -> Option<SizeTier> {
        match self {
            SizeTier::Micro => Some(SizeTier::Mini),
            SizeTier::Mini => Some(SizeTier::Full),
            SizeTier::Full => None,
        }
    }
}

impl fmt::Display for SizeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SizeTier::Micro => "micro",
            SizeTier::Mini => "mini",
            SizeTier::Full => "full",
        })
    }
}

/// Picks the cheapest tier whose native resolution covers a target size.
///
/// A target fits a tier when both dimensions are within the tier bound;
/// either dimension exceeding it moves the request up a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPolicy {
    pub micro_max: (u32, u32),
    pub mini_max: (u32, u32),
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self {
            micro_max: (96, 96),
            mini_max: (512, 384),
        }
    }
}

impl TierPolicy {
    pub fn new(micro_max: (u32, u32), mini_max: (u32, u32)) -> Self {
        Self {
            micro_max,
            mini_max,
        }
    }

    pub fn select(&self, width: u32, height: u32) -> SizeTier {
        if fits(width, height, self.micro_max) {
            SizeTier::Micro
        } else if fits(width, height, self.mini_max) {
            SizeTier::Mini
        } else {
            SizeTier::Full
        }
    }

    /// Requests without a target size always need the full representation.
    pub fn select_for(&self, request: &Request) -> SizeTier {
        if request.has_size() {
            self.select(request.target_width(), request.target_height())
        } else {
            SizeTier::Full
        }
    }
}

fn fits(width: u32, height: u32, (max_w, max_h): (u32, u32)) -> bool {
    width <= max_w && height <= max_h
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestBuilder;

    #[test]
    fn test_micro_tier() {
        let policy = TierPolicy::default();
        assert_eq!(policy.select(96, 96), SizeTier::Micro);
        assert_eq!(policy.select(95, 95), SizeTier::Micro);
    }

    #[test]
    fn test_mini_tier() {
        let policy = TierPolicy::default();
        assert_eq!(policy.select(512, 384), SizeTier::Mini);
        assert_eq!(policy.select(100, 100), SizeTier::Mini);
        assert_eq!(policy.select(97, 96), SizeTier::Mini);
    }

    #[test]
    fn test_full_tier() {
        let policy = TierPolicy::default();
        assert_eq!(policy.select(513, 385), SizeTier::Full);
        assert_eq!(policy.select(1000, 1000), SizeTier::Full);
        assert_eq!(policy.select(1000, 384), SizeTier::Full);
        assert_eq!(policy.select(1000, 96), SizeTier::Full);
        assert_eq!(policy.select(96, 1000), SizeTier::Full);
    }

    #[test]
    fn test_select_for_request() {
        let policy = TierPolicy::default();
        let unsized_request = RequestBuilder::from_resource(1).unwrap().build().unwrap();
        assert_eq!(policy.select_for(&unsized_request), SizeTier::Full);

        let thumb = unsized_request.build_upon().resize(64, 48).unwrap().build().unwrap();
        assert_eq!(policy.select_for(&thumb), SizeTier::Micro);
    }

    #[test]
    fn test_custom_bounds_and_fallback_chain() {
        let policy = TierPolicy::new((32, 32), (128, 128));
        assert_eq!(policy.select(64, 64), SizeTier::Mini);
        assert_eq!(SizeTier::Micro.next_larger(), Some(SizeTier::Mini));
        assert_eq!(SizeTier::Mini.next_larger(), Some(SizeTier::Full));
        assert_eq!(SizeTier::Full.next_larger(), None);
    }
}

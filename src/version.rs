//! A strict 3-part version number: `major.minor.micro`.
//!
//! Unlike the `semver` crate's `Version`, this type has no pre-release or
//! build-metadata segments — the wire format this crate speaks to (and signs)
//! is exactly three dot-separated decimal integers, and parsing anything else
//! is a hard error.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct VersionNumber {
    pub major: u64,
    pub minor: u64,
    pub micro: u64,
}

impl VersionNumber {
    pub const ZERO: VersionNumber = VersionNumber { major: 0, minor: 0, micro: 0 };

    pub fn new(major: u64, minor: u64, micro: u64) -> Self {
        Self { major, minor, micro }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let parts: Vec<&str> = input.split('.').collect();
        if parts.len() != 3 {
            return Err(Error::Parse {
                input: input.to_string(),
                reason: "expected exactly three dot-separated segments".into(),
            });
        }
        let parse_segment = |s: &str| -> Result<u64> {
            s.parse::<u64>().map_err(|e| Error::Parse {
                input: input.to_string(),
                reason: format!("segment '{s}' is not a non-negative integer: {e}"),
            })
        };
        Ok(VersionNumber {
            major: parse_segment(parts[0])?,
            minor: parse_segment(parts[1])?,
            micro: parse_segment(parts[2])?,
        })
    }

    /// Lexicographic comparison on (major, minor, micro); kept as a named
    /// function to mirror the origin implementation's `CompareVersion`, which
    /// callers may prefer to the `Ord` impl when comparing explicitly.
    pub fn compare(&self, other: &VersionNumber) -> Ordering {
        self.cmp(other)
    }

    pub fn is_zero(&self) -> bool {
        *self == VersionNumber::ZERO
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

impl FromStr for VersionNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        VersionNumber::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_well_formed_input() {
        for s in ["0.0.0", "1.2.3", "10.20.30", "999.0.1"] {
            let v = VersionNumber::parse(s).unwrap();
            assert_eq!(v.to_string(), s);
        }
    }

    #[test]
    fn rejects_malformed_input() {
        for s in ["1.2", "1.2.3.4", "a.b.c", "1..3", "", "1.2.-3", " 1.2.3"] {
            assert!(VersionNumber::parse(s).is_err(), "expected '{s}' to be rejected");
        }
    }

    #[test]
    fn orders_lexicographically() {
        let a = VersionNumber::new(1, 0, 0);
        let b = VersionNumber::new(1, 2, 0);
        let c = VersionNumber::new(1, 2, 1);
        assert!(a < b);
        assert!(b < c);
        assert!(a < c);
        assert_eq!(a.compare(&a), Ordering::Equal);
    }

    #[test]
    fn total_order_is_transitive_and_antisymmetric() {
        let versions = [
            VersionNumber::new(0, 0, 0),
            VersionNumber::new(0, 1, 0),
            VersionNumber::new(1, 0, 0),
            VersionNumber::new(1, 0, 1),
            VersionNumber::new(2, 2, 2),
        ];
        for a in &versions {
            for b in &versions {
                for c in &versions {
                    if a <= b && b <= c {
                        assert!(a <= c);
                    }
                    if a < b {
                        assert!(!(b < a));
                    }
                }
            }
        }
    }

    #[test]
    fn zero_version_is_default() {
        assert_eq!(VersionNumber::default(), VersionNumber::ZERO);
        assert!(VersionNumber::ZERO.is_zero());
    }
}

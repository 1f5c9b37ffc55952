//! Decode status lattice shared by every decoder.

/// Outcome rank for a scan/decode call.
///
/// Ranks form a total order `Ok < OutputTruncated < Unsupported < Malformed <
/// LimitExceeded`; merging two statuses keeps the higher rank. Each decoder
/// carries exactly one status variable and only ever merges into it, so a
/// partial success never masks a structural failure seen earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[must_use]
#[repr(u8)]
pub enum Status {
    /// Success; all decoded facts are in the store.
    #[default]
    Ok = 0,
    /// A caller-provided output buffer was too small; `needed` counters say
    /// how large to re-provision.
    OutputTruncated = 1,
    /// The bytes are not of the declared kind (signature or version
    /// mismatch), or an optional codec is unavailable.
    Unsupported = 2,
    /// Structurally invalid input: out-of-bounds offsets, inconsistent
    /// sizes, truncated records, forbidden flag bits.
    Malformed = 3,
    /// A configured resource bound was reached; parsing halted for the
    /// affected region.
    LimitExceeded = 4,
}

impl Status {
    /// Merge two statuses, keeping the higher rank.
    #[inline]
    pub fn merge(self, other: Status) -> Status {
        if other > self {
            other
        } else {
            self
        }
    }

    /// Merge `other` into `self` in place.
    #[inline]
    pub fn absorb(&mut self, other: Status) {
        *self = self.merge(other);
    }

    /// True when the status is [`Status::Ok`].
    #[inline]
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Status; 5] = [
        Status::Ok,
        Status::OutputTruncated,
        Status::Unsupported,
        Status::Malformed,
        Status::LimitExceeded,
    ];

    #[test]
    fn merge_keeps_higher_rank() {
        assert_eq!(Status::Ok.merge(Status::Unsupported), Status::Unsupported);
        assert_eq!(Status::Malformed.merge(Status::Unsupported), Status::Malformed);
        assert_eq!(Status::LimitExceeded.merge(Status::Ok), Status::LimitExceeded);
        assert_eq!(Status::Ok.merge(Status::Ok), Status::Ok);
    }

    #[test]
    fn merge_is_commutative_and_associative() {
        for a in ALL {
            for b in ALL {
                assert_eq!(a.merge(b), b.merge(a));
                for c in ALL {
                    assert_eq!(a.merge(b).merge(c), a.merge(b.merge(c)));
                    // Any evaluation order gives the same rank.
                    assert_eq!(a.merge(b.merge(c)), b.merge(a.merge(c)));
                }
            }
        }
    }
}

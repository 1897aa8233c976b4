use serde::{Deserialize, Serialize};

/// Musical key of a track
///
/// Covers every major and minor root. The wire encoding used inside the
/// track-data BLOB (and the key column of v2/v3 schemas) is a 1-based
/// ordinal in the order listed here; `0` means "no key".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MusicalKey {
    AMinor,
    GMajor,
    EMinor,
    DMajor,
    BMinor,
    AMajor,
    FSharpMinor,
    EMajor,
    DFlatMinor,
    BMajor,
    AFlatMinor,
    FSharpMajor,
    EFlatMinor,
    DFlatMajor,
    BFlatMinor,
    AFlatMajor,
    FMinor,
    EFlatMajor,
    CMinor,
    BFlatMajor,
    GMinor,
    FMajor,
    DMinor,
    CMajor,
}

impl MusicalKey {
    /// All keys, in wire-ordinal order.
    pub const ALL: [MusicalKey; 24] = [
        MusicalKey::AMinor,
        MusicalKey::GMajor,
        MusicalKey::EMinor,
        MusicalKey::DMajor,
        MusicalKey::BMinor,
        MusicalKey::AMajor,
        MusicalKey::FSharpMinor,
        MusicalKey::EMajor,
        MusicalKey::DFlatMinor,
        MusicalKey::BMajor,
        MusicalKey::AFlatMinor,
        MusicalKey::FSharpMajor,
        MusicalKey::EFlatMinor,
        MusicalKey::DFlatMajor,
        MusicalKey::BFlatMinor,
        MusicalKey::AFlatMajor,
        MusicalKey::FMinor,
        MusicalKey::EFlatMajor,
        MusicalKey::CMinor,
        MusicalKey::BFlatMajor,
        MusicalKey::GMinor,
        MusicalKey::FMajor,
        MusicalKey::DMinor,
        MusicalKey::CMajor,
    ];

    /// Convert to the 1-based wire ordinal.
    pub fn to_ordinal(self) -> i32 {
        self as i32 + 1
    }

    /// Convert from the 1-based wire ordinal; `None` for anything outside
    /// `1..=24`.
    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        if (1..=24).contains(&ordinal) {
            Some(Self::ALL[(ordinal - 1) as usize])
        } else {
            None
        }
    }

    /// Get a human-readable key name.
    pub fn name(self) -> &'static str {
        match self {
            MusicalKey::AMinor => "A Minor",
            MusicalKey::GMajor => "G Major",
            MusicalKey::EMinor => "E Minor",
            MusicalKey::DMajor => "D Major",
            MusicalKey::BMinor => "B Minor",
            MusicalKey::AMajor => "A Major",
            MusicalKey::FSharpMinor => "F# Minor",
            MusicalKey::EMajor => "E Major",
            MusicalKey::DFlatMinor => "Db Minor",
            MusicalKey::BMajor => "B Major",
            MusicalKey::AFlatMinor => "Ab Minor",
            MusicalKey::FSharpMajor => "F# Major",
            MusicalKey::EFlatMinor => "Eb Minor",
            MusicalKey::DFlatMajor => "Db Major",
            MusicalKey::BFlatMinor => "Bb Minor",
            MusicalKey::AFlatMajor => "Ab Major",
            MusicalKey::FMinor => "F Minor",
            MusicalKey::EFlatMajor => "Eb Major",
            MusicalKey::CMinor => "C Minor",
            MusicalKey::BFlatMajor => "Bb Major",
            MusicalKey::GMinor => "G Minor",
            MusicalKey::FMajor => "F Major",
            MusicalKey::DMinor => "D Minor",
            MusicalKey::CMajor => "C Major",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinal_round_trip() {
        for key in MusicalKey::ALL {
            let ordinal = key.to_ordinal();
            assert!((1..=24).contains(&ordinal));
            assert_eq!(MusicalKey::from_ordinal(ordinal), Some(key));
        }
    }

    #[test]
    fn test_out_of_range_ordinals() {
        assert_eq!(MusicalKey::from_ordinal(0), None);
        assert_eq!(MusicalKey::from_ordinal(25), None);
        assert_eq!(MusicalKey::from_ordinal(-1), None);
    }

    #[test]
    fn test_reference_ordinals() {
        assert_eq!(MusicalKey::AMinor.to_ordinal(), 1);
        assert_eq!(MusicalKey::CMajor.to_ordinal(), 24);
    }
}

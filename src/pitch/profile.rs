//! Voice profiles: named pitch-factor ranges.
//!
//! Each cycle draws its factor uniformly from the active profile's range.
//! Bounds may be written in either order ("bear" is stored high → low).

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::pitch::shifter::MAX_SEMITONES;

/// A named semitone range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub name: String,
    /// One bound of the semitone range.
    pub min_factor: f64,
    /// The other bound of the semitone range.
    pub max_factor: f64,
}

impl VoiceProfile {
    pub fn new(name: impl Into<String>, min_factor: f64, max_factor: f64) -> Self {
        Self {
            name: name.into(),
            min_factor,
            max_factor,
        }
    }

    /// High-pitched profile, +4 to +9 semitones.
    pub fn parrot() -> Self {
        Self::new("parrot", 4.0, 9.0)
    }

    /// Low-pitched profile, -10 to -16 semitones.
    pub fn bear() -> Self {
        Self::new("bear", -10.0, -16.0)
    }

    /// Both bounds are finite and within the shifter's range.
    pub fn is_valid(&self) -> bool {
        [self.min_factor, self.max_factor]
            .iter()
            .all(|f| f.is_finite() && f.abs() <= MAX_SEMITONES)
    }

    /// `(low, high)` regardless of the order the bounds were written in.
    pub fn range(&self) -> (f64, f64) {
        if self.min_factor <= self.max_factor {
            (self.min_factor, self.max_factor)
        } else {
            (self.max_factor, self.min_factor)
        }
    }

    /// Draw a factor uniformly from the range.
    ///
    /// Never panics: a non-finite bound is ignored in favour of the other
    /// one, and a profile with no finite bound yields 0 (no shift).
    ///
    /// ```
    /// use voice_morph::pitch::VoiceProfile;
    ///
    /// let f = VoiceProfile::bear().pick_factor(&mut rand::thread_rng());
    /// assert!((-16.0..=-10.0).contains(&f));
    /// ```
    pub fn pick_factor<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let (low, high) = match (self.min_factor.is_finite(), self.max_factor.is_finite()) {
            (true, true) => self.range(),
            (true, false) => return self.min_factor,
            (false, true) => return self.max_factor,
            (false, false) => return 0.0,
        };
        if low == high {
            return low;
        }
        rng.gen_range(low..=high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn picks_stay_inside_parrot_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let p = VoiceProfile::parrot();
        for _ in 0..1_000 {
            let f = p.pick_factor(&mut rng);
            assert!((4.0..=9.0).contains(&f), "{f} outside parrot range");
        }
    }

    #[test]
    fn reversed_bounds_are_normalized() {
        assert_eq!(VoiceProfile::bear().range(), (-16.0, -10.0));
        let mut rng = StdRng::seed_from_u64(1);
        let f = VoiceProfile::bear().pick_factor(&mut rng);
        assert!((-16.0..=-10.0).contains(&f));
    }

    #[test]
    fn non_finite_bounds_never_panic() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(
            VoiceProfile::new("inf", 4.0, f64::INFINITY).pick_factor(&mut rng),
            4.0
        );
        assert_eq!(
            VoiceProfile::new("nan", f64::NAN, -6.0).pick_factor(&mut rng),
            -6.0
        );
        assert_eq!(
            VoiceProfile::new("void", f64::NAN, f64::NEG_INFINITY).pick_factor(&mut rng),
            0.0
        );
    }

    #[test]
    fn validity_checks_finiteness_and_range() {
        assert!(VoiceProfile::parrot().is_valid());
        assert!(VoiceProfile::bear().is_valid());
        assert!(!VoiceProfile::new("inf", 4.0, f64::INFINITY).is_valid());
        assert!(!VoiceProfile::new("nan", f64::NAN, 1.0).is_valid());
        assert!(!VoiceProfile::new("huge", -200.0, 1.0).is_valid());
    }

    #[test]
    fn degenerate_range_yields_its_value() {
        let p = VoiceProfile::new("fixed", 3.0, 3.0);
        assert_eq!(p.pick_factor(&mut rand::thread_rng()), 3.0);
    }
}

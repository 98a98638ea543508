//! Property-based tests for direction flags

use proptest::prelude::*;
use ricecoder_subprocess::{Direction, Directions, ProcessError};

/// Property: raw flags are accepted exactly when they only use IN, OUT and ERR bits.
#[test]
fn prop_from_bits_rejects_unknown_bits() {
    proptest!(|(bits in any::<u32>())| {
        match Directions::from_bits(bits) {
            Ok(set) => {
                prop_assert!(bits <= 7);
                prop_assert_eq!(set.bits(), bits);
            }
            Err(ProcessError::IllegalDirection { bits: reported }) => {
                prop_assert!(bits > 7);
                prop_assert_eq!(reported, bits);
            }
            Err(other) => prop_assert!(false, "unexpected error {}", other),
        }
    });
}

/// Property: a set iterates exactly the directions whose bits it holds, in
/// descriptor order.
#[test]
fn prop_iteration_matches_bits() {
    proptest!(|(bits in 0u32..8)| {
        let set = Directions::from_bits(bits).unwrap();
        let members: Vec<Direction> = set.iter().collect();

        prop_assert_eq!(members.iter().map(|d| d.bits()).sum::<u32>(), bits);
        prop_assert!(members.windows(2).all(|w| w[0].child_fd() < w[1].child_fd()));
        for direction in Direction::ALL {
            prop_assert_eq!(set.contains(direction), members.contains(&direction));
            prop_assert_eq!(Direction::try_from(direction.bits()).unwrap(), direction);
        }
    });
}

//! Shared proptest configuration.
//!
//! Under Miri the number of generated cases is cut down to keep runs short.
//!
//! ```ignore
//! use rampart::test_config::miri_case_count;
//!
//! proptest! {
//!     #![proptest_config(ProptestConfig {
//!         cases: miri_case_count(),
//!         ..ProptestConfig::default()
//!     })]
//!     #[test]
//!     fn converges(inputs in vec(any::<(bool, bool)>(), 0..200)) {
//!         // ...
//!     }
//! }
//! ```

/// Number of proptest cases: 5 under Miri, 256 otherwise.
#[must_use]
pub const fn miri_case_count() -> u32 {
    if cfg!(miri) {
        5
    } else {
        256
    }
}

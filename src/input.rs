//! The input vocabulary and the displacement function shared by client and server.
//!
//! [`Displacement`] is the single most important piece of shared configuration in the
//! protocol: the client predicts with it, the server integrates with it, and the
//! client replays with it. If the two sides are configured with different steps the
//! client will be corrected on every acknowledgement, forever.

use serde::{Deserialize, Serialize};

use crate::{Position, RampartError};

/// Default distance moved per command along the x axis.
const DEFAULT_STEP: f32 = 0.1;

/// The discrete action recognized on one tick.
///
/// A closed enumeration: every symbol that can appear on the wire has an
/// exhaustive displacement, and anything that does not decode into one of
/// these variants is rejected by the codec instead of being guessed at.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InputSymbol {
    /// Nothing recognized this tick. Never captured into a command.
    #[default]
    None,
    /// Move towards negative x.
    Left,
    /// Move towards positive x.
    Right,
}

impl InputSymbol {
    /// Returns `true` for every symbol except [`InputSymbol::None`].
    #[inline]
    #[must_use]
    pub const fn is_some(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// The held state of each direction on one tick, as supplied by the input sampler.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct InputState {
    /// Whether the "left" control is held.
    pub left: bool,
    /// Whether the "right" control is held.
    pub right: bool,
}

impl InputState {
    /// Nothing held.
    pub const IDLE: Self = Self::new(false, false);
    /// Only "left" held.
    pub const LEFT: Self = Self::new(true, false);
    /// Only "right" held.
    pub const RIGHT: Self = Self::new(false, true);
    /// Both directions held.
    pub const BOTH: Self = Self::new(true, true);

    /// Creates an input state from the two held flags.
    #[inline]
    #[must_use]
    pub const fn new(left: bool, right: bool) -> Self {
        Self { left, right }
    }

    /// Resolves the held directions into at most one symbol.
    ///
    /// Opposing directions do not cancel. `Right` is checked first and wins
    /// whenever it is held, so holding both moves right. Client and server
    /// never re-resolve a captured command, but changing this policy changes
    /// which commands get captured and must be rolled out to every client at once.
    ///
    /// ```
    /// use rampart::{InputState, InputSymbol};
    ///
    /// assert_eq!(InputState::BOTH.resolve(), InputSymbol::Right);
    /// assert_eq!(InputState::LEFT.resolve(), InputSymbol::Left);
    /// assert_eq!(InputState::IDLE.resolve(), InputSymbol::None);
    /// ```
    #[inline]
    #[must_use]
    pub const fn resolve(self) -> InputSymbol {
        if self.right {
            InputSymbol::Right
        } else if self.left {
            InputSymbol::Left
        } else {
            InputSymbol::None
        }
    }
}

/// The deterministic mapping from an [`InputSymbol`] to a position delta.
///
/// Each recognized symbol moves a constant `step` along the x axis.
/// [`InputSymbol::None`] moves nothing.
///
/// # Example
///
/// ```
/// use rampart::{Displacement, InputSymbol, Position};
///
/// let displacement = Displacement::new(0.5)?;
/// assert_eq!(displacement.apply(InputSymbol::Right), Position::new(0.5, 0.0, 0.0));
/// assert_eq!(displacement.apply(InputSymbol::Left), Position::new(-0.5, 0.0, 0.0));
/// assert_eq!(displacement.apply(InputSymbol::None), Position::ZERO);
/// # Ok::<(), rampart::RampartError>(())
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Displacement {
    step: f32,
}

impl Default for Displacement {
    fn default() -> Self {
        Self { step: DEFAULT_STEP }
    }
}

impl Displacement {
    /// Creates a displacement function moving `step` units per command.
    ///
    /// # Errors
    ///
    /// Returns [`RampartError::InvalidRequest`] if `step` is not finite.
    pub fn new(step: f32) -> Result<Self, RampartError> {
        let displacement = Self { step };
        displacement.validate()?;
        Ok(displacement)
    }

    /// Distance moved per command.
    #[inline]
    #[must_use]
    pub const fn step(&self) -> f32 {
        self.step
    }

    /// Checks that the step is usable.
    pub fn validate(&self) -> Result<(), RampartError> {
        if !self.step.is_finite() {
            return Err(RampartError::InvalidRequest {
                info: format!("displacement step must be finite, got {}", self.step),
            });
        }
        Ok(())
    }

    /// Maps one symbol to its position delta.
    #[inline]
    #[must_use]
    pub fn apply(&self, symbol: InputSymbol) -> Position {
        match symbol {
            InputSymbol::None => Position::ZERO,
            InputSymbol::Left => Position::new(-self.step, 0.0, 0.0),
            InputSymbol::Right => Position::new(self.step, 0.0, 0.0),
        }
    }

    /// Moves `from` by each symbol's delta, one addition per symbol, in order.
    ///
    /// Prediction, replay and the authority all add deltas one at a time in
    /// this order, so they agree bit for bit even when the step is not exactly
    /// representable.
    #[must_use]
    pub fn integrate<I>(&self, from: Position, symbols: I) -> Position
    where
        I: IntoIterator<Item = InputSymbol>,
    {
        symbols
            .into_iter()
            .fold(from, |position, symbol| position + self.apply(symbol))
    }
}

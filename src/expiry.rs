//! Expiry Model Module
//!
//! Defines the time-unit/amount duration value type and the per-operation
//! expiry types used by cache configurations.

use std::hash::{Hash, Hasher};

use crate::error::{CacheError, Result};

// == Time Unit ==
/// Units a duration can be expressed in.
///
/// Sub-millisecond units exist only so that construction can reject them;
/// a valid `Duration` is never finer than a millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Nanoseconds in one unit, widened so that `u64::MAX` days cannot
    /// overflow during normalization.
    fn nanos_per(self) -> u128 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60 * 1_000_000_000,
            TimeUnit::Hours => 3_600 * 1_000_000_000,
            TimeUnit::Days => 86_400 * 1_000_000_000,
        }
    }

    /// True for units finer than the supported millisecond granularity.
    fn is_sub_millisecond(self) -> bool {
        matches!(self, TimeUnit::Nanoseconds | TimeUnit::Microseconds)
    }
}

// == Duration ==
/// An elapsed-time value used as an expiry duration.
///
/// `ETERNAL` (never expires) and `ZERO` (already expired) are distinguished
/// constants rather than unit/amount pairs. Finite durations are built with
/// [`Duration::new`], which enforces a positive amount and millisecond-or-
/// coarser granularity.
///
/// Equality is defined on normalized elapsed time, not on the literal
/// unit/amount pair: two hours equals 120 minutes equals 7 200 000
/// milliseconds. Normalization goes through a 128-bit nanosecond count, so
/// unit conversion cannot overflow into a false inequality.
#[derive(Debug, Clone, Copy)]
pub struct Duration(Repr);

#[derive(Debug, Clone, Copy)]
enum Repr {
    Eternal,
    Zero,
    Finite { unit: TimeUnit, amount: u64 },
}

impl Duration {
    /// Duration that never expires.
    pub const ETERNAL: Duration = Duration(Repr::Eternal);

    /// Duration that is already expired.
    pub const ZERO: Duration = Duration(Repr::Zero);

    // == Constructor ==
    /// Creates a finite duration of `amount` units.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidDuration`] if `amount` is negative, if
    /// `amount` is zero (the already-expired semantic is only reachable
    /// through [`Duration::ZERO`]), or if `unit` is finer than a
    /// millisecond.
    pub fn new(unit: TimeUnit, amount: i64) -> Result<Self> {
        if amount < 0 {
            return Err(CacheError::InvalidDuration(format!(
                "amount must be positive, got {}",
                amount
            )));
        }
        if amount == 0 {
            return Err(CacheError::InvalidDuration(
                "zero-length duration is only expressible as Duration::ZERO".to_string(),
            ));
        }
        if unit.is_sub_millisecond() {
            return Err(CacheError::InvalidDuration(format!(
                "{:?} is finer than the supported millisecond granularity",
                unit
            )));
        }
        Ok(Duration(Repr::Finite {
            unit,
            amount: amount as u64,
        }))
    }

    // == Accessors ==
    /// The unit this duration was expressed in, or None for the sentinels.
    pub fn time_unit(&self) -> Option<TimeUnit> {
        match self.0 {
            Repr::Finite { unit, .. } => Some(unit),
            _ => None,
        }
    }

    /// The amount this duration was expressed with, or None for the
    /// sentinels.
    pub fn amount(&self) -> Option<u64> {
        match self.0 {
            Repr::Finite { amount, .. } => Some(amount),
            _ => None,
        }
    }

    /// True if this duration never expires.
    pub fn is_eternal(&self) -> bool {
        matches!(self.0, Repr::Eternal)
    }

    /// True if this duration is already expired.
    pub fn is_zero(&self) -> bool {
        matches!(self.0, Repr::Zero)
    }

    // == Conversion ==
    /// Elapsed time in milliseconds.
    ///
    /// # Returns
    /// - `None` for `ETERNAL`
    /// - `Some(0)` for `ZERO`
    /// - the exact millisecond count otherwise (valid units are never finer
    ///   than a millisecond, so no precision is lost)
    pub fn as_millis(&self) -> Option<u64> {
        match self.0 {
            Repr::Eternal => None,
            Repr::Zero => Some(0),
            Repr::Finite { unit, amount } => {
                let nanos = unit.nanos_per() * amount as u128;
                Some((nanos / 1_000_000) as u64)
            }
        }
    }

    /// Computes the expiry deadline for an operation happening at `now_ms`.
    ///
    /// # Returns
    /// - `None` for `ETERNAL` (no deadline)
    /// - `Some(now_ms)` for `ZERO` (expired at birth)
    /// - `Some(now_ms + millis)` otherwise, saturating on overflow
    pub fn deadline_from(&self, now_ms: u64) -> Option<u64> {
        self.as_millis().map(|ms| now_ms.saturating_add(ms))
    }

    /// Normalized elapsed nanoseconds; `None` for `ETERNAL`.
    fn normalized_nanos(&self) -> Option<u128> {
        match self.0 {
            Repr::Eternal => None,
            Repr::Zero => Some(0),
            Repr::Finite { unit, amount } => Some(unit.nanos_per() * amount as u128),
        }
    }
}

// == Equality ==
impl PartialEq for Duration {
    fn eq(&self, other: &Self) -> bool {
        self.normalized_nanos() == other.normalized_nanos()
    }
}

impl Eq for Duration {}

impl Hash for Duration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized_nanos().hash(state);
    }
}

// == Expiry Type ==
/// The operation kinds a configuration maps to expiry durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpiryType {
    /// Applied when an entry is first created
    Creation,
    /// Applied when an entry is read
    Access,
    /// Applied when an existing entry's value is replaced
    Update,
}

impl ExpiryType {
    /// All expiry types, in table order.
    pub const ALL: [ExpiryType; 3] = [ExpiryType::Creation, ExpiryType::Access, ExpiryType::Update];

    /// Index into a per-type duration table.
    pub(crate) fn index(self) -> usize {
        match self {
            ExpiryType::Creation => 0,
            ExpiryType::Access => 1,
            ExpiryType::Update => 2,
        }
    }
}

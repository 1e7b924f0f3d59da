//! Core types: Price, Quantity, Timestamp, OrderId, ExecutionId, Symbol, TraderId

use std::fmt;

/// Price in cents.
///
/// `Price(150_00)` represents $150.00. Fixed-point avoids floating-point
/// drift in P&L accounting; one cent is also the simulator's tick size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Price(pub i64);

impl Price {
    pub const ZERO: Price = Price(0);

    /// Construct from a dollar amount, rounding to the nearest cent.
    pub fn from_dollars(dollars: f64) -> Self {
        Price((dollars * 100.0).round() as i64)
    }

    /// The price as a dollar amount.
    #[inline]
    pub fn as_dollars(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// True for prices a resting order may carry (strictly positive).
    #[inline]
    pub fn is_valid_limit(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dollars = self.0 / 100;
        let cents = (self.0 % 100).abs();
        if self.0 < 0 {
            write!(f, "-${}.{:02}", dollars.abs(), cents)
        } else {
            write!(f, "${}.{:02}", dollars, cents)
        }
    }
}

/// Quantity of shares. Always positive in orders; signed arithmetic lives in
/// position tracking.
pub type Quantity = u64;

/// Timestamp in nanoseconds since engine start. Monotonic.
pub type Timestamp = u64;

/// Unique order identifier assigned by the matching engine on acceptance.
///
/// Zero is never assigned; rejected orders surface as `Err`, not as id 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O{}", self.0)
    }
}

/// Unique execution identifier. Strictly increasing across all executions
/// emitted by one engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct ExecutionId(pub u64);

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X{}", self.0)
    }
}

/// A fixed-size symbol identifier (e.g., "AAPL", "GOOGL").
///
/// Stored inline as `[u8; 8]` with a length byte — no heap allocation,
/// `Copy`, and usable as a hash map key. Maximum 8 ASCII bytes.
///
/// ```
/// use ticksim::Symbol;
///
/// let sym = Symbol::new("AAPL");
/// assert_eq!(sym.as_str(), "AAPL");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    buf: [u8; 8],
    len: u8,
}

impl Symbol {
    /// Create a symbol from a string slice. Panics if longer than 8 bytes.
    pub fn new(s: &str) -> Self {
        Self::try_new(s).expect("Symbol must be at most 8 bytes")
    }

    /// Try to create a symbol. Returns `None` if longer than 8 bytes.
    pub fn try_new(s: &str) -> Option<Self> {
        if s.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[..s.len()].copy_from_slice(s.as_bytes());
        Some(Self {
            buf,
            len: s.len() as u8,
        })
    }

    /// Returns the symbol as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        // Safety: constructors only accept valid str input
        unsafe { std::str::from_utf8_unchecked(&self.buf[..self.len as usize]) }
    }

    /// True for the empty symbol (never valid on an order).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol(\"{}\")", self.as_str())
    }
}

impl serde::Serialize for Symbol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for Symbol {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <&str>::deserialize(deserializer)?;
        Symbol::try_new(s).ok_or_else(|| serde::de::Error::custom("Symbol must be at most 8 bytes"))
    }
}

/// A trader identifier (e.g., "MM_TRADER_01", "MARKET_MAKER").
///
/// Same inline construction as [`Symbol`], widened to 16 bytes to hold the
/// simulator's trader naming convention.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraderId {
    buf: [u8; 16],
    len: u8,
}

impl TraderId {
    /// Create a trader id. Panics if longer than 16 bytes.
    pub fn new(s: &str) -> Self {
        Self::try_new(s).expect("TraderId must be at most 16 bytes")
    }

    /// Try to create a trader id. Returns `None` if longer than 16 bytes.
    pub fn try_new(s: &str) -> Option<Self> {
        if s.len() > 16 {
            return None;
        }
        let mut buf = [0u8; 16];
        buf[..s.len()].copy_from_slice(s.as_bytes());
        Some(Self {
            buf,
            len: s.len() as u8,
        })
    }

    /// Returns the trader id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        // Safety: constructors only accept valid str input
        unsafe { std::str::from_utf8_unchecked(&self.buf[..self.len as usize]) }
    }
}

impl AsRef<str> for TraderId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for TraderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for TraderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraderId(\"{}\")", self.as_str())
    }
}

impl serde::Serialize for TraderId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for TraderId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <&str>::deserialize(deserializer)?;
        TraderId::try_new(s)
            .ok_or_else(|| serde::de::Error::custom("TraderId must be at most 16 bytes"))
    }
}

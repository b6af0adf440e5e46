use crate::sls::sort::DatatypeId;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{ToPrimitive, Zero};
use std::fmt;

/// A fixed-width bit-vector value. Bits above `width` are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BvValue {
    pub width: u32,
    pub bits: u64,
}

impl BvValue {
    #[must_use]
    pub const fn mask(width: u32) -> u64 {
        if width >= 64 {
            u64::MAX
        } else {
            (1_u64 << width) - 1
        }
    }

    #[must_use]
    pub const fn new(width: u32, bits: u64) -> Self {
        Self {
            width,
            bits: bits & Self::mask(width),
        }
    }

    #[must_use]
    pub const fn zero(width: u32) -> Self {
        Self { width, bits: 0 }
    }

    #[must_use]
    pub const fn with_bits(self, bits: u64) -> Self {
        Self::new(self.width, bits)
    }

    #[must_use]
    pub const fn flip(self, bit: u32) -> Self {
        self.with_bits(self.bits ^ (1_u64 << bit))
    }

    #[must_use]
    pub const fn bit(self, bit: u32) -> bool {
        (self.bits >> bit) & 1 == 1
    }

    #[must_use]
    pub const fn rotate_left(self, amount: u32) -> Self {
        let w = self.width;
        let k = amount % w;
        if k == 0 {
            return self;
        }
        self.with_bits((self.bits << k) | (self.bits >> (w - k)))
    }

    #[must_use]
    pub const fn rotate_right(self, amount: u32) -> Self {
        let k = amount % self.width;
        self.rotate_left(self.width - k)
    }

    #[must_use]
    pub const fn hamming(self, other: Self) -> u32 {
        (self.bits ^ other.bits).count_ones()
    }
}

impl fmt::Display for BvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#b{:0width$b}", self.bits, width = self.width as usize)
    }
}

/// A value of a datatype: a constructor applied to field values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DtValue {
    pub datatype: DatatypeId,
    pub ctor: usize,
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Bool(bool),
    Num(BigRational),
    Bv(BvValue),
    Dt(DtValue),
    Str(String),
}

impl Value {
    #[must_use]
    pub fn int(n: i64) -> Self {
        Self::Num(BigRational::from_integer(BigInt::from(n)))
    }

    #[must_use]
    pub fn real(numer: i64, denom: i64) -> Self {
        Self::Num(BigRational::new(BigInt::from(numer), BigInt::from(denom)))
    }

    #[must_use]
    pub fn zero_num() -> Self {
        Self::Num(BigRational::zero())
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_num(&self) -> Option<&BigRational> {
        match self {
            Self::Num(n) => Some(n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_num()
            .filter(|n| n.is_integer())
            .and_then(|n| n.to_integer().to_i64())
    }

    #[must_use]
    pub const fn as_bv(&self) -> Option<BvValue> {
        match self {
            Self::Bv(bv) => Some(*bv),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_dt(&self) -> Option<&DtValue> {
        match self {
            Self::Dt(dt) => Some(dt),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Num(n) => write!(f, "{n}"),
            Self::Bv(bv) => write!(f, "{bv}"),
            Self::Dt(dt) => {
                if dt.args.is_empty() {
                    write!(f, "C{}", dt.ctor)
                } else {
                    write!(f, "(C{}", dt.ctor)?;
                    for arg in &dt.args {
                        write!(f, " {arg}")?;
                    }
                    write!(f, ")")
                }
            }
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

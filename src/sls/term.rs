use crate::sls::sort::DatatypeId;
use crate::sls::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TermId(pub u32);

impl TermId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct VarId(pub u32);

impl VarId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node of the term arena. Children are referenced by `TermId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Var(VarId),
    Const(Value),

    Not(TermId),
    And(Vec<TermId>),
    Or(Vec<TermId>),
    Implies(TermId, TermId),
    Ite(TermId, TermId, TermId),
    Eq(TermId, TermId),
    Distinct(Vec<TermId>),

    Add(Vec<TermId>),
    Sub(TermId, TermId),
    Mul(Vec<TermId>),
    Neg(TermId),
    Le(TermId, TermId),
    Lt(TermId, TermId),
    Ge(TermId, TermId),
    Gt(TermId, TermId),

    BvNot(TermId),
    BvNeg(TermId),
    BvAnd(TermId, TermId),
    BvOr(TermId, TermId),
    BvXor(TermId, TermId),
    BvAdd(TermId, TermId),
    BvSub(TermId, TermId),
    BvMul(TermId, TermId),
    BvShl(TermId, TermId),
    BvLshr(TermId, TermId),
    BvUlt(TermId, TermId),
    BvUle(TermId, TermId),
    BvExtract { hi: u32, lo: u32, arg: TermId },
    BvConcat(TermId, TermId),

    Construct {
        datatype: DatatypeId,
        ctor: usize,
        args: Vec<TermId>,
    },
    Select {
        datatype: DatatypeId,
        ctor: usize,
        field: usize,
        arg: TermId,
    },
    Test {
        datatype: DatatypeId,
        ctor: usize,
        arg: TermId,
    },

    StrConcat(Vec<TermId>),
    StrLen(TermId),
    StrContains(TermId, TermId),
    StrPrefixOf(TermId, TermId),
    StrSuffixOf(TermId, TermId),
    StrAt(TermId, TermId),
}

impl Term {
    /// The direct children of this node, in argument order.
    #[must_use]
    pub fn children(&self) -> Vec<TermId> {
        match self {
            Self::Var(_) | Self::Const(_) => Vec::new(),
            Self::Not(a)
            | Self::Neg(a)
            | Self::BvNot(a)
            | Self::BvNeg(a)
            | Self::StrLen(a)
            | Self::BvExtract { arg: a, .. }
            | Self::Select { arg: a, .. }
            | Self::Test { arg: a, .. } => vec![*a],
            Self::Implies(a, b)
            | Self::Eq(a, b)
            | Self::Sub(a, b)
            | Self::Le(a, b)
            | Self::Lt(a, b)
            | Self::Ge(a, b)
            | Self::Gt(a, b)
            | Self::BvAnd(a, b)
            | Self::BvOr(a, b)
            | Self::BvXor(a, b)
            | Self::BvAdd(a, b)
            | Self::BvSub(a, b)
            | Self::BvMul(a, b)
            | Self::BvShl(a, b)
            | Self::BvLshr(a, b)
            | Self::BvUlt(a, b)
            | Self::BvUle(a, b)
            | Self::BvConcat(a, b)
            | Self::StrContains(a, b)
            | Self::StrPrefixOf(a, b)
            | Self::StrSuffixOf(a, b)
            | Self::StrAt(a, b) => vec![*a, *b],
            Self::Ite(c, t, e) => vec![*c, *t, *e],
            Self::And(xs)
            | Self::Or(xs)
            | Self::Distinct(xs)
            | Self::Add(xs)
            | Self::Mul(xs)
            | Self::StrConcat(xs)
            | Self::Construct { args: xs, .. } => xs.clone(),
        }
    }

    /// Boolean connectives are structure, everything else boolean-sorted is an atom.
    #[must_use]
    pub const fn is_connective(&self) -> bool {
        matches!(
            self,
            Self::Not(_) | Self::And(_) | Self::Or(_) | Self::Implies(..) | Self::Ite(..)
        )
    }
}

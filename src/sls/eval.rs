//! Evaluation of terms under an assignment, and the satisfaction degree used
//! to score partially satisfied assertions.
//!
//! The degree of a boolean term with respect to a wanted truth value is a
//! number in `[0, 1]`. It is exactly `1.0` iff the term evaluates to the
//! wanted value, and strictly below `1.0` otherwise, growing as the current
//! values get closer to flipping the term.

use crate::sls::formula::{AssertionId, Formula};
use crate::sls::sort::Sort;
use crate::sls::term::{Term, TermId, VarId};
use crate::sls::value::{BvValue, DtValue, Value};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

/// The largest degree an unsatisfied term may have.
pub const MAX_UNSAT_DEGREE: f64 = 0.999_999;

#[must_use]
pub fn unsat_degree(distance: f64) -> f64 {
    (1.0 / (1.0 + distance.abs())).min(MAX_UNSAT_DEGREE)
}

/// Reads values from an assignment, optionally with one variable overridden.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    formula: &'a Formula,
    values: &'a [Value],
    overlay: Option<(VarId, &'a Value)>,
}

impl<'a> Evaluator<'a> {
    #[must_use]
    pub const fn new(formula: &'a Formula, values: &'a [Value]) -> Self {
        Self {
            formula,
            values,
            overlay: None,
        }
    }

    /// Evaluates as if `var` held `value`.
    #[must_use]
    pub const fn with_override(self, var: VarId, value: &'a Value) -> Self {
        Self {
            overlay: Some((var, value)),
            ..self
        }
    }

    fn var_value(&self, v: VarId) -> &Value {
        match self.overlay {
            Some((o, value)) if o == v => value,
            _ => &self.values[v.index()],
        }
    }

    #[must_use]
    pub fn satisfied(&self, a: AssertionId) -> bool {
        self.truth(self.formula.assertion(a).root)
    }

    #[must_use]
    pub fn assertion_degree(&self, a: AssertionId) -> f64 {
        self.degree(self.formula.assertion(a).root, true)
    }

    #[must_use]
    pub fn truth(&self, t: TermId) -> bool {
        as_bool(&self.value(t))
    }

    #[must_use]
    pub fn num(&self, t: TermId) -> BigRational {
        as_num(self.value(t))
    }

    #[must_use]
    pub fn bv(&self, t: TermId) -> BvValue {
        as_bv(&self.value(t))
    }

    #[must_use]
    pub fn string(&self, t: TermId) -> String {
        match self.value(t) {
            Value::Str(s) => s,
            other => {
                debug_assert!(false, "expected a string, got {other}");
                String::new()
            }
        }
    }

    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn value(&self, t: TermId) -> Value {
        let f = self.formula;
        match f.term(t) {
            Term::Var(v) => self.var_value(*v).clone(),
            Term::Const(c) => c.clone(),

            Term::Not(a) => Value::Bool(!self.truth(*a)),
            Term::And(xs) => Value::Bool(xs.iter().all(|x| self.truth(*x))),
            Term::Or(xs) => Value::Bool(xs.iter().any(|x| self.truth(*x))),
            Term::Implies(a, b) => Value::Bool(!self.truth(*a) || self.truth(*b)),
            Term::Ite(c, a, b) => {
                if self.truth(*c) {
                    self.value(*a)
                } else {
                    self.value(*b)
                }
            }
            Term::Eq(a, b) => Value::Bool(self.value(*a) == self.value(*b)),
            Term::Distinct(xs) => {
                let vals: Vec<Value> = xs.iter().map(|x| self.value(*x)).collect();
                let distinct = vals
                    .iter()
                    .enumerate()
                    .all(|(i, v)| vals[i + 1..].iter().all(|w| v != w));
                Value::Bool(distinct)
            }

            Term::Add(xs) => Value::Num(
                xs.iter()
                    .fold(BigRational::zero(), |acc, x| acc + self.num(*x)),
            ),
            Term::Sub(a, b) => Value::Num(self.num(*a) - self.num(*b)),
            Term::Mul(xs) => Value::Num(
                xs.iter()
                    .fold(BigRational::one(), |acc, x| acc * self.num(*x)),
            ),
            Term::Neg(a) => Value::Num(-self.num(*a)),
            Term::Le(a, b) => Value::Bool(self.num(*a) <= self.num(*b)),
            Term::Lt(a, b) => Value::Bool(self.num(*a) < self.num(*b)),
            Term::Ge(a, b) => Value::Bool(self.num(*a) >= self.num(*b)),
            Term::Gt(a, b) => Value::Bool(self.num(*a) > self.num(*b)),

            Term::BvNot(a) => {
                let v = self.bv(*a);
                Value::Bv(v.with_bits(!v.bits))
            }
            Term::BvNeg(a) => {
                let v = self.bv(*a);
                Value::Bv(v.with_bits(v.bits.wrapping_neg()))
            }
            Term::BvAnd(a, b) => self.bv_op(*a, *b, |x, y| x & y),
            Term::BvOr(a, b) => self.bv_op(*a, *b, |x, y| x | y),
            Term::BvXor(a, b) => self.bv_op(*a, *b, |x, y| x ^ y),
            Term::BvAdd(a, b) => self.bv_op(*a, *b, u64::wrapping_add),
            Term::BvSub(a, b) => self.bv_op(*a, *b, u64::wrapping_sub),
            Term::BvMul(a, b) => self.bv_op(*a, *b, u64::wrapping_mul),
            Term::BvShl(a, b) => {
                let (x, y) = (self.bv(*a), self.bv(*b));
                let bits = if y.bits >= u64::from(x.width) {
                    0
                } else {
                    x.bits << y.bits
                };
                Value::Bv(x.with_bits(bits))
            }
            Term::BvLshr(a, b) => {
                let (x, y) = (self.bv(*a), self.bv(*b));
                let bits = if y.bits >= u64::from(x.width) {
                    0
                } else {
                    x.bits >> y.bits
                };
                Value::Bv(x.with_bits(bits))
            }
            Term::BvUlt(a, b) => Value::Bool(self.bv(*a).bits < self.bv(*b).bits),
            Term::BvUle(a, b) => Value::Bool(self.bv(*a).bits <= self.bv(*b).bits),
            Term::BvExtract { hi, lo, arg } => {
                let v = self.bv(*arg);
                Value::Bv(BvValue::new(hi - lo + 1, v.bits >> lo))
            }
            Term::BvConcat(a, b) => {
                let (x, y) = (self.bv(*a), self.bv(*b));
                let width = x.width + y.width;
                let high = if y.width >= 64 { 0 } else { x.bits << y.width };
                Value::Bv(BvValue::new(width, high | y.bits))
            }

            Term::Construct {
                datatype,
                ctor,
                args,
            } => Value::Dt(DtValue {
                datatype: *datatype,
                ctor: *ctor,
                args: args.iter().map(|a| self.value(*a)).collect(),
            }),
            Term::Select {
                datatype,
                ctor,
                field,
                arg,
            } => match self.value(*arg) {
                Value::Dt(dt) if dt.ctor == *ctor => {
                    dt.args.into_iter().nth(*field).unwrap_or(Value::Bool(false))
                }
                _ => {
                    let sort = &f.datatype(*datatype).constructors[*ctor].fields[*field].1;
                    f.default_value(sort)
                }
            },
            Term::Test { ctor, arg, .. } => {
                let is = matches!(self.value(*arg), Value::Dt(dt) if dt.ctor == *ctor);
                Value::Bool(is)
            }

            Term::StrConcat(xs) => Value::Str(xs.iter().map(|x| self.string(*x)).collect()),
            Term::StrLen(s) => {
                let len = self.string(*s).chars().count();
                Value::Num(BigRational::from_integer(BigInt::from(len)))
            }
            Term::StrContains(h, n) => Value::Bool(self.string(*h).contains(&self.string(*n))),
            Term::StrPrefixOf(p, s) => Value::Bool(self.string(*s).starts_with(&self.string(*p))),
            Term::StrSuffixOf(p, s) => Value::Bool(self.string(*s).ends_with(&self.string(*p))),
            Term::StrAt(s, i) => {
                let s = self.string(*s);
                let c = self
                    .num(*i)
                    .to_integer()
                    .to_usize()
                    .and_then(|i| s.chars().nth(i))
                    .map(String::from)
                    .unwrap_or_default();
                Value::Str(c)
            }
        }
    }

    fn bv_op(&self, a: TermId, b: TermId, op: fn(u64, u64) -> u64) -> Value {
        let (x, y) = (self.bv(a), self.bv(b));
        Value::Bv(x.with_bits(op(x.bits, y.bits)))
    }

    /// Satisfaction degree of boolean term `t` with respect to `want`.
    #[must_use]
    pub fn degree(&self, t: TermId, want: bool) -> f64 {
        match self.formula.term(t) {
            Term::Not(a) => self.degree(*a, !want),
            Term::And(xs) => {
                if want {
                    average(xs.iter().map(|x| self.degree(*x, true)))
                } else {
                    maximum(xs.iter().map(|x| self.degree(*x, false)))
                }
            }
            Term::Or(xs) => {
                if want {
                    maximum(xs.iter().map(|x| self.degree(*x, true)))
                } else {
                    average(xs.iter().map(|x| self.degree(*x, false)))
                }
            }
            Term::Implies(a, b) => {
                if want {
                    self.degree(*a, false).max(self.degree(*b, true))
                } else {
                    average([self.degree(*a, true), self.degree(*b, false)].into_iter())
                }
            }
            Term::Ite(c, a, b) if *self.formula.sort_of(t) == Sort::Bool => {
                if self.truth(*c) {
                    self.degree(*a, want)
                } else {
                    self.degree(*b, want)
                }
            }
            _ => {
                if self.truth(t) == want {
                    1.0
                } else {
                    self.atom_degree(t, want)
                }
            }
        }
    }

    /// Degree of an atom that currently evaluates to `!want`.
    fn atom_degree(&self, t: TermId, want: bool) -> f64 {
        let f = self.formula;
        match (f.term(t), want) {
            (Term::Eq(a, b), true) => self.equality_degree(*a, *b),
            (Term::Distinct(xs), true) => {
                let vals: Vec<Value> = xs.iter().map(|x| self.value(*x)).collect();
                let mut pairs = 0_u32;
                let mut apart = 0_u32;
                for (i, v) in vals.iter().enumerate() {
                    for w in &vals[i + 1..] {
                        pairs += 1;
                        if v != w {
                            apart += 1;
                        }
                    }
                }
                (f64::from(apart) / f64::from(pairs.max(1))).min(MAX_UNSAT_DEGREE)
            }
            (Term::Le(a, b), true) | (Term::Ge(b, a), true) => {
                unsat_degree(to_f64(&(self.num(*a) - self.num(*b))))
            }
            (Term::Le(a, b), false) | (Term::Ge(b, a), false) => {
                unsat_degree(to_f64(&(self.num(*b) - self.num(*a))) + 1.0)
            }
            (Term::Lt(a, b), true) | (Term::Gt(b, a), true) => {
                unsat_degree(to_f64(&(self.num(*a) - self.num(*b))) + 1.0)
            }
            (Term::Lt(a, b), false) | (Term::Gt(b, a), false) => {
                unsat_degree(to_f64(&(self.num(*b) - self.num(*a))))
            }
            (Term::BvUle(a, b), true) => {
                unsat_degree(bv_gap(self.bv(*a).bits, self.bv(*b).bits))
            }
            (Term::BvUle(a, b), false) => {
                unsat_degree(bv_gap(self.bv(*b).bits, self.bv(*a).bits) + 1.0)
            }
            (Term::BvUlt(a, b), true) => {
                unsat_degree(bv_gap(self.bv(*a).bits, self.bv(*b).bits) + 1.0)
            }
            (Term::BvUlt(a, b), false) => {
                unsat_degree(bv_gap(self.bv(*b).bits, self.bv(*a).bits))
            }
            (Term::StrContains(h, n), true) => {
                let (h, n) = (self.string(*h), self.string(*n));
                let missing = n.chars().count() - longest_partial_match(&h, &n);
                unsat_degree(missing as f64)
            }
            (Term::StrPrefixOf(p, s), true) => {
                let (p, s) = (self.string(*p), self.string(*s));
                let common = p.chars().zip(s.chars()).take_while(|(x, y)| x == y).count();
                unsat_degree((p.chars().count() - common) as f64)
            }
            (Term::StrSuffixOf(p, s), true) => {
                let (p, s) = (self.string(*p), self.string(*s));
                let common = p
                    .chars()
                    .rev()
                    .zip(s.chars().rev())
                    .take_while(|(x, y)| x == y)
                    .count();
                unsat_degree((p.chars().count() - common) as f64)
            }
            _ => 0.0,
        }
    }

    fn equality_degree(&self, a: TermId, b: TermId) -> f64 {
        match (self.value(a), self.value(b)) {
            (Value::Num(x), Value::Num(y)) => unsat_degree(to_f64(&(x - y))),
            (Value::Bv(x), Value::Bv(y)) => {
                let unequal = f64::from(x.hamming(y)) / f64::from(x.width.max(1));
                (1.0 - unequal).min(MAX_UNSAT_DEGREE)
            }
            (Value::Str(x), Value::Str(y)) => unsat_degree(edit_distance(&x, &y) as f64),
            (Value::Dt(x), Value::Dt(y)) if x.ctor == y.ctor => 0.5,
            _ => 0.0,
        }
    }
}

fn average(xs: impl Iterator<Item = f64>) -> f64 {
    let mut n = 0_u32;
    let mut sum = 0.0;
    let mut all = true;
    for x in xs {
        n += 1;
        sum += x;
        all &= x >= 1.0;
    }
    if all {
        1.0
    } else {
        (sum / f64::from(n)).min(MAX_UNSAT_DEGREE)
    }
}

fn maximum(xs: impl Iterator<Item = f64>) -> f64 {
    xs.fold(0.0, f64::max)
}

fn bv_gap(x: u64, y: u64) -> f64 {
    x.saturating_sub(y) as f64
}

fn to_f64(n: &BigRational) -> f64 {
    n.abs().to_f64().unwrap_or(f64::MAX)
}

fn as_bool(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        other => {
            debug_assert!(false, "expected a boolean, got {other}");
            false
        }
    }
}

fn as_num(v: Value) -> BigRational {
    match v {
        Value::Num(n) => n,
        other => {
            debug_assert!(false, "expected a number, got {other}");
            BigRational::zero()
        }
    }
}

fn as_bv(v: &Value) -> BvValue {
    match v {
        Value::Bv(bv) => *bv,
        other => {
            debug_assert!(false, "expected a bit-vector, got {other}");
            BvValue::zero(1)
        }
    }
}

/// Length of the longest prefix of `needle` occurring anywhere in `haystack`.
fn longest_partial_match(haystack: &str, needle: &str) -> usize {
    let n: Vec<char> = needle.chars().collect();
    let h: Vec<char> = haystack.chars().collect();
    (0..=h.len())
        .map(|start| {
            h[start..]
                .iter()
                .zip(&n)
                .take_while(|(x, y)| x == y)
                .count()
        })
        .max()
        .unwrap_or(0)
}

/// Levenshtein distance over chars.
#[must_use]
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut prev = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cur = row[j + 1];
            row[j + 1] = if ca == *cb {
                prev
            } else {
                1 + prev.min(cur).min(row[j])
            };
            prev = cur;
        }
    }
    row[b.len()]
}

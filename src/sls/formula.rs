//! Formulas: a term arena, variable declarations and the assertion list.
//!
//! A `Formula` is produced once by `FormulaBuilder::build` and is read-only
//! afterwards. The builder checks sorts as terms are created and hash-conses
//! identical nodes, so structurally equal subterms share one `TermId`.
//!
//! Besides the raw assertions the formula precomputes what the search needs
//! on every step:
//! - the variables of each assertion and the assertions of each variable,
//! - the atoms of each assertion together with their polarity and whether
//!   they sit at the top level (reachable through `and`/`not` only),
//! - default values for every sort and the alphabet of string constants.

use crate::sls::random::Random;
use crate::sls::sort::{ConstructorDecl, DatatypeDecl, DatatypeId, MAX_BV_WIDTH, Sort};
use crate::sls::term::{Term, TermId, VarId};
use crate::sls::value::{BvValue, DtValue, Value};
use itertools::Itertools;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use thiserror::Error;

/// Magnitude of integers drawn for random (re)initialisation.
pub const RANDOM_INT_RANGE: i64 = 64;
/// Datatype values drawn at random are at most this deep.
const RANDOM_DT_DEPTH: usize = 3;
/// Longest random string drawn at (re)initialisation.
const RANDOM_STR_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AssertionId(pub u32);

impl AssertionId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("sort mismatch in {op}: expected {expected}, got {actual}")]
    SortMismatch {
        op: &'static str,
        expected: String,
        actual: String,
    },

    #[error("{op} expects at least {min} arguments, got {actual}")]
    Arity {
        op: &'static str,
        min: usize,
        actual: usize,
    },

    #[error("variable {0} is declared twice")]
    DuplicateVariable(String),

    #[error("bit-vector width {0} is outside 1..=64")]
    BadWidth(u32),

    #[error("extract [{hi}:{lo}] is out of range for width {width}")]
    BadExtract { hi: u32, lo: u32, width: u32 },

    #[error("unknown datatype #{0}")]
    UnknownDatatype(u32),

    #[error("datatype {datatype} has no constructor {ctor}")]
    UnknownConstructor { datatype: String, ctor: String },

    #[error("constructor {ctor} has no field {field}")]
    UnknownField { ctor: String, field: String },

    #[error("datatype {0} has no well-founded constructor")]
    IllFounded(String),

    #[error("assertions must be boolean, got {0}")]
    NonBooleanAssertion(String),
}

pub type FormulaResult<T> = Result<T, FormulaError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub id: VarId,
    pub name: String,
    pub sort: Sort,
}

/// Which truth value of an atom helps satisfy the enclosing assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    Positive,
    Negative,
    Both,
}

impl Polarity {
    #[must_use]
    pub const fn negate(self) -> Self {
        match self {
            Self::Positive => Self::Negative,
            Self::Negative => Self::Positive,
            Self::Both => Self::Both,
        }
    }

    /// The truth values the atom should take, most useful first.
    #[must_use]
    pub const fn wanted(self) -> &'static [bool] {
        match self {
            Self::Positive => &[true],
            Self::Negative => &[false],
            Self::Both => &[true, false],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomRef {
    pub term: TermId,
    pub polarity: Polarity,
    pub top_level: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    pub id: AssertionId,
    pub root: TermId,
    pub vars: SmallVec<[VarId; 4]>,
    pub atoms: Vec<AtomRef>,
}

#[derive(Debug, Clone)]
pub struct Formula {
    terms: Vec<Term>,
    sorts: Vec<Sort>,
    term_vars: Vec<SmallVec<[VarId; 4]>>,
    vars: Vec<Variable>,
    var_terms: Vec<TermId>,
    datatypes: Vec<DatatypeDecl>,
    dt_defaults: Vec<Value>,
    assertions: Vec<Assertion>,
    occurrences: Vec<SmallVec<[AssertionId; 4]>>,
    alphabet: Vec<char>,
}

impl Formula {
    #[must_use]
    pub fn term(&self, t: TermId) -> &Term {
        &self.terms[t.index()]
    }

    #[must_use]
    pub fn sort_of(&self, t: TermId) -> &Sort {
        &self.sorts[t.index()]
    }

    /// Variables occurring in `t`, sorted by id.
    #[must_use]
    pub fn vars_of(&self, t: TermId) -> &[VarId] {
        &self.term_vars[t.index()]
    }

    #[must_use]
    pub fn mentions(&self, t: TermId, var: VarId) -> bool {
        self.vars_of(t).binary_search(&var).is_ok()
    }

    #[must_use]
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn variables(&self) -> &[Variable] {
        &self.vars
    }

    #[must_use]
    pub fn variable(&self, v: VarId) -> &Variable {
        &self.vars[v.index()]
    }

    #[must_use]
    pub fn var_term(&self, v: VarId) -> TermId {
        self.var_terms[v.index()]
    }

    #[must_use]
    pub fn var_by_name(&self, name: &str) -> Option<VarId> {
        self.vars.iter().find(|v| v.name == name).map(|v| v.id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assertions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    #[must_use]
    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    #[must_use]
    pub fn assertion(&self, a: AssertionId) -> &Assertion {
        &self.assertions[a.index()]
    }

    /// Assertions in which `v` occurs, sorted by id.
    #[must_use]
    pub fn occurrences(&self, v: VarId) -> &[AssertionId] {
        &self.occurrences[v.index()]
    }

    #[must_use]
    pub fn datatype(&self, id: DatatypeId) -> &DatatypeDecl {
        &self.datatypes[id.index()]
    }

    #[must_use]
    pub fn datatypes(&self) -> &[DatatypeDecl] {
        &self.datatypes
    }

    /// Characters appearing in string constants, plus `'a'`, sorted.
    #[must_use]
    pub fn alphabet(&self) -> &[char] {
        &self.alphabet
    }

    #[must_use]
    pub fn default_value(&self, sort: &Sort) -> Value {
        match sort {
            Sort::Bool => Value::Bool(false),
            Sort::Int | Sort::Real => Value::zero_num(),
            Sort::BitVec(w) => Value::Bv(BvValue::zero(*w)),
            Sort::Datatype(id) => self.dt_defaults[id.index()].clone(),
            Sort::String => Value::Str(String::new()),
        }
    }

    pub fn random_value(&self, sort: &Sort, rng: &mut Random) -> Value {
        self.random_value_at(sort, rng, 0)
    }

    fn random_value_at(&self, sort: &Sort, rng: &mut Random, depth: usize) -> Value {
        match sort {
            Sort::Bool => Value::Bool(rng.flip()),
            Sort::Int | Sort::Real => Value::int(rng.int_in(-RANDOM_INT_RANGE, RANDOM_INT_RANGE)),
            Sort::BitVec(w) => Value::Bv(BvValue::new(*w, rng.bits())),
            Sort::Datatype(id) => {
                if depth >= RANDOM_DT_DEPTH {
                    return self.dt_defaults[id.index()].clone();
                }
                let decl = &self.datatypes[id.index()];
                let ctor = rng.below(decl.constructors.len());
                let args = decl.constructors[ctor]
                    .fields
                    .iter()
                    .map(|(_, s)| self.random_value_at(s, rng, depth + 1))
                    .collect();
                Value::Dt(DtValue {
                    datatype: *id,
                    ctor,
                    args,
                })
            }
            Sort::String => {
                let len = rng.below(RANDOM_STR_LEN + 1);
                let s = (0..len)
                    .filter_map(|_| rng.pick(&self.alphabet).copied())
                    .collect();
                Value::Str(s)
            }
        }
    }

    /// Distinct constants of `sort` occurring in the formula, in term order.
    #[must_use]
    pub fn constants_of(&self, sort: &Sort) -> Vec<Value> {
        self.terms
            .iter()
            .zip(&self.sorts)
            .filter_map(|(t, s)| match t {
                Term::Const(c) if s == sort => Some(c.clone()),
                _ => None,
            })
            .unique()
            .collect()
    }

    /// A value of constructor `ctor` whose fields hold their defaults.
    #[must_use]
    pub fn constructor_default(&self, datatype: DatatypeId, ctor: usize) -> Value {
        let args = self.datatypes[datatype.index()].constructors[ctor]
            .fields
            .iter()
            .map(|(_, s)| self.default_value(s))
            .collect();
        Value::Dt(DtValue {
            datatype,
            ctor,
            args,
        })
    }
}

/// Incrementally constructs a `Formula`.
#[derive(Debug, Clone, Default)]
pub struct FormulaBuilder {
    terms: Vec<Term>,
    sorts: Vec<Sort>,
    term_vars: Vec<SmallVec<[VarId; 4]>>,
    interned: FxHashMap<Term, TermId>,
    vars: Vec<Variable>,
    var_terms: Vec<TermId>,
    names: FxHashMap<String, VarId>,
    datatypes: Vec<DatatypeDecl>,
    dt_defaults: Vec<Value>,
    roots: Vec<TermId>,
    alphabet: Vec<char>,
}

impl FormulaBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, term: Term, sort: Sort) -> TermId {
        if let Some(&id) = self.interned.get(&term) {
            return id;
        }
        let vars: SmallVec<[VarId; 4]> = match &term {
            Term::Var(v) => smallvec::smallvec![*v],
            other => other
                .children()
                .iter()
                .flat_map(|c| self.term_vars[c.index()].iter().copied())
                .sorted()
                .dedup()
                .collect(),
        };
        let id = TermId(u32::try_from(self.terms.len()).unwrap_or(u32::MAX));
        self.terms.push(term.clone());
        self.sorts.push(sort);
        self.term_vars.push(vars);
        self.interned.insert(term, id);
        id
    }

    #[must_use]
    pub fn sort_of(&self, t: TermId) -> &Sort {
        &self.sorts[t.index()]
    }

    /// The id the next declared datatype will receive, for self-referential fields.
    #[must_use]
    pub fn next_datatype_id(&self) -> DatatypeId {
        DatatypeId(u32::try_from(self.datatypes.len()).unwrap_or(u32::MAX))
    }

    /// Declares a datatype. Fields may refer to earlier datatypes or to this one.
    ///
    /// # Errors
    ///
    /// If a field refers to an undeclared datatype, a width is invalid, or no
    /// constructor can be built from finite values.
    pub fn declare_datatype(&mut self, decl: DatatypeDecl) -> FormulaResult<DatatypeId> {
        let id = self.next_datatype_id();
        for ctor in &decl.constructors {
            for (_, sort) in &ctor.fields {
                match sort {
                    Sort::Datatype(other) if other.0 > id.0 => {
                        return Err(FormulaError::UnknownDatatype(other.0));
                    }
                    Sort::BitVec(w) => check_width(*w)?,
                    _ => {}
                }
            }
        }

        let default = decl
            .constructors
            .iter()
            .enumerate()
            .find(|(_, c)| {
                c.fields
                    .iter()
                    .all(|(_, s)| !matches!(s, Sort::Datatype(d) if *d == id))
            })
            .map(|(ctor, c)| {
                let args = c
                    .fields
                    .iter()
                    .map(|(_, s)| self.default_for(s))
                    .collect();
                Value::Dt(DtValue {
                    datatype: id,
                    ctor,
                    args,
                })
            })
            .ok_or_else(|| FormulaError::IllFounded(decl.name.clone()))?;

        self.datatypes.push(decl);
        self.dt_defaults.push(default);
        Ok(id)
    }

    fn default_for(&self, sort: &Sort) -> Value {
        match sort {
            Sort::Bool => Value::Bool(false),
            Sort::Int | Sort::Real => Value::zero_num(),
            Sort::BitVec(w) => Value::Bv(BvValue::zero(*w)),
            Sort::Datatype(id) => self.dt_defaults[id.index()].clone(),
            Sort::String => Value::Str(String::new()),
        }
    }

    fn datatype_decl(&self, id: DatatypeId) -> FormulaResult<&DatatypeDecl> {
        self.datatypes
            .get(id.index())
            .ok_or(FormulaError::UnknownDatatype(id.0))
    }

    fn constructor(&self, id: DatatypeId, ctor: &str) -> FormulaResult<(usize, &ConstructorDecl)> {
        let decl = self.datatype_decl(id)?;
        decl.constructor_index(ctor)
            .map(|i| (i, &decl.constructors[i]))
            .ok_or_else(|| FormulaError::UnknownConstructor {
                datatype: decl.name.clone(),
                ctor: ctor.to_string(),
            })
    }

    /// Declares a variable and returns the term referring to it.
    ///
    /// # Errors
    ///
    /// If the name is taken or the sort is invalid.
    pub fn var(&mut self, name: &str, sort: Sort) -> FormulaResult<TermId> {
        if self.names.contains_key(name) {
            return Err(FormulaError::DuplicateVariable(name.to_string()));
        }
        match &sort {
            Sort::BitVec(w) => check_width(*w)?,
            Sort::Datatype(id) => {
                self.datatype_decl(*id)?;
            }
            _ => {}
        }
        let id = VarId(u32::try_from(self.vars.len()).unwrap_or(u32::MAX));
        self.vars.push(Variable {
            id,
            name: name.to_string(),
            sort: sort.clone(),
        });
        self.names.insert(name.to_string(), id);
        let t = self.intern(Term::Var(id), sort);
        self.var_terms.push(t);
        Ok(t)
    }

    /// # Errors
    /// If the name is taken.
    pub fn bool_var(&mut self, name: &str) -> FormulaResult<TermId> {
        self.var(name, Sort::Bool)
    }

    /// # Errors
    /// If the name is taken.
    pub fn int_var(&mut self, name: &str) -> FormulaResult<TermId> {
        self.var(name, Sort::Int)
    }

    /// # Errors
    /// If the name is taken.
    pub fn real_var(&mut self, name: &str) -> FormulaResult<TermId> {
        self.var(name, Sort::Real)
    }

    /// # Errors
    /// If the name is taken or the width is invalid.
    pub fn bv_var(&mut self, name: &str, width: u32) -> FormulaResult<TermId> {
        self.var(name, Sort::BitVec(width))
    }

    /// # Errors
    /// If the name is taken.
    pub fn str_var(&mut self, name: &str) -> FormulaResult<TermId> {
        self.var(name, Sort::String)
    }

    pub fn bool(&mut self, b: bool) -> TermId {
        self.intern(Term::Const(Value::Bool(b)), Sort::Bool)
    }

    pub fn int(&mut self, n: i64) -> TermId {
        self.intern(Term::Const(Value::int(n)), Sort::Int)
    }

    pub fn real(&mut self, numer: i64, denom: i64) -> TermId {
        self.intern(Term::Const(Value::real(numer, denom)), Sort::Real)
    }

    /// # Errors
    /// If the width is invalid.
    pub fn bv(&mut self, width: u32, bits: u64) -> FormulaResult<TermId> {
        check_width(width)?;
        Ok(self.intern(
            Term::Const(Value::Bv(BvValue::new(width, bits))),
            Sort::BitVec(width),
        ))
    }

    pub fn string(&mut self, s: &str) -> TermId {
        self.alphabet.extend(s.chars());
        self.intern(Term::Const(Value::Str(s.to_string())), Sort::String)
    }

    fn expect(&self, op: &'static str, t: TermId, expected: &Sort) -> FormulaResult<()> {
        let actual = self.sort_of(t);
        if actual == expected {
            Ok(())
        } else {
            Err(mismatch(op, expected, actual))
        }
    }

    fn expect_numeric(&self, op: &'static str, t: TermId) -> FormulaResult<()> {
        let actual = self.sort_of(t);
        if actual.is_numeric() {
            Ok(())
        } else {
            Err(FormulaError::SortMismatch {
                op,
                expected: "Int or Real".to_string(),
                actual: actual.to_string(),
            })
        }
    }

    fn expect_bv(&self, op: &'static str, t: TermId) -> FormulaResult<u32> {
        self.sort_of(t)
            .bv_width()
            .ok_or_else(|| FormulaError::SortMismatch {
                op,
                expected: "BitVec".to_string(),
                actual: self.sort_of(t).to_string(),
            })
    }

    fn expect_same_bv(&self, op: &'static str, a: TermId, b: TermId) -> FormulaResult<u32> {
        let w = self.expect_bv(op, a)?;
        self.expect(op, b, &Sort::BitVec(w))?;
        Ok(w)
    }

    fn numeric_sort(&self, xs: &[TermId]) -> Sort {
        if xs.iter().any(|t| *self.sort_of(*t) == Sort::Real) {
            Sort::Real
        } else {
            Sort::Int
        }
    }

    /// # Errors
    /// If `t` is not boolean.
    pub fn not(&mut self, t: TermId) -> FormulaResult<TermId> {
        self.expect("not", t, &Sort::Bool)?;
        Ok(self.intern(Term::Not(t), Sort::Bool))
    }

    /// # Errors
    /// If an argument is not boolean.
    pub fn and(&mut self, xs: &[TermId]) -> FormulaResult<TermId> {
        for &x in xs {
            self.expect("and", x, &Sort::Bool)?;
        }
        Ok(match xs {
            [] => self.bool(true),
            [x] => *x,
            _ => self.intern(Term::And(xs.to_vec()), Sort::Bool),
        })
    }

    /// # Errors
    /// If an argument is not boolean.
    pub fn or(&mut self, xs: &[TermId]) -> FormulaResult<TermId> {
        for &x in xs {
            self.expect("or", x, &Sort::Bool)?;
        }
        Ok(match xs {
            [] => self.bool(false),
            [x] => *x,
            _ => self.intern(Term::Or(xs.to_vec()), Sort::Bool),
        })
    }

    /// # Errors
    /// If an argument is not boolean.
    pub fn implies(&mut self, a: TermId, b: TermId) -> FormulaResult<TermId> {
        self.expect("=>", a, &Sort::Bool)?;
        self.expect("=>", b, &Sort::Bool)?;
        Ok(self.intern(Term::Implies(a, b), Sort::Bool))
    }

    /// # Errors
    /// If the condition is not boolean or the branches differ in sort.
    pub fn ite(&mut self, c: TermId, t: TermId, e: TermId) -> FormulaResult<TermId> {
        self.expect("ite", c, &Sort::Bool)?;
        let sort = self.sort_of(t).clone();
        self.expect("ite", e, &sort)?;
        Ok(self.intern(Term::Ite(c, t, e), sort))
    }

    fn compatible(&self, a: TermId, b: TermId) -> bool {
        let (sa, sb) = (self.sort_of(a), self.sort_of(b));
        sa == sb || (sa.is_numeric() && sb.is_numeric())
    }

    /// # Errors
    /// If the sides have incompatible sorts.
    pub fn eq(&mut self, a: TermId, b: TermId) -> FormulaResult<TermId> {
        if !self.compatible(a, b) {
            return Err(mismatch("=", self.sort_of(a), self.sort_of(b)));
        }
        Ok(self.intern(Term::Eq(a, b), Sort::Bool))
    }

    /// # Errors
    /// If fewer than two arguments are given or their sorts differ.
    pub fn distinct(&mut self, xs: &[TermId]) -> FormulaResult<TermId> {
        if xs.len() < 2 {
            return Err(FormulaError::Arity {
                op: "distinct",
                min: 2,
                actual: xs.len(),
            });
        }
        for &x in &xs[1..] {
            if !self.compatible(xs[0], x) {
                return Err(mismatch("distinct", self.sort_of(xs[0]), self.sort_of(x)));
            }
        }
        Ok(self.intern(Term::Distinct(xs.to_vec()), Sort::Bool))
    }

    /// # Errors
    /// If an argument is not numeric.
    pub fn add(&mut self, xs: &[TermId]) -> FormulaResult<TermId> {
        for &x in xs {
            self.expect_numeric("+", x)?;
        }
        Ok(match xs {
            [] => self.int(0),
            [x] => *x,
            _ => {
                let sort = self.numeric_sort(xs);
                self.intern(Term::Add(xs.to_vec()), sort)
            }
        })
    }

    /// # Errors
    /// If an argument is not numeric.
    pub fn sub(&mut self, a: TermId, b: TermId) -> FormulaResult<TermId> {
        self.expect_numeric("-", a)?;
        self.expect_numeric("-", b)?;
        let sort = self.numeric_sort(&[a, b]);
        Ok(self.intern(Term::Sub(a, b), sort))
    }

    /// # Errors
    /// If an argument is not numeric.
    pub fn mul(&mut self, xs: &[TermId]) -> FormulaResult<TermId> {
        for &x in xs {
            self.expect_numeric("*", x)?;
        }
        Ok(match xs {
            [] => self.int(1),
            [x] => *x,
            _ => {
                let sort = self.numeric_sort(xs);
                self.intern(Term::Mul(xs.to_vec()), sort)
            }
        })
    }

    /// # Errors
    /// If the argument is not numeric.
    pub fn neg(&mut self, a: TermId) -> FormulaResult<TermId> {
        self.expect_numeric("-", a)?;
        let sort = self.sort_of(a).clone();
        Ok(self.intern(Term::Neg(a), sort))
    }

    fn comparison(
        &mut self,
        op: &'static str,
        a: TermId,
        b: TermId,
        make: fn(TermId, TermId) -> Term,
    ) -> FormulaResult<TermId> {
        self.expect_numeric(op, a)?;
        self.expect_numeric(op, b)?;
        Ok(self.intern(make(a, b), Sort::Bool))
    }

    /// # Errors
    /// If an argument is not numeric.
    pub fn le(&mut self, a: TermId, b: TermId) -> FormulaResult<TermId> {
        self.comparison("<=", a, b, Term::Le)
    }

    /// # Errors
    /// If an argument is not numeric.
    pub fn lt(&mut self, a: TermId, b: TermId) -> FormulaResult<TermId> {
        self.comparison("<", a, b, Term::Lt)
    }

    /// # Errors
    /// If an argument is not numeric.
    pub fn ge(&mut self, a: TermId, b: TermId) -> FormulaResult<TermId> {
        self.comparison(">=", a, b, Term::Ge)
    }

    /// # Errors
    /// If an argument is not numeric.
    pub fn gt(&mut self, a: TermId, b: TermId) -> FormulaResult<TermId> {
        self.comparison(">", a, b, Term::Gt)
    }

    /// # Errors
    /// If the argument is not a bit-vector.
    pub fn bv_not(&mut self, a: TermId) -> FormulaResult<TermId> {
        let w = self.expect_bv("bvnot", a)?;
        Ok(self.intern(Term::BvNot(a), Sort::BitVec(w)))
    }

    /// # Errors
    /// If the argument is not a bit-vector.
    pub fn bv_neg(&mut self, a: TermId) -> FormulaResult<TermId> {
        let w = self.expect_bv("bvneg", a)?;
        Ok(self.intern(Term::BvNeg(a), Sort::BitVec(w)))
    }

    fn bv_binary(
        &mut self,
        op: &'static str,
        a: TermId,
        b: TermId,
        make: fn(TermId, TermId) -> Term,
    ) -> FormulaResult<TermId> {
        let w = self.expect_same_bv(op, a, b)?;
        Ok(self.intern(make(a, b), Sort::BitVec(w)))
    }

    /// # Errors
    /// If the arguments are not bit-vectors of one width.
    pub fn bv_and(&mut self, a: TermId, b: TermId) -> FormulaResult<TermId> {
        self.bv_binary("bvand", a, b, Term::BvAnd)
    }

    /// # Errors
    /// If the arguments are not bit-vectors of one width.
    pub fn bv_or(&mut self, a: TermId, b: TermId) -> FormulaResult<TermId> {
        self.bv_binary("bvor", a, b, Term::BvOr)
    }

    /// # Errors
    /// If the arguments are not bit-vectors of one width.
    pub fn bv_xor(&mut self, a: TermId, b: TermId) -> FormulaResult<TermId> {
        self.bv_binary("bvxor", a, b, Term::BvXor)
    }

    /// # Errors
    /// If the arguments are not bit-vectors of one width.
    pub fn bv_add(&mut self, a: TermId, b: TermId) -> FormulaResult<TermId> {
        self.bv_binary("bvadd", a, b, Term::BvAdd)
    }

    /// # Errors
    /// If the arguments are not bit-vectors of one width.
    pub fn bv_sub(&mut self, a: TermId, b: TermId) -> FormulaResult<TermId> {
        self.bv_binary("bvsub", a, b, Term::BvSub)
    }

    /// # Errors
    /// If the arguments are not bit-vectors of one width.
    pub fn bv_mul(&mut self, a: TermId, b: TermId) -> FormulaResult<TermId> {
        self.bv_binary("bvmul", a, b, Term::BvMul)
    }

    /// # Errors
    /// If the arguments are not bit-vectors of one width.
    pub fn bv_shl(&mut self, a: TermId, b: TermId) -> FormulaResult<TermId> {
        self.bv_binary("bvshl", a, b, Term::BvShl)
    }

    /// # Errors
    /// If the arguments are not bit-vectors of one width.
    pub fn bv_lshr(&mut self, a: TermId, b: TermId) -> FormulaResult<TermId> {
        self.bv_binary("bvlshr", a, b, Term::BvLshr)
    }

    /// # Errors
    /// If the arguments are not bit-vectors of one width.
    pub fn bv_ult(&mut self, a: TermId, b: TermId) -> FormulaResult<TermId> {
        self.expect_same_bv("bvult", a, b)?;
        Ok(self.intern(Term::BvUlt(a, b), Sort::Bool))
    }

    /// # Errors
    /// If the arguments are not bit-vectors of one width.
    pub fn bv_ule(&mut self, a: TermId, b: TermId) -> FormulaResult<TermId> {
        self.expect_same_bv("bvule", a, b)?;
        Ok(self.intern(Term::BvUle(a, b), Sort::Bool))
    }

    /// # Errors
    /// If the argument is not a bit-vector or the range is invalid.
    pub fn bv_extract(&mut self, hi: u32, lo: u32, arg: TermId) -> FormulaResult<TermId> {
        let width = self.expect_bv("extract", arg)?;
        if lo > hi || hi >= width {
            return Err(FormulaError::BadExtract { hi, lo, width });
        }
        Ok(self.intern(Term::BvExtract { hi, lo, arg }, Sort::BitVec(hi - lo + 1)))
    }

    /// # Errors
    /// If an argument is not a bit-vector or the result is wider than 64 bits.
    pub fn bv_concat(&mut self, a: TermId, b: TermId) -> FormulaResult<TermId> {
        let wa = self.expect_bv("concat", a)?;
        let wb = self.expect_bv("concat", b)?;
        check_width(wa + wb)?;
        Ok(self.intern(Term::BvConcat(a, b), Sort::BitVec(wa + wb)))
    }

    /// Declares a datatype variable.
    ///
    /// # Errors
    /// If the name is taken or the datatype is unknown.
    pub fn dt_var(&mut self, name: &str, datatype: DatatypeId) -> FormulaResult<TermId> {
        self.var(name, Sort::Datatype(datatype))
    }

    /// # Errors
    /// If the constructor is unknown or the arguments do not fit its fields.
    pub fn construct(
        &mut self,
        datatype: DatatypeId,
        ctor: &str,
        args: &[TermId],
    ) -> FormulaResult<TermId> {
        let (index, decl) = self.constructor(datatype, ctor)?;
        if decl.fields.len() != args.len() {
            return Err(FormulaError::Arity {
                op: "constructor",
                min: decl.fields.len(),
                actual: args.len(),
            });
        }
        let fields: Vec<Sort> = decl.fields.iter().map(|(_, s)| s.clone()).collect();
        for (arg, sort) in args.iter().zip(&fields) {
            self.expect("constructor", *arg, sort)?;
        }
        Ok(self.intern(
            Term::Construct {
                datatype,
                ctor: index,
                args: args.to_vec(),
            },
            Sort::Datatype(datatype),
        ))
    }

    /// # Errors
    /// If the constructor or field is unknown, or `arg` has another sort.
    pub fn select(
        &mut self,
        datatype: DatatypeId,
        ctor: &str,
        field: &str,
        arg: TermId,
    ) -> FormulaResult<TermId> {
        self.expect("selector", arg, &Sort::Datatype(datatype))?;
        let (index, decl) = self.constructor(datatype, ctor)?;
        let field_index = decl
            .field_index(field)
            .ok_or_else(|| FormulaError::UnknownField {
                ctor: ctor.to_string(),
                field: field.to_string(),
            })?;
        let sort = decl.fields[field_index].1.clone();
        Ok(self.intern(
            Term::Select {
                datatype,
                ctor: index,
                field: field_index,
                arg,
            },
            sort,
        ))
    }

    /// # Errors
    /// If the constructor is unknown or `arg` has another sort.
    pub fn test(&mut self, datatype: DatatypeId, ctor: &str, arg: TermId) -> FormulaResult<TermId> {
        self.expect("tester", arg, &Sort::Datatype(datatype))?;
        let (index, _) = self.constructor(datatype, ctor)?;
        Ok(self.intern(
            Term::Test {
                datatype,
                ctor: index,
                arg,
            },
            Sort::Bool,
        ))
    }

    /// # Errors
    /// If an argument is not a string.
    pub fn str_concat(&mut self, xs: &[TermId]) -> FormulaResult<TermId> {
        for &x in xs {
            self.expect("str.++", x, &Sort::String)?;
        }
        Ok(match xs {
            [] => self.string(""),
            [x] => *x,
            _ => self.intern(Term::StrConcat(xs.to_vec()), Sort::String),
        })
    }

    /// # Errors
    /// If the argument is not a string.
    pub fn str_len(&mut self, s: TermId) -> FormulaResult<TermId> {
        self.expect("str.len", s, &Sort::String)?;
        Ok(self.intern(Term::StrLen(s), Sort::Int))
    }

    fn str_predicate(
        &mut self,
        op: &'static str,
        a: TermId,
        b: TermId,
        make: fn(TermId, TermId) -> Term,
    ) -> FormulaResult<TermId> {
        self.expect(op, a, &Sort::String)?;
        self.expect(op, b, &Sort::String)?;
        Ok(self.intern(make(a, b), Sort::Bool))
    }

    /// `(str.contains haystack needle)`
    ///
    /// # Errors
    /// If an argument is not a string.
    pub fn str_contains(&mut self, haystack: TermId, needle: TermId) -> FormulaResult<TermId> {
        self.str_predicate("str.contains", haystack, needle, Term::StrContains)
    }

    /// `(str.prefixof prefix s)`
    ///
    /// # Errors
    /// If an argument is not a string.
    pub fn str_prefix_of(&mut self, prefix: TermId, s: TermId) -> FormulaResult<TermId> {
        self.str_predicate("str.prefixof", prefix, s, Term::StrPrefixOf)
    }

    /// `(str.suffixof suffix s)`
    ///
    /// # Errors
    /// If an argument is not a string.
    pub fn str_suffix_of(&mut self, suffix: TermId, s: TermId) -> FormulaResult<TermId> {
        self.str_predicate("str.suffixof", suffix, s, Term::StrSuffixOf)
    }

    /// # Errors
    /// If `s` is not a string or `i` is not an integer.
    pub fn str_at(&mut self, s: TermId, i: TermId) -> FormulaResult<TermId> {
        self.expect("str.at", s, &Sort::String)?;
        self.expect("str.at", i, &Sort::Int)?;
        Ok(self.intern(Term::StrAt(s, i), Sort::String))
    }

    /// Adds an assertion. Returns its id.
    ///
    /// # Errors
    /// If `t` is not boolean.
    pub fn assert(&mut self, t: TermId) -> FormulaResult<AssertionId> {
        if *self.sort_of(t) != Sort::Bool {
            return Err(FormulaError::NonBooleanAssertion(self.sort_of(t).to_string()));
        }
        let id = AssertionId(u32::try_from(self.roots.len()).unwrap_or(u32::MAX));
        self.roots.push(t);
        Ok(id)
    }

    fn collect_atoms(
        &self,
        t: TermId,
        polarity: Polarity,
        top_level: bool,
        out: &mut Vec<AtomRef>,
    ) {
        match &self.terms[t.index()] {
            Term::Not(a) => self.collect_atoms(*a, polarity.negate(), top_level, out),
            Term::And(xs) => {
                let top = top_level && polarity == Polarity::Positive;
                for &x in xs {
                    self.collect_atoms(x, polarity, top, out);
                }
            }
            Term::Or(xs) => {
                let top = top_level && polarity == Polarity::Negative;
                for &x in xs {
                    self.collect_atoms(x, polarity, top, out);
                }
            }
            Term::Implies(a, b) => {
                self.collect_atoms(*a, polarity.negate(), false, out);
                self.collect_atoms(*b, polarity, false, out);
            }
            Term::Ite(c, a, b) => {
                self.collect_atoms(*c, Polarity::Both, false, out);
                self.collect_atoms(*a, polarity, false, out);
                self.collect_atoms(*b, polarity, false, out);
            }
            Term::Const(_) => {}
            _ => {
                if let Some(existing) = out.iter_mut().find(|r| r.term == t) {
                    if existing.polarity != polarity {
                        existing.polarity = Polarity::Both;
                    }
                    existing.top_level |= top_level;
                } else {
                    out.push(AtomRef {
                        term: t,
                        polarity,
                        top_level,
                    });
                }
            }
        }
    }

    /// Finishes construction.
    #[must_use]
    pub fn build(self) -> Formula {
        let mut occurrences: Vec<SmallVec<[AssertionId; 4]>> =
            vec![SmallVec::new(); self.vars.len()];
        let assertions: Vec<Assertion> = self
            .roots
            .iter()
            .enumerate()
            .map(|(i, &root)| {
                let id = AssertionId(u32::try_from(i).unwrap_or(u32::MAX));
                let vars: SmallVec<[VarId; 4]> = self.term_vars[root.index()].clone();
                for v in &vars {
                    let occ = &mut occurrences[v.index()];
                    if occ.last() != Some(&id) {
                        occ.push(id);
                    }
                }
                let mut atoms = Vec::new();
                self.collect_atoms(root, Polarity::Positive, true, &mut atoms);
                Assertion {
                    id,
                    root,
                    vars,
                    atoms,
                }
            })
            .collect();

        let mut alphabet = self.alphabet;
        alphabet.push('a');
        alphabet.sort_unstable();
        alphabet.dedup();

        Formula {
            terms: self.terms,
            sorts: self.sorts,
            term_vars: self.term_vars,
            vars: self.vars,
            var_terms: self.var_terms,
            datatypes: self.datatypes,
            dt_defaults: self.dt_defaults,
            assertions,
            occurrences,
            alphabet,
        }
    }
}

fn check_width(width: u32) -> FormulaResult<()> {
    if (1..=MAX_BV_WIDTH).contains(&width) {
        Ok(())
    } else {
        Err(FormulaError::BadWidth(width))
    }
}

fn mismatch(op: &'static str, expected: &Sort, actual: &Sort) -> FormulaError {
    FormulaError::SortMismatch {
        op,
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_consing() -> FormulaResult<()> {
        let mut b = FormulaBuilder::new();
        let x = b.int_var("x")?;
        let one = b.int(1);
        let s1 = b.add(&[x, one])?;
        let s2 = b.add(&[x, one])?;
        assert_eq!(s1, s2);
        Ok(())
    }

    #[test]
    fn test_sort_mismatch() -> FormulaResult<()> {
        let mut b = FormulaBuilder::new();
        let x = b.int_var("x")?;
        let p = b.bool_var("p")?;
        assert!(matches!(b.add(&[x, p]), Err(FormulaError::SortMismatch { .. })));
        assert!(matches!(b.assert(x), Err(FormulaError::NonBooleanAssertion(_))));
        assert!(matches!(b.int_var("x"), Err(FormulaError::DuplicateVariable(_))));
        assert!(matches!(b.bv_var("w", 65), Err(FormulaError::BadWidth(65))));
        Ok(())
    }

    #[test]
    fn test_occurrences_and_atoms() -> FormulaResult<()> {
        let mut b = FormulaBuilder::new();
        let x = b.int_var("x")?;
        let y = b.int_var("y")?;
        let p = b.bool_var("p")?;
        let zero = b.int(0);
        let le = b.le(x, zero)?;
        let ge = b.ge(y, zero)?;
        let np = b.not(p)?;
        let or = b.or(&[le, np])?;
        let and = b.and(&[or, ge])?;
        b.assert(and)?;
        b.assert(ge)?;
        let f = b.build();

        let xv = f.var_by_name("x").unwrap_or_default();
        let yv = f.var_by_name("y").unwrap_or_default();
        assert_eq!(f.occurrences(xv), &[AssertionId(0)]);
        assert_eq!(f.occurrences(yv), &[AssertionId(0), AssertionId(1)]);

        let atoms = &f.assertion(AssertionId(0)).atoms;
        assert_eq!(atoms.len(), 3);
        let p_atom = atoms.iter().find(|a| a.term == p).copied();
        assert_eq!(p_atom.map(|a| a.polarity), Some(Polarity::Negative));
        assert_eq!(p_atom.map(|a| a.top_level), Some(false));
        let ge_atom = atoms.iter().find(|a| a.term == ge).copied();
        assert_eq!(ge_atom.map(|a| a.top_level), Some(true));
        Ok(())
    }

    #[test]
    fn test_ill_founded_datatype() {
        let mut b = FormulaBuilder::new();
        let id = b.next_datatype_id();
        let decl = DatatypeDecl::new(
            "Stream",
            vec![ConstructorDecl::new(
                "cons",
                vec![("tail".to_string(), Sort::Datatype(id))],
            )],
        );
        assert!(matches!(b.declare_datatype(decl), Err(FormulaError::IllFounded(_))));
    }

    #[test]
    fn test_datatype_default() -> FormulaResult<()> {
        let mut b = FormulaBuilder::new();
        let id = b.next_datatype_id();
        let list = DatatypeDecl::new(
            "List",
            vec![
                ConstructorDecl::new(
                    "cons",
                    vec![
                        ("head".to_string(), Sort::Int),
                        ("tail".to_string(), Sort::Datatype(id)),
                    ],
                ),
                ConstructorDecl::new("nil", vec![]),
            ],
        );
        let id = b.declare_datatype(list)?;
        let f = b.build();
        let default = f.default_value(&Sort::Datatype(id));
        assert_eq!(default.as_dt().map(|d| d.ctor), Some(1));
        Ok(())
    }
}

//! Moves for algebraic datatype variables.
//!
//! In axiomatic mode the mover switches constructors, nudges scalar fields,
//! and proposes the values that equality, tester and selector atoms ask for.
//! Otherwise it draws from a finite set of representative values per
//! datatype built once from the formula's constants.

use crate::sls::config::SearchConfig;
use crate::sls::formula::{AssertionId, Formula};
use crate::sls::random::Random;
use crate::sls::sort::{DatatypeId, Sort};
use crate::sls::term::{Term, VarId};
use crate::sls::theory::{CandidateMove, MoveContext, MoveKind, TheoryMover};
use crate::sls::value::{DtValue, Value};
use itertools::Itertools;
use num_rational::BigRational;
use num_traits::One;

/// Nesting depth of representative values.
pub const REPRESENTATIVE_DEPTH: usize = 2;
/// Representatives kept per datatype.
pub const MAX_REPRESENTATIVES: usize = 64;
/// Constants of a field sort tried per field.
const CONSTANTS_PER_FIELD: usize = 3;

#[derive(Debug, Clone)]
pub struct DatatypeMover {
    axiomatic: bool,
    representatives: Vec<Vec<Value>>,
}

impl DatatypeMover {
    #[must_use]
    pub fn new(formula: &Formula, config: &SearchConfig) -> Self {
        let representatives = if config.dt_axiomatic {
            Vec::new()
        } else {
            (0..formula.datatypes().len())
                .map(|i| {
                    let id = DatatypeId(u32::try_from(i).unwrap_or(u32::MAX));
                    representatives(formula, id, REPRESENTATIVE_DEPTH)
                })
                .collect()
        };
        Self {
            axiomatic: config.dt_axiomatic,
            representatives,
        }
    }

    #[must_use]
    pub fn representatives_of(&self, id: DatatypeId) -> &[Value] {
        self.representatives.get(id.index()).map_or(&[], Vec::as_slice)
    }

    fn axiomatic_moves(
        ctx: &MoveContext<'_>,
        target: Option<AssertionId>,
        var: VarId,
        current: &DtValue,
        out: &mut Vec<CandidateMove>,
    ) {
        let f = ctx.formula;
        let eval = ctx.eval();

        for (atom, want) in ctx.unsatisfied_atoms(target, var, false, false) {
            match f.term(atom) {
                Term::Eq(a, b) if want => {
                    for (side, other) in [(*a, *b), (*b, *a)] {
                        if f.mentions(other, var) {
                            continue;
                        }
                        match f.term(side) {
                            Term::Var(v) if *v == var => {
                                let value = eval.value(other);
                                out.push(CandidateMove::new(var, value, MoveKind::Assign));
                            }
                            Term::Select { ctor, field, arg, .. } if ctx.is_var(*arg, var) => {
                                let mut value = if current.ctor == *ctor {
                                    current.clone()
                                } else {
                                    match f.constructor_default(current.datatype, *ctor) {
                                        Value::Dt(dt) => dt,
                                        _ => continue,
                                    }
                                };
                                value.args[*field] = eval.value(other);
                                let value = Value::Dt(value);
                                out.push(CandidateMove::new(var, value, MoveKind::Assign));
                            }
                            _ => {}
                        }
                    }
                }
                Term::Test { ctor, arg, .. } if want && ctx.is_var(*arg, var) => {
                    out.push(CandidateMove::new(
                        var,
                        f.constructor_default(current.datatype, *ctor),
                        MoveKind::Constructor { ctor: *ctor },
                    ));
                }
                _ => {}
            }
        }

        let decl = f.datatype(current.datatype);
        for ctor in 0..decl.constructors.len() {
            if ctor != current.ctor {
                out.push(CandidateMove::new(
                    var,
                    f.constructor_default(current.datatype, ctor),
                    MoveKind::Constructor { ctor },
                ));
            }
        }

        for (i, arg) in current.args.iter().enumerate() {
            let nudged: Vec<Value> = match arg {
                Value::Bool(b) => vec![Value::Bool(!b)],
                Value::Num(n) => vec![
                    Value::Num(n + BigRational::one()),
                    Value::Num(n - BigRational::one()),
                ],
                _ => Vec::new(),
            };
            for v in nudged {
                let mut value = current.clone();
                value.args[i] = v;
                out.push(CandidateMove::new(var, Value::Dt(value), MoveKind::Assign));
            }
        }
    }
}

/// Up to `MAX_REPRESENTATIVES` values of datatype `id`, nested at most
/// `depth` constructors deep below the root.
#[must_use]
pub fn representatives(formula: &Formula, id: DatatypeId, depth: usize) -> Vec<Value> {
    let decl = formula.datatype(id);
    let mut out = Vec::new();
    for (ctor, c) in decl.constructors.iter().enumerate() {
        if c.fields.is_empty() {
            out.push(Value::Dt(DtValue {
                datatype: id,
                ctor,
                args: Vec::new(),
            }));
            continue;
        }
        let choices: Vec<Vec<Value>> = c
            .fields
            .iter()
            .map(|(_, sort)| field_choices(formula, sort, depth))
            .collect();
        for args in choices.into_iter().multi_cartesian_product() {
            if out.len() >= MAX_REPRESENTATIVES {
                return out;
            }
            out.push(Value::Dt(DtValue {
                datatype: id,
                ctor,
                args,
            }));
        }
    }
    out.truncate(MAX_REPRESENTATIVES);
    out
}

fn field_choices(formula: &Formula, sort: &Sort, depth: usize) -> Vec<Value> {
    match sort {
        Sort::Datatype(_) if depth == 0 => vec![formula.default_value(sort)],
        Sort::Datatype(d) => representatives(formula, *d, depth - 1)
            .into_iter()
            .take(CONSTANTS_PER_FIELD + 1)
            .collect(),
        _ => std::iter::once(formula.default_value(sort))
            .chain(formula.constants_of(sort))
            .unique()
            .take(CONSTANTS_PER_FIELD + 1)
            .collect(),
    }
}

impl TheoryMover for DatatypeMover {
    fn propose(
        &self,
        ctx: &MoveContext<'_>,
        target: Option<AssertionId>,
        var: VarId,
        _rng: &mut Random,
        out: &mut Vec<CandidateMove>,
    ) {
        let Some(current) = ctx.current(var).as_dt() else {
            return;
        };
        if self.axiomatic {
            Self::axiomatic_moves(ctx, target, var, current, out);
        } else {
            for value in self.representatives_of(current.datatype) {
                out.push(CandidateMove::new(var, value.clone(), MoveKind::Assign));
            }
        }
    }
}

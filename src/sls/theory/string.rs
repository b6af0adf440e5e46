//! Moves for string variables.
//!
//! Two families of edits, selected by `str_update_strategy`:
//! - single-character edits: delete, replace or insert one character taken
//!   from the formula's alphabet;
//! - subsequence edits: values that equality, concatenation, containment,
//!   prefix and suffix atoms ask for, lengths solved from arithmetic atoms
//!   over `str.len`, dropping the first or last character, and the empty
//!   string.

use crate::sls::config::{SearchConfig, StrUpdateStrategy};
use crate::sls::formula::AssertionId;
use crate::sls::random::Random;
use crate::sls::term::{Term, TermId, VarId};
use crate::sls::theory::arith::{comparison, solve_linear};
use crate::sls::theory::{CandidateMove, MoveContext, MoveKind, TheoryMover};
use crate::sls::value::Value;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::ToPrimitive;

/// Longest string a length-solving move may produce.
const MAX_SOLVED_LEN: usize = 1 << 12;

#[derive(Debug, Clone, Copy)]
pub struct StringMover {
    strategy: StrUpdateStrategy,
}

impl StringMover {
    #[must_use]
    pub const fn new(config: &SearchConfig) -> Self {
        Self {
            strategy: config.str_strategy(),
        }
    }

    fn char_edits(ctx: &MoveContext<'_>, var: VarId, s: &str, out: &mut Vec<CandidateMove>) {
        let chars: Vec<char> = s.chars().collect();
        let alphabet = ctx.formula.alphabet();
        let edit = |position: usize, value: String| {
            CandidateMove::new(var, Value::Str(value), MoveKind::Edit { position })
        };
        for i in 0..chars.len() {
            let mut deleted = chars.clone();
            deleted.remove(i);
            out.push(edit(i, deleted.into_iter().collect()));
        }
        for i in 0..chars.len() {
            for &c in alphabet {
                if c != chars[i] {
                    let mut replaced = chars.clone();
                    replaced[i] = c;
                    out.push(edit(i, replaced.into_iter().collect()));
                }
            }
        }
        for i in 0..=chars.len() {
            for &c in alphabet {
                let mut inserted = chars.clone();
                inserted.insert(i, c);
                out.push(edit(i, inserted.into_iter().collect()));
            }
        }
    }

    fn subsequence_edits(
        ctx: &MoveContext<'_>,
        target: Option<AssertionId>,
        var: VarId,
        s: &str,
        out: &mut Vec<CandidateMove>,
    ) {
        let mut values: Vec<String> = Vec::new();
        for (atom, want) in ctx.unsatisfied_atoms(target, var, false, false) {
            implied_values(ctx, atom, want, var, s, &mut values);
            solved_lengths(ctx, atom, want, var, s, &mut values);
        }
        let mut chars = s.chars();
        if chars.next().is_some() {
            values.push(chars.as_str().to_string());
            let mut chars = s.chars();
            chars.next_back();
            values.push(chars.as_str().to_string());
            values.push(String::new());
        }
        out.extend(
            values
                .into_iter()
                .map(|v| CandidateMove::new(var, Value::Str(v), MoveKind::Subsequence)),
        );
    }
}

/// The middle part `m` such that `pre ++ m ++ post == whole`, if any.
fn solve_concat(whole: &str, pre: &str, post: &str) -> Option<String> {
    let rest = whole.strip_prefix(pre)?;
    rest.strip_suffix(post).map(str::to_string)
}

fn implied_values(
    ctx: &MoveContext<'_>,
    atom: TermId,
    want: bool,
    var: VarId,
    s: &str,
    out: &mut Vec<String>,
) {
    let f = ctx.formula;
    let eval = ctx.eval();
    match (f.term(atom), want) {
        (Term::Eq(a, b), true) => {
            for (side, other) in [(*a, *b), (*b, *a)] {
                if f.mentions(other, var) {
                    continue;
                }
                let whole = eval.string(other);
                match f.term(side) {
                    Term::Var(v) if *v == var => out.push(whole),
                    Term::StrConcat(xs) => {
                        let direct: Vec<usize> = xs
                            .iter()
                            .enumerate()
                            .filter(|(_, x)| f.mentions(**x, var))
                            .map(|(i, _)| i)
                            .collect();
                        if let &[i] = direct.as_slice() {
                            if ctx.is_var(xs[i], var) {
                                let pre: String = xs[..i].iter().map(|x| eval.string(*x)).collect();
                                let post: String =
                                    xs[i + 1..].iter().map(|x| eval.string(*x)).collect();
                                if let Some(m) = solve_concat(&whole, &pre, &post) {
                                    out.push(m);
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        (Term::StrContains(h, n), true) => {
            if ctx.is_var(*h, var) && !f.mentions(*n, var) {
                let needle = eval.string(*n);
                out.push(format!("{s}{needle}"));
                out.push(format!("{needle}{s}"));
                out.push(needle);
            } else if ctx.is_var(*n, var) && !f.mentions(*h, var) {
                out.push(eval.string(*h));
            }
        }
        (Term::StrContains(h, n), false) => {
            if ctx.is_var(*h, var) && !f.mentions(*n, var) {
                let needle = eval.string(*n);
                if !needle.is_empty() {
                    out.push(s.replace(&needle, ""));
                }
            }
        }
        (Term::StrPrefixOf(p, x), true) => {
            if ctx.is_var(*x, var) && !f.mentions(*p, var) {
                let prefix = eval.string(*p);
                out.push(format!("{prefix}{s}"));
                out.push(prefix);
            } else if ctx.is_var(*p, var) && !f.mentions(*x, var) {
                out.push(eval.string(*x));
            }
        }
        (Term::StrSuffixOf(p, x), true) => {
            if ctx.is_var(*x, var) && !f.mentions(*p, var) {
                let suffix = eval.string(*p);
                out.push(format!("{s}{suffix}"));
                out.push(suffix);
            } else if ctx.is_var(*p, var) && !f.mentions(*x, var) {
                out.push(eval.string(*x));
            }
        }
        _ => {}
    }
}

/// Lengths that solve an arithmetic atom over `str.len`, by the same secant
/// as the arithmetic lookahead, with one filler character appended as the
/// second sample.
fn solved_lengths(
    ctx: &MoveContext<'_>,
    atom: TermId,
    want: bool,
    var: VarId,
    s: &str,
    out: &mut Vec<String>,
) {
    let Some((lhs, rhs, rel)) = comparison(ctx.formula, atom, want) else {
        return;
    };
    let Some(&filler) = ctx.formula.alphabet().first() else {
        return;
    };
    let eval = ctx.eval();
    let longer = Value::Str(format!("{s}{filler}"));
    let ahead = eval.with_override(var, &longer);
    let g0 = eval.num(lhs) - eval.num(rhs);
    let g1 = ahead.num(lhs) - ahead.num(rhs);
    let len = s.chars().count();
    let x0 = BigRational::from_integer(BigInt::from(len));
    for target in solve_linear(&x0, &g0, &g1, rel, true) {
        let Some(n) = target.to_integer().to_usize() else {
            continue;
        };
        if n > MAX_SOLVED_LEN {
            continue;
        }
        let value = if n <= len {
            s.chars().take(n).collect()
        } else {
            let mut v = s.to_string();
            v.extend(std::iter::repeat_n(filler, n - len));
            v
        };
        out.push(value);
    }
}

impl TheoryMover for StringMover {
    fn propose(
        &self,
        ctx: &MoveContext<'_>,
        target: Option<AssertionId>,
        var: VarId,
        _rng: &mut Random,
        out: &mut Vec<CandidateMove>,
    ) {
        let Some(s) = ctx.current(var).as_str() else {
            return;
        };
        match self.strategy {
            StrUpdateStrategy::SingleChar => Self::char_edits(ctx, var, s, out),
            StrUpdateStrategy::Subsequence => Self::subsequence_edits(ctx, target, var, s, out),
            StrUpdateStrategy::Combined => {
                Self::subsequence_edits(ctx, target, var, s, out);
                Self::char_edits(ctx, var, s, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sls::assignment::Assignment;
    use crate::sls::eval::Evaluator;
    use crate::sls::formula::{Formula, FormulaBuilder, FormulaResult};
    use crate::sls::score::ScoreCache;

    fn propose(f: &Formula, a: AssertionId, strategy: u32, current: &str) -> Vec<CandidateMove> {
        let mut assignment = Assignment::baseline(f);
        assignment.set(VarId(0), Value::Str(current.to_string()));
        let weights = vec![40; f.len()];
        let cache = ScoreCache::new(f, &assignment, &weights);
        let ctx = MoveContext::new(f, &assignment, &cache);
        let config = SearchConfig {
            str_update_strategy: strategy,
            ..SearchConfig::default()
        };
        let mut out = Vec::new();
        StringMover::new(&config).propose(&ctx, Some(a), VarId(0), &mut Random::new(0), &mut out);
        out
    }

    fn solves(f: &Formula, a: AssertionId, moves: &[CandidateMove]) -> bool {
        moves.iter().any(|c| {
            let values = vec![c.value.clone()];
            Evaluator::new(f, &values).satisfied(a)
        })
    }

    #[test]
    fn test_concat_equation() -> FormulaResult<()> {
        let mut b = FormulaBuilder::new();
        let s = b.str_var("s")?;
        let pre = b.string("ab");
        let post = b.string("z");
        let whole = b.string("abcdz");
        let cat = b.str_concat(&[pre, s, post])?;
        let eq = b.eq(cat, whole)?;
        let a = b.assert(eq)?;
        let f = b.build();

        let moves = propose(&f, a, 1, "");
        assert_eq!(moves[0].value, Value::Str("cd".to_string()));
        Ok(())
    }

    #[test]
    fn test_length_solving() -> FormulaResult<()> {
        let mut b = FormulaBuilder::new();
        let s = b.str_var("s")?;
        let len = b.str_len(s)?;
        let five = b.int(5);
        let eq = b.eq(len, five)?;
        let a = b.assert(eq)?;
        let f = b.build();

        assert!(solves(&f, a, &propose(&f, a, 1, "ab")));
        assert!(solves(&f, a, &propose(&f, a, 1, "abcdefgh")));
        Ok(())
    }

    #[test]
    fn test_single_char_edits() -> FormulaResult<()> {
        let mut b = FormulaBuilder::new();
        let s = b.str_var("s")?;
        let target = b.string("ab");
        let eq = b.eq(s, target)?;
        let a = b.assert(eq)?;
        let f = b.build();

        let moves = propose(&f, a, 0, "b");
        assert!(moves.iter().all(|c| matches!(c.kind, MoveKind::Edit { .. })));
        assert!(solves(&f, a, &moves));
        // one delete, one replace, four inserts over {a, b}
        assert_eq!(moves.len(), 1 + 1 + 4);
        Ok(())
    }

    #[test]
    fn test_contains() -> FormulaResult<()> {
        let mut b = FormulaBuilder::new();
        let s = b.str_var("s")?;
        let needle = b.string("xy");
        let c = b.str_contains(s, needle)?;
        let a = b.assert(c)?;
        let f = b.build();
        assert!(solves(&f, a, &propose(&f, a, 2, "q")));
        Ok(())
    }
}

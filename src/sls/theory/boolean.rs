use crate::sls::formula::AssertionId;
use crate::sls::random::Random;
use crate::sls::term::VarId;
use crate::sls::theory::{CandidateMove, MoveContext, MoveKind, TheoryMover};
use crate::sls::value::Value;

/// Boolean variables have exactly one move: the flip.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolMover;

impl TheoryMover for BoolMover {
    fn propose(
        &self,
        ctx: &MoveContext<'_>,
        _target: Option<AssertionId>,
        var: VarId,
        _rng: &mut Random,
        out: &mut Vec<CandidateMove>,
    ) {
        if let Some(b) = ctx.current(var).as_bool() {
            out.push(CandidateMove::new(var, Value::Bool(!b), MoveKind::Flip));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sls::assignment::Assignment;
    use crate::sls::formula::{FormulaBuilder, FormulaResult};
    use crate::sls::score::ScoreCache;

    #[test]
    fn test_flip() -> FormulaResult<()> {
        let mut b = FormulaBuilder::new();
        let p = b.bool_var("p")?;
        b.assert(p)?;
        let f = b.build();
        let a = Assignment::baseline(&f);
        let cache = ScoreCache::new(&f, &a, &[40]);
        let ctx = MoveContext::new(&f, &a, &cache);
        let mut out = Vec::new();
        BoolMover.propose(&ctx, None, VarId(0), &mut Random::new(0), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, Value::Bool(true));
        assert_eq!(out[0].kind, MoveKind::Flip);
        Ok(())
    }
}

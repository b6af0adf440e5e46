use num_rational::BigRational;
use sls_solver::ksat::generator::KSat;
use sls_solver::queens::solver::Queens;
use sls_solver::sls::assertion_selection::Selector;
use sls_solver::sls::config::{SearchConfig, SearchOverrides};
use sls_solver::sls::engine::Engine;
use sls_solver::sls::eval::Evaluator;
use sls_solver::sls::formula::{AssertionId, Formula, FormulaBuilder, FormulaResult};
use sls_solver::sls::governor::Interrupt;
use sls_solver::sls::solver::{Limit, Model, SearchOutcome, Solver, Verdict};
use sls_solver::sls::sort::{ConstructorDecl, DatatypeDecl, Sort};
use sls_solver::sls::trace::TraceContext;
use sls_solver::sls::value::{BvValue, Value};
use std::time::Duration;

fn config(max_repairs: u32) -> SearchConfig {
    SearchConfig {
        max_repairs,
        ..SearchConfig::default()
    }
}

fn run(formula: &Formula, config: SearchConfig) -> SearchOutcome {
    let trace = TraceContext::disabled();
    Engine::new(formula, config, &trace).run()
}

fn holds(formula: &Formula, model: &Model) -> bool {
    let eval = Evaluator::new(formula, model.values());
    formula.assertions().iter().all(|a| eval.satisfied(a.id))
}

fn expect_sat(formula: &Formula, outcome: &SearchOutcome) -> Model {
    match &outcome.verdict {
        Verdict::Sat(model) => {
            assert!(holds(formula, model), "returned model violates the formula");
            model.clone()
        }
        other => panic!("expected sat, got {other}"),
    }
}

fn int_of(model: &Model, f: &Formula, name: &str) -> i64 {
    model.value_of(f, name).and_then(Value::as_i64).unwrap()
}

/// `x + y = 10`
fn linear_sum() -> FormulaResult<Formula> {
    let mut b = FormulaBuilder::new();
    let x = b.int_var("x")?;
    let y = b.int_var("y")?;
    let sum = b.add(&[x, y])?;
    let ten = b.int(10);
    let eq = b.eq(sum, ten)?;
    b.assert(eq)?;
    Ok(b.build())
}

/// `x = 1`, `x = 2`
fn contradiction() -> FormulaResult<Formula> {
    let mut b = FormulaBuilder::new();
    let x = b.int_var("x")?;
    let one = b.int(1);
    let two = b.int(2);
    let a = b.eq(x, one)?;
    let c = b.eq(x, two)?;
    b.assert(a)?;
    b.assert(c)?;
    Ok(b.build())
}

/// `x = 5`, `y = 7`: each repair can fix at most one of them.
fn two_targets() -> FormulaResult<Formula> {
    let mut b = FormulaBuilder::new();
    let x = b.int_var("x")?;
    let y = b.int_var("y")?;
    let five = b.int(5);
    let seven = b.int(7);
    let ex = b.eq(x, five)?;
    let ey = b.eq(y, seven)?;
    b.assert(ex)?;
    b.assert(ey)?;
    Ok(b.build())
}

#[test]
fn test_linear_sum_is_solved() -> FormulaResult<()> {
    let f = linear_sum()?;
    let outcome = run(&f, config(1000));
    let model = expect_sat(&f, &outcome);
    assert_eq!(int_of(&model, &f, "x") + int_of(&model, &f, "y"), 10);
    Ok(())
}

#[test]
fn test_contradiction_exhausts_repairs() -> FormulaResult<()> {
    let f = contradiction()?;
    let outcome = run(
        &f,
        SearchConfig {
            track_unsat: true,
            ..config(1000)
        },
    );
    assert_eq!(outcome.verdict, Verdict::Unknown(Limit::Repairs));
    assert_eq!(outcome.stats.repairs, 1000);
    assert!(outcome.stats.final_score > 0);
    assert!(!outcome.stats.unsat_assertions.is_empty());
    Ok(())
}

#[test]
fn test_repair_budget_decides_outcome() -> FormulaResult<()> {
    let f = two_targets()?;
    let short = run(&f, config(1));
    assert_eq!(short.verdict, Verdict::Unknown(Limit::Repairs));
    assert!(short.stats.repairs <= 1);

    let long = run(&f, config(1_000_000));
    let model = expect_sat(&f, &long);
    assert_eq!(int_of(&model, &f, "x"), 5);
    assert_eq!(int_of(&model, &f, "y"), 7);
    assert!(long.stats.repairs >= 2);
    Ok(())
}

#[test]
fn test_same_seed_same_moves() {
    let ksat = KSat::uniform(40, 180, 3, 5);
    let f = ksat.to_formula().unwrap();
    let journal = |seed: u32| {
        let trace = TraceContext::recording();
        let c = SearchConfig {
            random_seed: seed,
            restart_base: 10,
            ..config(2000)
        };
        let outcome = Engine::new(&f, c, &trace).run();
        (outcome, trace.moves())
    };
    let (first, moves_a) = journal(17);
    let (second, moves_b) = journal(17);
    assert_eq!(first, second);
    assert_eq!(moves_a, moves_b);
    assert!(!moves_a.is_empty());
}

#[test]
fn test_state_stays_consistent() {
    let ksat = KSat::uniform(30, 140, 3, 2);
    let f = ksat.to_formula().unwrap();
    for walksat in [true, false] {
        let c = SearchConfig {
            walksat,
            restart_base: 5,
            walksat_ucb_forget: 0.5,
            paws_sp: 300,
            ..config(600)
        };
        let trace = TraceContext::disabled();
        let mut engine = Engine::new(&f, c, &trace);
        let floor = engine.config().paws_init;
        for _ in 0..800 {
            assert!(engine.check_consistency());
            assert!(engine.weights().iter().all(|&w| w >= floor));
            if engine.step().is_some() {
                break;
            }
        }
        assert!(engine.check_consistency());
    }
}

#[test]
fn test_repairs_never_exceed_the_limit() -> FormulaResult<()> {
    let f = contradiction()?;
    for max_repairs in [0, 1, 7, 250] {
        let outcome = run(&f, config(max_repairs));
        assert!(!outcome.verdict.is_sat());
        assert!(outcome.stats.repairs <= u64::from(max_repairs));
    }
    Ok(())
}

#[test]
fn test_restart_limit() -> FormulaResult<()> {
    let f = contradiction()?;
    let c = SearchConfig {
        restart_base: 1,
        max_restarts: 4,
        ..config(u32::MAX)
    };
    let outcome = run(&f, c);
    assert_eq!(outcome.verdict, Verdict::Unknown(Limit::Restarts));
    assert_eq!(outcome.stats.restarts, 4);
    Ok(())
}

#[test]
fn test_interrupt_stops_the_search() -> FormulaResult<()> {
    let f = contradiction()?;
    let interrupt = Interrupt::new();
    let trace = TraceContext::disabled();
    let mut engine = Engine::new(&f, config(u32::MAX), &trace).with_interrupt(interrupt.clone());
    assert!(engine.step().is_none());
    interrupt.trigger();
    assert_eq!(engine.step(), Some(Verdict::Unknown(Limit::Cancelled)));
    Ok(())
}

#[test]
fn test_zero_timeout() -> FormulaResult<()> {
    let f = contradiction()?;
    let trace = TraceContext::disabled();
    let outcome = Engine::new(&f, config(u32::MAX), &trace)
        .with_timeout(Duration::ZERO)
        .run();
    assert_eq!(outcome.verdict, Verdict::Unknown(Limit::Deadline));
    Ok(())
}

#[test]
fn test_solver_trait() -> FormulaResult<()> {
    let f = linear_sum()?;
    let trace = TraceContext::disabled();
    let mut engine = Engine::new(&f, config(1000), &trace);
    let outcome = Solver::solve(&mut engine);
    assert!(outcome.verdict.is_sat());
    assert_eq!(Solver::stats(&engine).repairs, outcome.stats.repairs);
    Ok(())
}

#[test]
fn test_search_scope_is_recorded() -> FormulaResult<()> {
    let f = linear_sum()?;
    let trace = TraceContext::recording();
    let outcome = Engine::new(&f, config(1000), &trace).run();
    let scopes = trace.scopes();
    let last = scopes.last().unwrap();
    assert_eq!(last.op, "search");
    assert_eq!(last.outcome, outcome.verdict.to_string());
    Ok(())
}

#[test]
fn test_boolean_clauses() {
    let ksat = KSat::planted(60, 240, 3, 42);
    let f = ksat.to_formula().unwrap();
    let model = expect_sat(&f, &run(&f, config(200_000)));
    assert!(ksat.verify(&ksat.decode(&model).unwrap()));
}

#[test]
fn test_real_arithmetic() -> FormulaResult<()> {
    let mut b = FormulaBuilder::new();
    let x = b.real_var("x")?;
    let two = b.real(2, 1);
    let three = b.real(3, 1);
    let doubled = b.mul(&[two, x])?;
    let eq = b.eq(doubled, three)?;
    b.assert(eq)?;
    let f = b.build();
    let model = expect_sat(&f, &run(&f, config(1000)));
    let x = model.value_of(&f, "x").and_then(Value::as_num).cloned().unwrap();
    assert_eq!(x, BigRational::new(3.into(), 2.into()));
    Ok(())
}

#[test]
fn test_integer_bounds() -> FormulaResult<()> {
    let mut b = FormulaBuilder::new();
    let x = b.int_var("x")?;
    let y = b.int_var("y")?;
    let lo = b.int(3);
    let hi = b.int(6);
    let gx = b.gt(x, lo)?;
    let lx = b.lt(x, hi)?;
    let sum = b.add(&[x, y])?;
    let ge = b.ge(sum, hi)?;
    let le = b.le(y, lo)?;
    for t in [gx, lx, ge, le] {
        b.assert(t)?;
    }
    let f = b.build();
    let model = expect_sat(&f, &run(&f, config(10_000)));
    let x = int_of(&model, &f, "x");
    assert!((4..=5).contains(&x));
    Ok(())
}

#[test]
fn test_bitvector_equation() -> FormulaResult<()> {
    let mut b = FormulaBuilder::new();
    let x = b.bv_var("x", 8)?;
    let three = b.bv(8, 3)?;
    let one = b.bv(8, 1)?;
    let target = b.bv(8, 22)?;
    let scaled = b.bv_mul(three, x)?;
    let lhs = b.bv_add(scaled, one)?;
    let eq = b.eq(lhs, target)?;
    b.assert(eq)?;
    let f = b.build();
    let model = expect_sat(&f, &run(&f, config(10_000)));
    assert_eq!(model.value_of(&f, "x").and_then(Value::as_bv), Some(BvValue::new(8, 7)));
    Ok(())
}

#[test]
fn test_bitvector_ordering() -> FormulaResult<()> {
    let mut b = FormulaBuilder::new();
    let x = b.bv_var("x", 16)?;
    let y = b.bv_var("y", 16)?;
    let k = b.bv(16, 1000)?;
    let lt = b.bv_ult(k, x)?;
    let le = b.bv_ule(x, y)?;
    let ne = b.eq(x, y)?;
    let ne = b.not(ne)?;
    for t in [lt, le, ne] {
        b.assert(t)?;
    }
    let f = b.build();
    let model = expect_sat(&f, &run(&f, config(50_000)));
    let x = model.value_of(&f, "x").and_then(Value::as_bv).unwrap();
    let y = model.value_of(&f, "y").and_then(Value::as_bv).unwrap();
    assert!(x.bits > 1000 && x.bits < y.bits);
    Ok(())
}

fn list_formula(b: &mut FormulaBuilder) -> FormulaResult<()> {
    let id = b.next_datatype_id();
    b.declare_datatype(DatatypeDecl::new(
        "List",
        vec![
            ConstructorDecl::new("nil", vec![]),
            ConstructorDecl::new(
                "cons",
                vec![
                    ("head".to_string(), Sort::Int),
                    ("tail".to_string(), Sort::Datatype(id)),
                ],
            ),
        ],
    ))?;
    let l = b.dt_var("l", id)?;
    let is_cons = b.test(id, "cons", l)?;
    let head = b.select(id, "cons", "head", l)?;
    let seven = b.int(7);
    let eq = b.eq(head, seven)?;
    b.assert(is_cons)?;
    b.assert(eq)?;
    Ok(())
}

#[test]
fn test_datatype_axiomatic_and_representatives() -> FormulaResult<()> {
    let mut b = FormulaBuilder::new();
    list_formula(&mut b)?;
    let f = b.build();
    for dt_axiomatic in [true, false] {
        let c = SearchConfig {
            dt_axiomatic,
            ..config(10_000)
        };
        let model = expect_sat(&f, &run(&f, c));
        let l = model.value_of(&f, "l").and_then(Value::as_dt).unwrap();
        assert_eq!(l.ctor, 1);
        assert_eq!(l.args[0], Value::int(7));
    }
    Ok(())
}

#[test]
fn test_string_constraints_every_strategy() -> FormulaResult<()> {
    let mut b = FormulaBuilder::new();
    let s = b.str_var("s")?;
    let prefix = b.string("ab");
    let needle = b.string("z");
    let has_prefix = b.str_prefix_of(prefix, s)?;
    let len = b.str_len(s)?;
    let four = b.int(4);
    let len_is_four = b.eq(len, four)?;
    let has_needle = b.str_contains(s, needle)?;
    for t in [has_prefix, len_is_four, has_needle] {
        b.assert(t)?;
    }
    let f = b.build();
    for strategy in 0..=2 {
        let c = SearchConfig {
            str_update_strategy: strategy,
            ..config(50_000)
        };
        let model = expect_sat(&f, &run(&f, c));
        let s = model.value_of(&f, "s").and_then(Value::as_str).unwrap();
        assert!(s.starts_with("ab") && s.contains('z'));
        assert_eq!(s.chars().count(), 4);
    }
    Ok(())
}

#[test]
fn test_queens() {
    let queens = Queens::new(8);
    let f = queens.to_formula().unwrap();
    let model = expect_sat(&f, &run(&f, config(500_000)));
    assert!(queens.decode(&model).unwrap().is_valid());
}

#[test]
fn test_selector_variants_agree_on_sat() -> FormulaResult<()> {
    let f = two_targets()?;
    let variants = [(true, false, false), (true, true, true), (false, false, true)];
    for (walksat_ucb, walksat_ucb_init, vns_repick) in variants {
        let c = SearchConfig {
            walksat_ucb,
            walksat_ucb_init,
            vns_repick,
            vns_mc: 2,
            ..config(10_000)
        };
        expect_sat(&f, &run(&f, c));
    }
    Ok(())
}

#[test]
fn test_resolved_config_reaches_engine() -> FormulaResult<()> {
    let mut overrides = SearchOverrides::from_json(r#"{"wp": 0, "max_repairs": 5}"#).unwrap();
    overrides.set("sls.restart_base", "2").unwrap();
    overrides.set_pair("track_unsat=true").unwrap();
    let c = SearchConfig::resolve(&overrides).unwrap();

    let f = contradiction()?;
    let trace = TraceContext::disabled();
    let mut engine = Engine::new(&f, c, &trace);
    assert_eq!(engine.config().restart_base, 2);
    let outcome = engine.run();
    assert_eq!(outcome.verdict, Verdict::Unknown(Limit::Repairs));
    assert_eq!(outcome.stats.repairs, 5);
    assert_eq!(outcome.stats.random_walks, 0);
    assert!(!outcome.stats.unsat_assertions.is_empty());
    Ok(())
}

#[test]
fn test_invalid_overrides_are_rejected() {
    let mut overrides = SearchOverrides::default();
    overrides.set("restart_base", "0").unwrap();
    assert!(SearchConfig::resolve(&overrides).is_err());
    assert!(SearchOverrides::from_json(r#"{"no_such_param": 1}"#).is_err());
    assert!(SearchOverrides::default().set("wp", "lots").is_err());
}

#[test]
fn test_final_score_matches_verdict() -> FormulaResult<()> {
    let f = linear_sum()?;
    let outcome = run(&f, config(1000));
    assert_eq!(outcome.stats.final_score, 0);
    assert_eq!(outcome.stats.final_unsat, 0);

    let f = contradiction()?;
    let outcome = run(&f, config(100));
    assert!(outcome.stats.final_score > 0);
    assert!(outcome.stats.final_unsat >= 1);
    Ok(())
}

/// `x = 1`, `x = 2`, `y = 1`, `y = 2`: two independent contradictions.
fn split_contradictions() -> FormulaResult<Formula> {
    let mut b = FormulaBuilder::new();
    let one = b.int(1);
    let two = b.int(2);
    for name in ["x", "y"] {
        let v = b.int_var(name)?;
        let e1 = b.eq(v, one)?;
        let e2 = b.eq(v, two)?;
        b.assert(e1)?;
        b.assert(e2)?;
    }
    Ok(b.build())
}

fn touched_counts(engine: &Engine<'_>, formula: &Formula) -> Vec<f64> {
    let Selector::Ucb(ucb) = engine.selector() else {
        panic!("expected the ucb selector");
    };
    (0..formula.len())
        .map(|i| ucb[AssertionId(u32::try_from(i).unwrap())])
        .collect()
}

#[test]
fn test_repicked_assertion_is_credited() -> FormulaResult<()> {
    let f = split_contradictions()?;
    for vns_repick in [false, true] {
        let c = SearchConfig {
            wp: 0,
            walksat_repick: true,
            vns_repick,
            restart_base: 1_000_000,
            ..config(2000)
        };
        let trace = TraceContext::disabled();
        let mut engine = Engine::new(&f, c, &trace);
        loop {
            let before = touched_counts(&engine, &f);
            let values = engine.assignment().values().to_vec();
            if engine.step().is_some() {
                break;
            }
            let after = touched_counts(&engine, &f);
            let credited: Vec<usize> = (0..f.len()).filter(|&i| after[i] > before[i]).collect();
            let now = engine.assignment().values();
            let Some(moved) = (0..values.len()).find(|&v| now[v] != values[v]) else {
                assert!(credited.is_empty());
                continue;
            };
            assert_eq!(credited.len(), 1);
            let repaired = f.assertion(AssertionId(u32::try_from(credited[0]).unwrap()));
            assert!(
                repaired.vars.iter().any(|v| v.index() == moved),
                "move on variable {moved} credited to assertion {}",
                credited[0]
            );
        }
        assert!(Solver::stats(&engine).repicks > 0);
    }
    Ok(())
}

#[test]
fn test_ucb_counts_grow_between_restarts() {
    let ksat = KSat::uniform(30, 140, 3, 4);
    let f = ksat.to_formula().unwrap();
    let c = SearchConfig {
        restart_base: 5,
        walksat_ucb_forget: 0.5,
        ..config(800)
    };
    let trace = TraceContext::disabled();
    let mut engine = Engine::new(&f, c, &trace);
    let mut restarts = 0;
    let mut saw_forget = false;
    loop {
        let before = touched_counts(&engine, &f);
        if engine.step().is_some() {
            break;
        }
        let after = touched_counts(&engine, &f);
        let now = Solver::stats(&engine).restarts;
        if now == restarts {
            assert!(before.iter().zip(&after).all(|(b, a)| a >= b));
        } else {
            saw_forget |= before.iter().zip(&after).any(|(b, a)| a < b);
            restarts = now;
        }
    }
    assert!(restarts > 0);
    assert!(saw_forget);
}

#[test]
fn test_memory_ceiling_trips_under_system_allocator() -> FormulaResult<()> {
    let f = contradiction()?;
    let held = vec![7u8; 8 * 1024 * 1024];
    let c = SearchConfig {
        max_memory: 1,
        ..config(200)
    };
    let outcome = run(&f, c);
    assert_eq!(outcome.verdict, Verdict::Unknown(Limit::Memory));
    assert_eq!(outcome.stats.repairs, 0);
    assert_eq!(held[held.len() - 1], 7);
    Ok(())
}

#[test]
fn test_restart_init_controls_reset() -> FormulaResult<()> {
    let mut b = FormulaBuilder::new();
    let one = b.bv(16, 1)?;
    let two = b.bv(16, 2)?;
    for i in 0..8 {
        let v = b.bv_var(&format!("x{i}"), 16)?;
        let e1 = b.eq(v, one)?;
        let e2 = b.eq(v, two)?;
        b.assert(e1)?;
        b.assert(e2)?;
    }
    let f = b.build();
    let baseline: Vec<Value> = f
        .variables()
        .iter()
        .map(|v| f.default_value(&v.sort))
        .collect();

    for restart_init in [false, true] {
        let c = SearchConfig {
            restart_init,
            restart_base: 1,
            ..config(100)
        };
        let trace = TraceContext::disabled();
        let mut engine = Engine::new(&f, c, &trace);
        while Solver::stats(&engine).restarts == 0 {
            assert!(engine.step().is_none());
        }
        let reset_to_baseline = engine.assignment().values() == baseline.as_slice();
        assert_eq!(reset_to_baseline, !restart_init);
    }
    Ok(())
}

#[test]
fn test_rescore_toggle() -> FormulaResult<()> {
    let f = contradiction()?;
    for rescore in [false, true] {
        let c = SearchConfig {
            rescore,
            restart_base: 2,
            ..config(200)
        };
        let outcome = run(&f, c);
        assert!(outcome.stats.restarts > 0);
        let expected = if rescore { u64::from(outcome.stats.restarts) } else { 0 };
        assert_eq!(outcome.stats.rescores, expected);
    }
    Ok(())
}

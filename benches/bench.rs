use asp_solver::asp::grounding::{NoGoodSource, StaticProgram};
use asp_solver::asp::handler::NeverStop;
use asp_solver::asp::heuristic::{BerkMin, BranchingHeuristic, FixedOrder, RandomOrder, Vsids};
use asp_solver::asp::literal::{Atom, Literal};
use asp_solver::asp::nogood::NoGood;
use asp_solver::asp::restarter::{Fixed, Geometric, Linear, Luby, Never, Restarter};
use asp_solver::asp::solver::Solver;
use asp_solver::asp::stability::TrustMbt;
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

/// Random plain nogoods of width three, in the hard ratio for their clause counterparts.
fn random_program(rng: &mut fastrand::Rng, atoms: Atom) -> StaticProgram {
    let count = (f64::from(atoms) * 4.26) as usize;
    let no_goods = (0..count)
        .map(|_| NoGood::new((0..3).map(|_| Literal::new(rng.u32(1..=atoms), rng.bool()))))
        .collect();
    StaticProgram::with_max_atom_id(no_goods, atoms)
}

/// `x_i :- not y_i.  y_i :- not x_i.` for every pair, plus random constraints over the
/// `x_i`, with rule bodies represented by their own atoms.
fn choice_program(rng: &mut fastrand::Rng, pairs: Atom, constraints: usize) -> StaticProgram {
    let mut no_goods = Vec::new();
    for i in 0..pairs {
        let (x, y, body_x, body_y) = (4 * i + 1, 4 * i + 2, 4 * i + 3, 4 * i + 4);
        for (head, other, body) in [(x, y, body_x), (y, x, body_y)] {
            no_goods.push(NoGood::from_body(&[], &[Literal::positive(other)], Literal::positive(body)));
            no_goods.push(NoGood::new([Literal::positive(body), Literal::positive(other)]));
            no_goods.push(NoGood::head_first([Literal::negative(head), Literal::positive(body)]));
            no_goods.push(NoGood::support(Literal::negative(body), Literal::positive(head)));
        }
    }
    for _ in 0..constraints {
        let a = 4 * rng.u32(0..pairs) + 1;
        let b = 4 * rng.u32(0..pairs) + 1;
        no_goods.push(NoGood::new([Literal::positive(a), Literal::positive(b)]));
    }
    StaticProgram::with_max_atom_id(no_goods, 4 * pairs)
}

fn programs() -> Vec<StaticProgram> {
    let mut rng = fastrand::Rng::with_seed(7);
    let mut programs: Vec<StaticProgram> = (0..20).map(|_| random_program(&mut rng, 40)).collect();
    programs.extend((0..20).map(|_| choice_program(&mut rng, 30, 45)));
    programs
}

fn enumerate<H: BranchingHeuristic, R: Restarter>(program: &StaticProgram, heuristic: H, restarter: R) {
    let mut solver = Solver::from_parts(program.clone(), heuristic, restarter, TrustMbt, NeverStop);
    black_box(solver.answer_sets().take(10).count());
}

fn bench_heuristics(c: &mut Criterion) {
    let programs = programs();

    let mut group = c.benchmark_group("answer sets - heuristic");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("BerkMin", |b| {
        b.iter(|| {
            for program in &programs {
                enumerate(program, BerkMin::new(program.max_atom_id()), Luby::<100>::new());
            }
        });
    });

    group.bench_function("VSIDS", |b| {
        b.iter(|| {
            for program in &programs {
                enumerate(program, Vsids::new(program.max_atom_id()), Luby::<100>::new());
            }
        });
    });

    group.bench_function("Fixed Order", |b| {
        b.iter(|| {
            for program in &programs {
                enumerate(program, FixedOrder, Luby::<100>::new());
            }
        });
    });

    group.bench_function("Random Order", |b| {
        b.iter(|| {
            for program in &programs {
                enumerate(program, RandomOrder::with_seed(3), Luby::<100>::new());
            }
        });
    });

    group.finish();
}

fn bench_restarters(c: &mut Criterion) {
    let programs = programs();

    let mut group = c.benchmark_group("answer sets - restarter");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("Luby", |b| {
        b.iter(|| {
            for program in &programs {
                enumerate(program, BerkMin::new(program.max_atom_id()), Luby::<100>::new());
            }
        });
    });

    group.bench_function("Geometric", |b| {
        b.iter(|| {
            for program in &programs {
                enumerate(program, BerkMin::new(program.max_atom_id()), Geometric::<2>::new());
            }
        });
    });

    group.bench_function("Fixed", |b| {
        b.iter(|| {
            for program in &programs {
                enumerate(program, BerkMin::new(program.max_atom_id()), Fixed::<100>::new());
            }
        });
    });

    group.bench_function("Linear", |b| {
        b.iter(|| {
            for program in &programs {
                enumerate(program, BerkMin::new(program.max_atom_id()), Linear::<100>::new());
            }
        });
    });

    group.bench_function("Never", |b| {
        b.iter(|| {
            for program in &programs {
                enumerate(program, BerkMin::new(program.max_atom_id()), Never);
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_heuristics, bench_restarters);

criterion_main!(benches);

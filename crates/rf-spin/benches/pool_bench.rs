//! Effect pool and full-spin benchmarks

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rf_spin::{
    DefaultHooks, GridSpec, Mutation, MutationStyle, Outcome, Runtime, SessionContext, SessionId,
    SpinConfig, SpinLifecycleController, TimingConfig,
};

fn bench_pool_cycle(c: &mut Criterion) {
    let mut session = SessionContext::with_kinds(SessionId::BASE, ["burst"]);

    c.bench_function("pool_acquire_release_16", |b| {
        b.iter(|| {
            let leases: Vec<_> = (0..16).filter_map(|_| session.acquire("burst")).collect();
            for lease in leases {
                let _ = session.release(black_box(lease));
            }
        })
    });
}

fn bench_instant_spin(c: &mut Criterion) {
    let config = SpinConfig::new("bench", GridSpec::standard_5x3())
        .with_timing(TimingConfig::instant())
        .with_style(
            "standard",
            MutationStyle {
                effect: Some("burst".into()),
                ..MutationStyle::default()
            },
        );
    let outcome = Outcome::default().with_win(1, 5.0).with_mutation(Mutation::standard(&[
        &["WD", "", ""],
        &["", "WD", ""],
        &["", "", "WD"],
        &["", "WD", ""],
        &["WD", "", ""],
    ]));
    let session = SessionContext::with_kinds(SessionId::BASE, ["burst"]);
    let mut controller = match SpinLifecycleController::new(config, Box::new(DefaultHooks), session)
    {
        Ok(controller) => controller,
        Err(e) => panic!("bench config rejected: {e}"),
    };
    let mut runtime = Runtime::silent();

    c.bench_function("spin_5x3_five_mutations", |b| {
        b.iter(|| {
            let _ = controller.request_spin(outcome.clone());
            black_box(controller.run_to_settle(&mut runtime, 16.0).ok())
        })
    });
}

criterion_group!(benches, bench_pool_cycle, bench_instant_spin);
criterion_main!(benches);

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, Criterion};
use rulefire::{field, Context, RuleEngine, RuleEngineBuilder};

fn build_shared_engine() -> (Arc<RuleEngine>, Context) {
    let n = 20;
    let mut builder = RuleEngineBuilder::new()
        .rule("banned", |r| {
            r.priority(100)
                .exclusive()
                .when(field("user.banned").eq(true))
                .then_set("finalPrice", "0")
        })
        .rule("vip", |r| {
            r.priority(50)
                .when_expression("user.tier == 'VIP' && orderTotal > 100")
                .then_set("finalPrice", "orderTotal * 0.8")
        });

    for i in 0..n {
        let field_name = format!("f{i}");
        builder = builder.rule(&format!("r{i}"), move |r| {
            r.when(field(&field_name).gte(1_i64))
                .then_set(&format!("seen{i}"), "true")
        });
    }

    let mut ctx = Context::new()
        .set("user.tier", "VIP")
        .set("user.banned", false)
        .set("orderTotal", 150.0);
    for i in 0..n {
        ctx = ctx.set(&format!("f{i}"), 10_i64);
    }

    (Arc::new(builder.build().unwrap()), ctx)
}

fn bench_throughput(c: &mut Criterion) {
    let thread_counts = [1, 2, 4, 8];

    let mut group = c.benchmark_group("throughput");
    group.measurement_time(Duration::from_secs(5));

    for &threads in &thread_counts {
        let (engine, ctx) = build_shared_engine();

        group.bench_function(&format!("{threads}_threads"), |b| {
            b.iter_custom(|iters| {
                let per_thread = iters / threads as u64;
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let engine = Arc::clone(&engine);
                        let input = ctx.clone();
                        thread::spawn(move || {
                            let start = Instant::now();
                            for _ in 0..per_thread {
                                let mut ctx = input.clone();
                                let _ = engine.fire(&mut ctx);
                            }
                            start.elapsed()
                        })
                    })
                    .collect();

                let mut max_elapsed = Duration::ZERO;
                for h in handles {
                    let elapsed = h.join().unwrap();
                    if elapsed > max_elapsed {
                        max_elapsed = elapsed;
                    }
                }
                max_elapsed
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_throughput);
criterion_main!(benches);

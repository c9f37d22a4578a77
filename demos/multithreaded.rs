use std::sync::Arc;
use std::thread;

use rulefire::{field, Context, RuleEngineBuilder};

fn main() {
    let engine = Arc::new(
        RuleEngineBuilder::new()
            .rule("adult", |r| {
                r.priority(10)
                    .when(field("user.age").gte(18_i64))
                    .then_set("access", "'full'")
            })
            .rule("minor", |r| {
                r.priority(10)
                    .when(field("user.age").lt(18_i64))
                    .then_set("access", "'restricted'")
            })
            .build()
            .expect("failed to build rule engine"),
    );

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                // Each thread owns its context; the engine is shared read-only.
                let mut ctx = Context::new().set("user.age", 16_i64 + i64::from(i));
                engine.fire(&mut ctx).expect("an action failed");
                println!("Thread {i}: access = {:?}", ctx.get("access"));
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}

use rulefire::{field, Context, LogAction, RuleEngineBuilder};
use tracing_subscriber::EnvFilter;

fn main() {
    // RUST_LOG=rulefire=debug shows each rule decision.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let engine = RuleEngineBuilder::new()
        .rule("banned", |r| {
            r.name("banned users pay nothing")
                .priority(100)
                .exclusive()
                .when(field("user.banned").eq(true))
                .then_set("finalPrice", "0")
        })
        .rule("vip-discount", |r| {
            r.name("VIP discount")
                .description("20% off orders above 100 for VIP members")
                .priority(10)
                .exclusive()
                .when_expression("user.tier == 'VIP' && orderTotal > 100")
                .then_set("finalPrice", "orderTotal * 0.8")
                .then(LogAction::new("vip discount applied").with_key("finalPrice"))
        })
        .rule("big-spender", |r| {
            r.priority(5)
                .when_expression("orderTotal > 200")
                .then_set("finalPrice", "orderTotal * 0.9")
                .then_set("bigSpender", "true")
        })
        .rule("list-price", |r| {
            r.priority(0)
                .when(field("finalPrice").eq(rulefire::Value::Null))
                .then_set("finalPrice", "orderTotal")
        })
        .build()
        .expect("failed to build rule engine");

    println!("{engine}");
    for rule in engine.rules() {
        println!("  {rule}");
    }
    println!();

    for (tier, total) in [("VIP", 150.0), ("VIP", 80.0), ("REGULAR", 250.0)] {
        let mut ctx = Context::new()
            .set("user.tier", tier)
            .set("user.banned", false)
            .set("orderTotal", total);

        let report = engine
            .fire_detailed(&mut ctx)
            .expect("an action failed");

        println!("{tier} ordering {total}:");
        println!("{report}");
        println!(
            "  finalPrice = {}",
            ctx.get("finalPrice").map_or_else(|| "unset".to_owned(), ToString::to_string)
        );
        println!();
    }
}

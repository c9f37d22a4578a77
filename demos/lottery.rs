use chrono::{Duration, Utc};
use rulefire::lottery::LotteryAction;
use rulefire::{Context, RuleEngineBuilder, Value};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let engine = RuleEngineBuilder::new()
        .rule("hourly-lottery", |r| {
            r.when_expression("buyers.size() >= 2").then(
                LotteryAction::new("buyers", "winners", 2)
                    .named("hourly-lottery")
                    .trailing(Duration::hours(1)),
            )
        })
        .build()
        .expect("failed to build rule engine");

    // Eight purchases, one every 15 minutes, the oldest almost two hours ago.
    let now = Utc::now();
    let buyers: Vec<Value> = (0..8_i64)
        .map(|i| {
            Value::map([
                ("customerId", Value::from(format!("customer-{i}"))),
                (
                    "purchaseTime",
                    Value::from((now - Duration::minutes(i * 15)).to_rfc3339()),
                ),
            ])
        })
        .collect();

    let mut ctx = Context::new().set("buyers", buyers);
    engine.fire(&mut ctx).expect("lottery failed");

    match ctx.get("winners").and_then(Value::as_list) {
        Some(winners) => {
            println!("{} winners:", winners.len());
            for winner in winners {
                println!("  {winner}");
            }
        }
        None => println!("no lottery was drawn"),
    }
}

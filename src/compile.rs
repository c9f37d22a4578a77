//! Build-time validation: turns builders into immutable rules and keeps the
//! engine's registry ordered.

use std::sync::Arc;

use crate::types::{PendingAction, PendingCondition};
use crate::{Action, Condition, ConfigError, Expression, Rule, RuleBuilder, SetAction};

pub(crate) fn compile_rule(builder: RuleBuilder) -> Result<Rule, ConfigError> {
    let id = builder
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or(ConfigError::MissingId)?;

    if let (Some(from), Some(until)) = (builder.effective_from, builder.effective_until) {
        if from > until {
            return Err(ConfigError::InvalidWindow { rule: id });
        }
    }

    let condition = match builder.condition {
        None => Condition::all([]),
        Some(PendingCondition::Ready(condition)) => condition,
        Some(PendingCondition::Source(source)) => Condition::from(parse_in(&id, &source)?),
    };

    let actions = builder
        .actions
        .into_iter()
        .map(|pending| match pending {
            PendingAction::Ready(action) => Ok(action),
            PendingAction::Set { key, expression } => {
                let expr = parse_in(&id, &expression)?;
                Ok(Arc::new(SetAction::from_expression(&key, expr)) as Arc<dyn Action>)
            }
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    Ok(Rule {
        name: builder.name.unwrap_or_else(|| id.clone()),
        id,
        description: builder.description,
        priority: builder.priority,
        exclusive: builder.exclusive,
        effective_from: builder.effective_from,
        effective_until: builder.effective_until,
        condition,
        actions,
    })
}

fn parse_in(rule: &str, source: &str) -> Result<Expression, ConfigError> {
    Expression::parse(source).map_err(|source_err| ConfigError::InvalidExpression {
        rule: rule.to_owned(),
        expression: source.to_owned(),
        source: source_err,
    })
}

/// Add `rule` to `rules`, keeping descending priority with ties in
/// registration order.
pub(crate) fn insert_sorted(rules: &mut Vec<Rule>, rule: Rule) -> Result<(), ConfigError> {
    if rules.iter().any(|r| r.id == rule.id) {
        return Err(ConfigError::DuplicateRule { id: rule.id });
    }
    // Stable: equal priorities keep the order they were pushed in.
    let at = rules.partition_point(|r| r.priority >= rule.priority);
    rules.insert(at, rule);
    Ok(())
}

use crate::constants::{MASKED_NAME_SUFFIX, PLACEHOLDER};
use crate::models::Reward;

/// Keeps the first `visible` characters of a name and hides the rest.
/// A zero length disables masking.
pub fn mask_name(name: &str, visible: usize) -> String {
    if visible == 0 {
        return name.to_string();
    }
    let prefix: String = name.chars().take(visible).collect();
    format!("{prefix}{MASKED_NAME_SUFFIX}")
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let floored = (value * 100.0).floor() / 100.0;
        format!("{floored}")
    }
}

pub fn format_points(score: Option<f64>) -> String {
    match score {
        Some(score) => format_number(score),
        None => PLACEHOLDER.to_string(),
    }
}

/// Integer values print as-is, fractional ones are floored to two decimals,
/// and a unit symbol, when the reward type has one, is prefixed.
pub fn format_reward_value(reward: &Reward) -> String {
    let value = format_number(reward.reward_value);
    match reward.uom_symbol() {
        Some(symbol) if !symbol.is_empty() => format!("{symbol}{value}"),
        _ => value,
    }
}

pub fn reward_label(reward: &Reward) -> String {
    let value = format_reward_value(reward);
    if reward.name.is_empty() {
        value
    } else {
        format!("{} {}", value, reward.name)
    }
}

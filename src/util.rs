use crate::hvo::{MonoPolicy, TieBreak};
use log::info;

pub fn parse_policy(s: &str) -> MonoPolicy {
    match s.to_lowercase().as_str() {
        "p" | "priority" => MonoPolicy::Priority,
        "l" | "lu" | "loudest" => MonoPolicy::Loudest,
        "e" | "earliest" | "first" => MonoPolicy::Earliest,
        other => {
            info!("Unknown policy '{}', defaulting to `loudest`..!", other);
            MonoPolicy::Loudest
        }
    }
}

pub fn parse_tie_break(s: &str) -> TieBreak {
    match s.to_lowercase().as_str() {
        "l" | "lu" | "loudest" => TieBreak::Loudest,
        "last" | "latest" => TieBreak::Last,
        other => {
            info!("Unknown tie-break '{}', defaulting to `loudest`..!", other);
            TieBreak::Loudest
        }
    }
}

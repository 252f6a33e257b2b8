//! Parser for raffle trigger commands in comment text.
//!
//! This module provides a pure parser that extracts a structured raffle
//! request from unstructured comment text.
//!
//! # Parsing Rules
//!
//! - Matching is anchored to the whole trimmed input: the comment must consist
//!   of `!<keyword>` optionally followed by a winner-count clause and a reward
//!   clause, and nothing else. Mentioning the keyword mid-sentence does not
//!   trigger the bot.
//! - The trigger token is case-insensitive; clause markers (`w`, `r`) are too.
//! - The winner-count clause is `w <int>` (whitespace between marker and
//!   digits is optional). Absent, the winner count defaults to 1. The value is
//!   clamped to `[1, max_winners]`.
//! - The reward clause is `r <int>[;<int>]*`, a semicolon-separated tier list.
//!   Absent, it defaults to a single zero tier (no reward). Each nonzero tier
//!   is clamped to `[min_reward, max_reward]`; zero tiers pass through. The
//!   list is truncated to `max_reward_tiers` entries and sorted descending so
//!   rank 1 pays the most.
//! - Any malformed or trailing token yields `Invalid`, never a panic and never
//!   partial state.

use super::types::{CommandBounds, ParseOutcome, RaffleCommand};

/// Parses a comment body against the trigger `!<keyword>`.
///
/// Returns `NoTrigger` when the trimmed text does not begin with the trigger
/// token, `Invalid` when it does but the remainder is not a well-formed
/// command, and `Command` otherwise.
pub fn parse_command(text: &str, keyword: &str, bounds: &CommandBounds) -> ParseOutcome {
    let trimmed = text.trim();
    let mut tokens = trimmed.split_ascii_whitespace();

    let trigger = format!("!{}", keyword);
    match tokens.next() {
        Some(first) if first.eq_ignore_ascii_case(&trigger) => {}
        _ => return ParseOutcome::NoTrigger,
    }

    let rest: Vec<&str> = tokens.collect();
    match parse_clauses(&rest) {
        Some((winner_count, reward_tiers)) => ParseOutcome::Command(clamp(
            winner_count,
            reward_tiers,
            bounds,
        )),
        None => ParseOutcome::Invalid,
    }
}

/// Parses the `[w <int>] [r <int>[;<int>]*]` tail. Returns the raw (unclamped)
/// values, or `None` when the tail is malformed.
fn parse_clauses(tokens: &[&str]) -> Option<(Option<u32>, Option<Vec<u64>>)> {
    let mut winner_count = None;
    let mut reward_tiers = None;
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i];
        if let Some(tail) = strip_marker(token, 'w') {
            if winner_count.is_some() || reward_tiers.is_some() {
                // Duplicate clause, or a winner clause after the reward clause.
                return None;
            }
            let digits = if tail.is_empty() {
                i += 1;
                *tokens.get(i)?
            } else {
                tail
            };
            winner_count = Some(digits.parse::<u32>().ok()?);
        } else if let Some(tail) = strip_marker(token, 'r') {
            if reward_tiers.is_some() {
                return None;
            }
            let digits = if tail.is_empty() {
                i += 1;
                *tokens.get(i)?
            } else {
                tail
            };
            reward_tiers = Some(parse_tier_list(digits)?);
        } else {
            return None;
        }
        i += 1;
    }

    Some((winner_count, reward_tiers))
}

/// Strips a single-letter clause marker (case-insensitive), returning the rest
/// of the token. `None` when the token does not start with the marker or the
/// remainder is not all digits / empty.
fn strip_marker(token: &str, marker: char) -> Option<&str> {
    let first = token.chars().next()?;
    if !first.eq_ignore_ascii_case(&marker) {
        return None;
    }
    let tail = &token[1..];
    if tail.is_empty() || tail.bytes().all(|b| b.is_ascii_digit() || b == b';') {
        Some(tail)
    } else {
        None
    }
}

/// Parses `<int>[;<int>]*` into a tier list. Empty segments are malformed.
fn parse_tier_list(digits: &str) -> Option<Vec<u64>> {
    digits
        .split(';')
        .map(|seg| seg.parse::<u64>().ok())
        .collect()
}

/// Applies configured bounds: defaults, clamps, truncation, descending order.
fn clamp(
    winner_count: Option<u32>,
    reward_tiers: Option<Vec<u64>>,
    bounds: &CommandBounds,
) -> RaffleCommand {
    let winner_count = winner_count.unwrap_or(1).clamp(1, bounds.max_winners.max(1));

    let mut tiers = reward_tiers.unwrap_or_else(|| vec![0]);
    tiers.truncate(bounds.max_reward_tiers.max(1));
    for tier in &mut tiers {
        // Zero signals "no reward" and is exempt from the minimum.
        if *tier != 0 {
            *tier = (*tier).clamp(bounds.min_reward, bounds.max_reward);
        }
    }
    tiers.sort_unstable_by(|a, b| b.cmp(a));

    RaffleCommand {
        winner_count,
        reward_tiers: tiers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KEYWORD: &str = "raffle";

    fn bounds() -> CommandBounds {
        CommandBounds {
            max_winners: 5,
            min_reward: 10,
            max_reward: 1000,
            max_reward_tiers: 3,
        }
    }

    fn parse(text: &str) -> ParseOutcome {
        parse_command(text, KEYWORD, &bounds())
    }

    fn command(text: &str) -> RaffleCommand {
        match parse(text) {
            ParseOutcome::Command(cmd) => cmd,
            other => panic!("expected a command for {:?}, got {:?}", text, other),
        }
    }

    // ==================== Valid command parsing ====================

    #[test]
    fn bare_trigger_defaults() {
        let cmd = command("!raffle");
        assert_eq!(cmd.winner_count, 1);
        assert_eq!(cmd.reward_tiers, vec![0]);
    }

    #[test]
    fn winner_clause_parses() {
        assert_eq!(command("!raffle w 3").winner_count, 3);
        assert_eq!(command("!raffle w3").winner_count, 3);
    }

    #[test]
    fn reward_clause_parses() {
        assert_eq!(command("!raffle r 100").reward_tiers, vec![100]);
        assert_eq!(command("!raffle r100").reward_tiers, vec![100]);
        assert_eq!(command("!raffle r 100;50").reward_tiers, vec![100, 50]);
    }

    #[test]
    fn combined_clauses_parse() {
        let cmd = command("!raffle w 3 r 100;50");
        assert_eq!(cmd.winner_count, 3);
        assert_eq!(cmd.reward_tiers, vec![100, 50]);
    }

    #[test]
    fn trigger_is_case_insensitive() {
        assert_eq!(command("!RAFFLE").winner_count, 1);
        assert_eq!(command("!Raffle W 2").winner_count, 2);
        assert_eq!(command("!raffle R 100").reward_tiers, vec![100]);
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        let cmd = command("   !raffle   w  2   r  100;50   ");
        assert_eq!(cmd.winner_count, 2);
        assert_eq!(cmd.reward_tiers, vec![100, 50]);
    }

    // ==================== Anchoring ====================

    #[test]
    fn keyword_in_conversation_does_not_trigger() {
        assert_eq!(parse("the !raffle was fun"), ParseOutcome::NoTrigger);
        assert_eq!(parse("I love a good raffle"), ParseOutcome::NoTrigger);
        assert_eq!(parse(""), ParseOutcome::NoTrigger);
        assert_eq!(parse("!raffles"), ParseOutcome::NoTrigger);
        assert_eq!(parse("raffle"), ParseOutcome::NoTrigger);
    }

    #[test]
    fn trailing_chatter_is_invalid() {
        // The trigger is clearly addressed at the bot, but the command is not
        // well-formed, so the user gets told instead of silently ignored.
        assert_eq!(parse("!raffle please"), ParseOutcome::Invalid);
        assert_eq!(parse("!raffle w 3 thanks"), ParseOutcome::Invalid);
    }

    // ==================== Malformed input ====================

    #[test]
    fn malformed_numbers_are_invalid() {
        assert_eq!(parse("!raffle w"), ParseOutcome::Invalid);
        assert_eq!(parse("!raffle w abc"), ParseOutcome::Invalid);
        assert_eq!(parse("!raffle w -1"), ParseOutcome::Invalid);
        assert_eq!(parse("!raffle w 1.5"), ParseOutcome::Invalid);
        assert_eq!(parse("!raffle r"), ParseOutcome::Invalid);
        assert_eq!(parse("!raffle r 100;;50"), ParseOutcome::Invalid);
        assert_eq!(parse("!raffle r ;"), ParseOutcome::Invalid);
        assert_eq!(parse("!raffle r 100;"), ParseOutcome::Invalid);
    }

    #[test]
    fn duplicate_or_misordered_clauses_are_invalid() {
        assert_eq!(parse("!raffle w 1 w 2"), ParseOutcome::Invalid);
        assert_eq!(parse("!raffle r 10 r 20"), ParseOutcome::Invalid);
        assert_eq!(parse("!raffle r 10 w 2"), ParseOutcome::Invalid);
    }

    #[test]
    fn numeric_overflow_is_invalid() {
        assert_eq!(parse("!raffle w 99999999999999999999"), ParseOutcome::Invalid);
        assert_eq!(parse("!raffle r 99999999999999999999999"), ParseOutcome::Invalid);
    }

    // ==================== Clamping ====================

    #[test]
    fn winner_count_clamps_to_max() {
        assert_eq!(command("!raffle w 50").winner_count, 5);
        assert_eq!(command("!raffle w 0").winner_count, 1);
    }

    #[test]
    fn tiers_clamp_to_reward_bounds() {
        assert_eq!(command("!raffle r 5000").reward_tiers, vec![1000]);
        assert_eq!(command("!raffle r 1").reward_tiers, vec![10]);
    }

    #[test]
    fn zero_tier_is_exempt_from_minimum() {
        assert_eq!(command("!raffle r 0").reward_tiers, vec![0]);
        assert_eq!(command("!raffle r 100;0").reward_tiers, vec![100, 0]);
    }

    #[test]
    fn tier_list_truncates_then_sorts_descending() {
        assert_eq!(
            command("!raffle r 50;200;100;400").reward_tiers,
            vec![200, 100, 50]
        );
    }

    // ==================== Properties ====================

    proptest! {
        /// Arbitrary text never panics the parser.
        #[test]
        fn arbitrary_text_never_panics(text: String) {
            let _ = parse(&text);
        }

        /// Arbitrary bytes after the trigger never panic the parser.
        #[test]
        fn arbitrary_suffix_never_panics(suffix: String) {
            let _ = parse(&format!("!raffle {}", suffix));
        }

        /// Every parsed winner count respects the configured bounds.
        #[test]
        fn winner_count_always_in_bounds(n in 0u32..1_000_000) {
            let cmd = command(&format!("!raffle w {}", n));
            prop_assert!(cmd.winner_count >= 1);
            prop_assert!(cmd.winner_count <= bounds().max_winners);
        }

        /// Every parsed tier is zero or within the configured reward bounds,
        /// and the list is descending.
        #[test]
        fn tiers_always_in_bounds(
            tiers in proptest::collection::vec(0u64..1_000_000, 1..8)
        ) {
            let joined = tiers
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(";");
            let cmd = command(&format!("!raffle r {}", joined));
            let b = bounds();

            prop_assert!(!cmd.reward_tiers.is_empty());
            prop_assert!(cmd.reward_tiers.len() <= b.max_reward_tiers);
            for &tier in &cmd.reward_tiers {
                prop_assert!(tier == 0 || (tier >= b.min_reward && tier <= b.max_reward));
            }
            for pair in cmd.reward_tiers.windows(2) {
                prop_assert!(pair[0] >= pair[1]);
            }
        }

        /// Text not starting with the trigger token never parses as a command.
        #[test]
        fn non_trigger_prefix_never_triggers(prefix in "[a-zA-Z0-9 ]{1,20}") {
            let outcome = parse(&format!("{} !raffle w 3", prefix));
            prop_assert_eq!(outcome, ParseOutcome::NoTrigger);
        }
    }

    // ==================== Different keywords ====================

    #[test]
    fn different_keywords() {
        let b = bounds();
        assert!(matches!(
            parse_command("!canna-raffler w 2", "canna-raffler", &b),
            ParseOutcome::Command(_)
        ));
        assert_eq!(
            parse_command("!raffle w 2", "canna-raffler", &b),
            ParseOutcome::NoTrigger
        );
    }
}

//! Public reply formatting.
//!
//! Every user-visible reply carries the same fixed footer. Formatting is pure
//! string work; nothing here talks to the platform.

use crate::types::Username;

/// Fixed footer appended to every user-visible reply.
pub const FOOTER: &str = "\n\n---\n\n^(sub-raffler | automated raffle moderation)";

/// The completed-raffle announcement.
///
/// Lists winners by rank with their credited rewards (when any), the
/// participant count, and a link to the externally hosted participant list
/// when the upload succeeded.
pub fn raffle_result(
    sequence: u64,
    winners: &[(Username, u64)],
    total_reward: u64,
    participant_count: usize,
    participants_url: Option<&str>,
    currency: &str,
) -> String {
    let mut reply = format!("**Raffle #{sequence} completed!**\n\n");
    reply.push_str(&format!("**Total participants:** {participant_count}\n"));
    if let Some(url) = participants_url {
        reply.push_str(&format!("[Full list of eligible participants]({url})\n"));
    }
    reply.push('\n');

    if total_reward > 0 {
        reply.push_str(&format!("**Total reward pool:** {total_reward} {currency}\n\n"));
    }

    reply.push_str("**Winners:**\n");
    for (rank, (winner, reward)) in winners.iter().enumerate() {
        if *reward > 0 {
            reply.push_str(&format!("{}. u/{} - {} {}\n", rank + 1, winner, reward, currency));
        } else {
            reply.push_str(&format!("{}. u/{}\n", rank + 1, winner));
        }
    }

    reply.push_str("\nThank you all for participating!");
    if total_reward > 0 {
        reply.push_str(
            "\n\n**Note:** rewards are distributed manually. Winners, please reply \
             to this comment with your wallet address to receive them.",
        );
    }
    reply.push_str(FOOTER);
    reply
}

/// Reply for a thread whose raffle was already resolved.
pub fn already_resolved() -> String {
    format!(
        "**This thread's raffle has already been resolved.** \
         Each thread gets a single raffle.{FOOTER}"
    )
}

/// Reply for a raffle with too few qualifying participants.
pub fn insufficient_participants(required: usize, found: usize) -> String {
    format!(
        "**Error:** not enough qualifying participants to complete the raffle.\n\n\
         **Participants needed:** {required}, but only {found} found.{FOOTER}"
    )
}

/// Reply for a malformed command from an authorized identity.
pub fn invalid_command(keyword: &str) -> String {
    format!(
        "**Error:** that command was not understood.\n\n\
         Usage: `!{keyword} [w <winners>] [r <reward>[;<reward>]*]`{FOOTER}"
    )
}

/// Body of the per-winner disbursement notification.
pub fn disbursement_notice(
    winner: &Username,
    reward: u64,
    currency: &str,
    sequence: u64,
) -> String {
    format!("Raffle #{sequence}: send {reward} {currency} to u/{winner}.")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn winners() -> Vec<(Username, u64)> {
        vec![
            (Username::new("alice"), 100),
            (Username::new("bob"), 50),
            (Username::new("carol"), 50),
        ]
    }

    #[test]
    fn result_lists_winners_with_rewards() {
        let reply = raffle_result(7, &winners(), 200, 10, Some("https://example.com/p"), "COIN");

        assert!(reply.contains("Raffle #7"));
        assert!(reply.contains("**Total participants:** 10"));
        assert!(reply.contains("https://example.com/p"));
        assert!(reply.contains("**Total reward pool:** 200 COIN"));
        assert!(reply.contains("1. u/alice - 100 COIN"));
        assert!(reply.contains("2. u/bob - 50 COIN"));
        assert!(reply.contains("3. u/carol - 50 COIN"));
        assert!(reply.contains("wallet address"));
        assert!(reply.ends_with(FOOTER));
    }

    #[test]
    fn rewardless_result_omits_reward_lines() {
        let rewardless = vec![(Username::new("alice"), 0), (Username::new("bob"), 0)];
        let reply = raffle_result(1, &rewardless, 0, 4, None, "COIN");

        assert!(!reply.contains("reward pool"));
        assert!(!reply.contains("wallet address"));
        assert!(reply.contains("1. u/alice\n"));
        assert!(reply.contains("2. u/bob\n"));
        assert!(!reply.contains("eligible participants]("));
    }

    #[test]
    fn every_reply_carries_the_footer() {
        assert!(already_resolved().ends_with(FOOTER));
        assert!(insufficient_participants(5, 2).ends_with(FOOTER));
        assert!(invalid_command("raffle").ends_with(FOOTER));
    }

    #[test]
    fn insufficient_reply_states_both_counts() {
        let reply = insufficient_participants(5, 2);
        assert!(reply.contains("needed:** 5"));
        assert!(reply.contains("only 2 found"));
    }

    #[test]
    fn invalid_command_shows_usage_with_keyword() {
        assert!(invalid_command("canna-raffler").contains("`!canna-raffler"));
    }

    #[test]
    fn disbursement_notice_names_winner_and_amount() {
        let notice = disbursement_notice(&Username::new("alice"), 100, "COIN", 7);
        assert!(notice.contains("u/alice"));
        assert!(notice.contains("100 COIN"));
        assert!(notice.contains("#7"));
    }
}

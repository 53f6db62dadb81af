//! User-facing message texts (Telegram HTML parse mode)

use super::FanoutReport;
use crate::error::RoundError;
use crate::types::{BetStatus, ResultTally, Side, User, MAX_PAYMENT_ATTEMPTS};

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn welcome() -> String {
    "🎉 <b>Welcome to the Heads or Tails Betting Bot!</b> 🎉\n\n\
     Here are the commands you can use:\n\n\
     👉 /start - Start the bot and see this message.\n\
     👉 /bet - Place your bet (Heads or Tails).\n\
     👉 /status - Check your payment and bet status.\n\
     👉 /results - View the latest results.\n\
     👉 /nextbet - Check the next betting time.\n\
     👉 /slots - Check available betting slots.\n\
     👉 /help - Game rules.\n\n\
     Good luck! 🍀"
        .to_string()
}

pub fn help() -> String {
    format!(
        "📜 <b>Game Rules</b>\n\n\
         1. Bet on either Heads or Tails.\n\
         2. One bet per user until the round is reset.\n\
         3. After placing a bet, send a screenshot of your payment for approval.\n\
         4. You can send up to {} payment screenshots per bet.\n\
         5. Only approved bets take a slot.\n\
         6. Approved bets on the declared side win.\n\n\
         👉 /start - See the command list.",
        MAX_PAYMENT_ATTEMPTS
    )
}

pub fn admin_commands() -> String {
    "🔐 <b>Admin Commands</b>\n\n\
     👉 /approve &lt;user_id&gt; - Approve a user's payment.\n\
     👉 /disapprove &lt;user_id&gt; - Disapprove a user's payment.\n\
     👉 /pending - View pending payment confirmations.\n\
     👉 /declare &lt;heads|tails&gt; - Declare the result of the round.\n\
     👉 /participants - View approved participants.\n\
     👉 /winners - View the winners of the latest round.\n\
     👉 /reset - Clear bets and results for the next round.\n\
     👉 /schedule &lt;datetime&gt; - Schedule the next betting round.\n\
     👉 /setannouncement &lt;datetime&gt; - Set the result announcement time.\n\
     👉 /fixslots &lt;number&gt; - Set the total number of slots.\n\
     👉 /showall - Show all users with count.\n\
     👉 /open - Open betting.\n\
     👉 /close - Close betting.\n\
     👉 /broadcast &lt;message&gt; - Message every user."
        .to_string()
}

pub fn choose_side() -> String {
    "🎲 <b>Place Your Bet!</b>\n\nChoose Heads or Tails:".to_string()
}

/// Inline keyboard rows for the side choice, as `(label, callback_data)`.
pub fn side_buttons() -> Vec<(String, String)> {
    Side::ALL
        .iter()
        .map(|side| {
            let label = match side {
                Side::Heads => "Heads 🪙",
                Side::Tails => "Tails 🪙",
            };
            (label.to_string(), side.as_str().to_string())
        })
        .collect()
}

pub fn payment_instructions(side: Side) -> String {
    format!(
        "📤 <b>Payment</b>\n\n\
         Pay for your bet on <b>{}</b>.\n\n\
         👉 After payment, send a screenshot of the payment confirmation.",
        side
    )
}

pub fn payment_received() -> String {
    "✅ <b>Payment Screenshot Sent!</b>\n\n\
     Your screenshot has been forwarded to the admin for approval.\n\
     You will be notified once it is reviewed. ⏳"
        .to_string()
}

pub fn final_attempt_warning() -> String {
    "⚠️ <b>Final Attempt!</b>\n\n\
     This is your last payment screenshot for this bet.\n\
     If it is rejected, you will need to contact the admin. 📞"
        .to_string()
}

pub fn payment_summary(user: &User, attempt: u32) -> String {
    format!(
        "📤 <b>New Payment Screenshot Received</b>\n\n\
         👤 User ID: <code>{}</code>\n\
         📛 Name: {}\n\
         🎲 Bet: {}\n\
         📊 Status: {}\n\
         📝 Payment Attempts: {}/{}",
        user.user_id,
        escape_html(&user.name),
        display_bet(user),
        display_status(user),
        attempt,
        MAX_PAYMENT_ATTEMPTS
    )
}

pub fn bet_approved() -> String {
    "🎉 <b>Your Bet Has Been Approved!</b>\n\nThank you for participating. Good luck! 🍀".to_string()
}

pub fn bet_disapproved() -> String {
    "❌ <b>Payment Disapproved!</b>\n\n\
     Your payment has been disapproved. You can send a new screenshot or contact the admin. 📞"
        .to_string()
}

pub fn approved_ack(user_id: i64, available: u32, total: u32) -> String {
    format!(
        "✅ User <code>{}</code> approved. Slots left: {}/{}",
        user_id, available, total
    )
}

pub fn disapproved_ack(user_id: i64) -> String {
    format!("✅ User <code>{}</code> has been disapproved.", user_id)
}

pub fn status(user: &User) -> String {
    let Some(side) = user.bet else {
        return "🚫 <b>No Bet Placed!</b>\n\nUse /bet to place your bet.".to_string();
    };
    match user.status {
        Some(BetStatus::Approved) => format!(
            "✅ <b>Payment Approved!</b>\n\nYou chose <b>{}</b>. Good luck! 🍀",
            side
        ),
        Some(BetStatus::Disapproved) => format!(
            "❌ <b>Payment Disapproved!</b>\n\nYou chose <b>{}</b>. Send a new screenshot or contact the admin. 📞",
            side
        ),
        Some(BetStatus::Waiting) => format!(
            "⏳ <b>Payment Pending Approval</b>\n\n\
             You chose <b>{}</b>. Your screenshot is under review ({}/{} sent).",
            side, user.payment_attempts, MAX_PAYMENT_ATTEMPTS
        ),
        None => format!(
            "🎲 You chose <b>{}</b>.\n\n👉 Send a screenshot of your payment to continue.",
            side
        ),
    }
}

pub fn results(tally: &ResultTally, announcement: Option<&str>) -> String {
    let announcement = escape_html(announcement.unwrap_or("Not set"));
    if tally.is_empty() {
        format!(
            "🎲 <b>Results Status</b>\n\n\
             📢 The results are not declared yet.\n\
             🕒 <b>Result Announcement Time</b>: {}",
            announcement
        )
    } else {
        format!(
            "🎲 <b>Results Declared!</b>\n\n\
             ✅ <b>Heads</b>: {} wins\n\
             ✅ <b>Tails</b>: {} wins\n\n\
             🕒 <b>Result Announcement Time</b>: {}",
            tally.heads_wins, tally.tails_wins, announcement
        )
    }
}

pub fn next_round(time: Option<&str>) -> String {
    match time {
        Some(time) => format!(
            "📅 <b>Next Betting Round</b>\n\nScheduled for: <b>{}</b> 🕒",
            escape_html(time)
        ),
        None => "📅 <b>No Betting Round Scheduled</b>\n\nPlease check back later. ⏳".to_string(),
    }
}

pub fn slots(available: u32, total: u32) -> String {
    format!(
        "🎰 <b>Available Slots</b>\n\nSlots available: <b>{}</b> out of <b>{}</b>",
        available, total
    )
}

pub fn result_declared(side: Side) -> String {
    format!(
        "🎉 <b>Results Are Out!</b>\n\nThe result is: <b>{}</b> 🎉\n\nThank you for participating! 🍀",
        side
    )
}

pub fn declaration_ack(side: Side, winners: usize, report: &FanoutReport) -> String {
    format!(
        "✅ <b>Result Declared: {}</b>\n\n🏆 Winners: {}\n{}",
        side,
        winners,
        delivery_line(report)
    )
}

pub fn round_reset() -> String {
    "ℹ️ <b>The betting round has been reset!</b>\n\n\
     You can place a new bet with /bet once betting opens. Good luck! 🍀"
        .to_string()
}

pub fn reset_ack(users_cleared: usize, report: &FanoutReport) -> String {
    format!(
        "✅ <b>Reset Complete!</b>\n\n\
         Bets cleared for {} users. Results, winners and scheduled times are reset.\n{}",
        users_cleared,
        delivery_line(report)
    )
}

pub fn schedule_notice(time: &str) -> String {
    format!(
        "📅 <b>New Betting Round Scheduled!</b>\n\nThe next betting round is scheduled for: <b>{}</b> 🕒",
        escape_html(time)
    )
}

pub fn announcement_notice(time: &str) -> String {
    format!(
        "📢 <b>Result Announcement Scheduled!</b>\n\nThe results will be announced on: <b>{}</b> 🕒",
        escape_html(time)
    )
}

pub fn slots_notice(total: u32) -> String {
    format!("🎰 <b>Slots Updated</b>\n\nThis round has <b>{}</b> slots.", total)
}

pub fn betting_opened() -> String {
    "🎉 <b>Betting is Now Open!</b>\n\nPlace your bets using the /bet command. Good luck! 🍀".to_string()
}

pub fn betting_closed() -> String {
    "🚫 <b>Betting is Now Closed!</b>\n\n\
     No further bets will be accepted. Check the next betting time with /nextbet. ⏳"
        .to_string()
}

pub fn broadcast(message: &str) -> String {
    format!("📢 <b>Broadcast Message</b>\n\n{}", escape_html(message))
}

pub fn broadcast_summary(total_users: usize, report: &FanoutReport, message: &str) -> String {
    format!(
        "📊 <b>Broadcast Summary</b>\n\n\
         📋 Total users: <b>{}</b>\n\
         ✅ Sent to: <b>{}</b>\n\
         ❌ Failed: <b>{}</b>\n\
         ⏭️ Skipped (invalid user id): <b>{}</b>\n\n\
         Message: {}",
        total_users,
        report.delivered,
        report.failed,
        report.skipped,
        escape_html(message)
    )
}

/// Admin acknowledgement for a setter or open/close, with its broadcast outcome.
pub fn setting_ack(what: &str, report: &FanoutReport) -> String {
    format!("✅ {}\n{}", what, delivery_line(report))
}

fn delivery_line(report: &FanoutReport) -> String {
    format!(
        "📨 Notified {} users ({} failed, {} skipped)",
        report.delivered, report.failed, report.skipped
    )
}

/// Listing of users for the admin views.
pub fn user_list(title: &str, users: &[User], empty: &str) -> String {
    if users.is_empty() {
        return format!("📭 {}", empty);
    }
    let mut text = format!("👥 <b>{} ({})</b>\n\n", title, users.len());
    for user in users {
        text.push_str(&format!(
            "👤 User ID: <code>{}</code>\n📛 Name: {}\n🎲 Bet: {}\n📊 Status: {}\n\n",
            user.user_id,
            escape_html(&user.name),
            display_bet(user),
            display_status(user),
        ));
    }
    text
}

pub fn winners(side: Option<Side>, users: &[User]) -> String {
    match side {
        Some(side) if !users.is_empty() => user_list(&format!("Winners on {}", side), users, ""),
        _ => "📭 No winners yet.".to_string(),
    }
}

pub fn unknown_command() -> String {
    "❓ Unknown command. Use /start to see what you can do.".to_string()
}

pub fn usage(usage: &str, example: &str) -> String {
    format!(
        "⚠️ <b>Usage:</b> <code>{}</code>\n\nExample: <code>{}</code>",
        escape_html(usage),
        escape_html(example)
    )
}

pub fn internal_error() -> String {
    "❌ <b>Error</b>\n\nSomething went wrong. Please try again later or contact the admin.".to_string()
}

/// Reply for a rejected command.
pub fn rejection(error: &RoundError) -> String {
    match error {
        RoundError::NotRegistered => "🚫 Please start the bot with /start first.".to_string(),
        RoundError::RoundClosed => "🚫 <b>Betting is currently closed.</b>\n\n\
             👉 Use /nextbet to check the next betting time."
            .to_string(),
        RoundError::SlotsFull => "🚫 <b>All slots are full!</b>\n\nPlease wait for the next round. ⏳".to_string(),
        RoundError::AlreadyBet => "🚫 <b>You have already placed a bet!</b>\n\n\
             You can only place one bet until the next reset.\n\
             👉 Use /status to check your bet."
            .to_string(),
        RoundError::NoBetPlaced => "🚫 Please place a bet with /bet first.".to_string(),
        RoundError::AttemptsExceeded => format!(
            "🚫 <b>Maximum Attempts Reached!</b>\n\n\
             You have used all {} payment attempts. Please contact the admin. 📞",
            MAX_PAYMENT_ATTEMPTS
        ),
        RoundError::Unauthorized => "🚫 You are not authorized to perform this action.".to_string(),
        RoundError::UserNotFound(id) => format!("🚫 User <code>{}</code> not found.", id),
        RoundError::AlreadyApproved(id) => format!("ℹ️ User <code>{}</code> is already approved.", id),
        RoundError::InvalidSide => "❌ <b>Invalid side!</b>\n\nPlease use <code>heads</code> or <code>tails</code>.".to_string(),
        RoundError::InvalidInput(reason) => format!("❌ Invalid input: {}", escape_html(reason)),
    }
}

fn display_bet(user: &User) -> String {
    user.bet.map(|s| s.to_string()).unwrap_or_else(|| "N/A".into())
}

fn display_status(user: &User) -> String {
    user.status.map(|s| s.to_string()).unwrap_or_else(|| "N/A".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a <b> & c"), "a &lt;b&gt; &amp; c");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_results_not_declared() {
        let text = results(&ResultTally::default(), None);
        assert!(text.contains("not declared yet"));
        assert!(text.contains("Not set"));

        let text = results(&ResultTally { heads_wins: 2, tails_wins: 1 }, Some("Sunday 9pm"));
        assert!(text.contains("2 wins"));
        assert!(text.contains("Sunday 9pm"));
    }

    #[test]
    fn test_user_names_are_escaped() {
        let user = User::new(5, "<script>");
        let text = user_list("All Users", &[user], "none");
        assert!(text.contains("&lt;script&gt;"));
        assert!(text.contains("All Users (1)"));
    }

    #[test]
    fn test_status_variants() {
        let mut user = User::new(1, "A");
        assert!(status(&user).contains("No Bet Placed"));
        user.bet = Some(Side::Tails);
        assert!(status(&user).contains("screenshot"));
        user.status = Some(BetStatus::Waiting);
        user.payment_attempts = 2;
        assert!(status(&user).contains("2/3"));
        user.status = Some(BetStatus::Approved);
        assert!(status(&user).contains("TAILS"));
    }

    #[test]
    fn test_side_buttons_carry_callback_data() {
        let buttons = side_buttons();
        assert_eq!(buttons.len(), 2);
        assert_eq!(buttons[0].1, "heads");
        assert_eq!(buttons[1].1, "tails");
    }

    #[test]
    fn test_winners_empty() {
        assert!(winners(None, &[]).contains("No winners"));
        assert!(winners(Some(Side::Heads), &[]).contains("No winners"));
    }
}

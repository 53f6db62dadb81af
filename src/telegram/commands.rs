//! Chat commands

use crate::types::Caller;

/// Commands understood by the bot
///
/// Arguments are kept as raw text; the handler validates them so that a
/// malformed argument gets a proper reply instead of being dropped here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// Register and show the welcome message
    Start,
    Help,
    /// `/bet` shows the side keyboard, `/bet heads` bets directly
    Bet { side: Option<String> },
    /// Inline keyboard choice
    ChooseSide { side: String },
    /// A photo sent as payment screenshot
    PaymentProof { message_id: i64 },
    Status,
    Results,
    NextBet,
    Slots,
    Approve { target: String },
    Disapprove { target: String },
    Pending,
    Declare { side: String },
    Participants,
    Winners,
    Reset,
    Schedule { time: String },
    SetAnnouncement { time: String },
    FixSlots { count: String },
    Broadcast { message: String },
    Open,
    Close,
    ShowAll,
    AdminView,
    Unknown { name: String },
}

/// A command together with who sent it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub caller: Caller,
    pub command: BotCommand,
    /// Set for inline button presses, which must be acknowledged
    pub callback_id: Option<String>,
}

impl BotCommand {
    /// Parse a `/command args` message. Plain text is not a command.
    pub fn parse(text: &str) -> Option<BotCommand> {
        let text = text.trim();
        let body = text.strip_prefix('/')?;

        let (head, args) = match body.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (body, ""),
        };
        // "/bet@coinflip_bot" in group chats
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        let arg = || args.to_string();

        let command = match name.as_str() {
            "start" => BotCommand::Start,
            "help" => BotCommand::Help,
            "bet" => BotCommand::Bet {
                side: (!args.is_empty()).then(arg),
            },
            "status" => BotCommand::Status,
            "results" => BotCommand::Results,
            "nextbet" => BotCommand::NextBet,
            "slots" => BotCommand::Slots,
            "approve" => BotCommand::Approve { target: arg() },
            "disapprove" => BotCommand::Disapprove { target: arg() },
            "pending" => BotCommand::Pending,
            "declare" => BotCommand::Declare { side: arg() },
            "participants" => BotCommand::Participants,
            "winners" => BotCommand::Winners,
            "reset" => BotCommand::Reset,
            "schedule" => BotCommand::Schedule { time: arg() },
            "setannouncement" => BotCommand::SetAnnouncement { time: arg() },
            "fixslots" => BotCommand::FixSlots { count: arg() },
            "broadcast" => BotCommand::Broadcast { message: arg() },
            "open" => BotCommand::Open,
            "close" => BotCommand::Close,
            "showall" => BotCommand::ShowAll,
            "adminview" => BotCommand::AdminView,
            _ => BotCommand::Unknown { name },
        };
        Some(command)
    }

    pub fn name(&self) -> &str {
        match self {
            BotCommand::Start => "start",
            BotCommand::Help => "help",
            BotCommand::Bet { .. } => "bet",
            BotCommand::ChooseSide { .. } => "choose_side",
            BotCommand::PaymentProof { .. } => "payment_proof",
            BotCommand::Status => "status",
            BotCommand::Results => "results",
            BotCommand::NextBet => "nextbet",
            BotCommand::Slots => "slots",
            BotCommand::Approve { .. } => "approve",
            BotCommand::Disapprove { .. } => "disapprove",
            BotCommand::Pending => "pending",
            BotCommand::Declare { .. } => "declare",
            BotCommand::Participants => "participants",
            BotCommand::Winners => "winners",
            BotCommand::Reset => "reset",
            BotCommand::Schedule { .. } => "schedule",
            BotCommand::SetAnnouncement { .. } => "setannouncement",
            BotCommand::FixSlots { .. } => "fixslots",
            BotCommand::Broadcast { .. } => "broadcast",
            BotCommand::Open => "open",
            BotCommand::Close => "close",
            BotCommand::ShowAll => "showall",
            BotCommand::AdminView => "adminview",
            BotCommand::Unknown { name } => name,
        }
    }
}

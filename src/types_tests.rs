//! Tests for core types

#[cfg(test)]
mod tests {
    use super::super::error::RoundError;
    use super::super::types::*;

    #[test]
    fn test_side_parsing_is_case_insensitive() {
        assert_eq!("heads".parse::<Side>(), Ok(Side::Heads));
        assert_eq!("TAILS".parse::<Side>(), Ok(Side::Tails));
        assert_eq!("  Heads ".parse::<Side>(), Ok(Side::Heads));
    }

    #[test]
    fn test_side_parsing_rejects_other_values() {
        assert_eq!("edge".parse::<Side>(), Err(RoundError::InvalidSide));
        assert_eq!("".parse::<Side>(), Err(RoundError::InvalidSide));
        assert_eq!("h".parse::<Side>(), Err(RoundError::InvalidSide));
    }

    #[test]
    fn test_side_display_and_storage_name() {
        assert_eq!(Side::Heads.to_string(), "HEADS");
        assert_eq!(Side::Tails.as_str(), "tails");
        assert_eq!(serde_json::to_string(&Side::Heads).unwrap(), "\"heads\"");
    }

    #[test]
    fn test_bet_status_serialization() {
        assert_eq!(
            serde_json::to_string(&BetStatus::Disapproved).unwrap(),
            "\"disapproved\""
        );
        let waiting: BetStatus = serde_json::from_str("\"waiting\"").unwrap();
        assert_eq!(waiting, BetStatus::Waiting);
        assert_eq!("approved".parse::<BetStatus>(), Ok(BetStatus::Approved));
        assert!("pending".parse::<BetStatus>().is_err());
    }

    #[test]
    fn test_new_user_starts_empty() {
        let user = User::new(10, "Alice");
        assert_eq!(user.user_id, 10);
        assert_eq!(user.bet, None);
        assert_eq!(user.status, None);
        assert_eq!(user.payment_attempts, 0);
        assert!(!user.has_bet());
        assert!(!user.is_approved());
    }

    #[test]
    fn test_settings_with_capacity() {
        let settings = RoundSettings::with_capacity(30);
        assert!(!settings.betting_open);
        assert_eq!(settings.total_slots, 30);
        assert_eq!(settings.available_slots, 30);
        assert!(settings.next_betting_time.is_none());
        assert!(settings.result_announcement_time.is_none());
    }

    #[test]
    fn test_tally_records_per_side() {
        let mut tally = ResultTally::default();
        assert!(tally.is_empty());

        tally.record(Side::Heads);
        tally.record(Side::Heads);
        tally.record(Side::Tails);

        assert_eq!(tally.wins(Side::Heads), 2);
        assert_eq!(tally.wins(Side::Tails), 1);
        assert!(!tally.is_empty());
    }

    #[test]
    fn test_winner_set_membership() {
        let winners = WinnerSet {
            declared_side: Some(Side::Tails),
            user_ids: vec![1, 5],
        };
        assert!(winners.contains(5));
        assert!(!winners.contains(2));
        assert!(WinnerSet::default().is_empty());
    }

    #[test]
    fn test_private_caller_uses_user_id_as_chat() {
        let caller = Caller::private(77, "Bob");
        assert_eq!(caller.chat_id, 77);
        assert_eq!(caller.name, "Bob");
    }
}

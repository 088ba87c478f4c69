//! Property-based tests for the intake machine

use super::*;
use proptest::prelude::*;

fn arb_phase() -> impl Strategy<Value = Phase> {
    prop_oneof![
        Just(Phase::AwaitingInquiry),
        Just(Phase::AwaitingContact),
        Just(Phase::AwaitingPhone),
        Just(Phase::Bridged),
    ]
}

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9@._ -]{0,40}"
}

fn arb_non_blank_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9@._-][a-zA-Z0-9@._ -]{0,40}"
}

/// Run a message sequence through the machine the way the router does
fn drive(messages: &[String]) -> (Phase, IntakeRecord, usize) {
    let mut phase = Phase::AwaitingInquiry;
    let mut record = IntakeRecord::default();
    let mut notifications = 0;
    for text in messages {
        let Ok(result) = transition(phase, text) else {
            continue;
        };
        for effect in &result.effects {
            match effect {
                Effect::Record { field, value } => {
                    record.set_once(*field, value.clone());
                }
                Effect::NotifyOperator => notifications += 1,
                Effect::Prompt { .. } => {}
            }
        }
        phase = result.next_phase;
    }
    (phase, record, notifications)
}

proptest! {
    #[test]
    fn three_messages_fill_the_record_in_order(
        inquiry in arb_non_blank_text(),
        contact in arb_non_blank_text(),
        phone in arb_non_blank_text(),
    ) {
        let (phase, record, notifications) =
            drive(&[inquiry.clone(), contact.clone(), phone.clone()]);
        prop_assert_eq!(phase, Phase::Bridged);
        prop_assert_eq!(record.inquiry, Some(inquiry));
        prop_assert_eq!(record.contact, Some(contact));
        prop_assert_eq!(record.phone, Some(phone));
        prop_assert_eq!(notifications, 1);
    }

    #[test]
    fn phase_never_moves_backward(phase in arb_phase(), text in arb_text()) {
        if let Ok(result) = transition(phase, &text) {
            prop_assert!(result.next_phase > phase);
        }
    }

    #[test]
    fn blank_input_never_changes_phase(phase in arb_phase(), spaces in " {0,5}") {
        prop_assert_eq!(transition(phase, &spaces), Err(TransitionError::EmptyInput));
    }

    #[test]
    fn at_most_one_operator_notification(messages in prop::collection::vec(arb_text(), 0..12)) {
        let (phase, record, notifications) = drive(&messages);
        prop_assert!(notifications <= 1);
        prop_assert_eq!(notifications == 1, phase == Phase::Bridged);
        prop_assert_eq!(record.is_complete(), phase == Phase::Bridged);
    }

    #[test]
    fn every_accepted_message_prompts_exactly_once(phase in arb_phase(), text in arb_non_blank_text()) {
        if let Ok(result) = transition(phase, &text) {
            prop_assert_eq!(result.prompts().count(), 1);
        }
    }
}

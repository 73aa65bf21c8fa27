//! Participant-facing copy and button layouts.
//!
//! Bodies are HTML (the gateway sends with `parse_mode = HTML`), so every
//! user-supplied string passes through [`escape`].

use crate::gateway::{Button, Keyboard};
use crate::pairing::FeedbackCallback;
use crate::participant::Participant;
use crate::types::{FeedbackOutcome, Language, Side, WeekStatus};

pub const PARTICIPATE_YES: &str = "participate_yes";
pub const PARTICIPATE_NO: &str = "participate_no";
pub const MIDWEEK_ACTION: &str = "midweek";
pub const WEEKEND_ACTION: &str = "weekend";

pub fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn partner_line(partner: &Participant) -> String {
    let name = escape(&partner.display_name());
    match (&partner.username, &partner.name) {
        (Some(u), Some(_)) => format!("{name} (@{})", escape(u)),
        _ => name,
    }
}

// ---------------------------------------------------------------------------
// Pairing result
// ---------------------------------------------------------------------------

pub fn pairing_intro(lang: Language, partner: &Participant) -> String {
    let who = partner_line(partner);
    match lang {
        Language::En => format!(
            "☕ <b>Your coffee partner this week</b>\n\n{who}\n\n\
             Say hi and pick a time for a call. Have a great chat!"
        ),
        Language::Ru => format!(
            "☕ <b>Ваш собеседник на этой неделе</b>\n\n{who}\n\n\
             Напишите собеседнику и договоритесь о времени звонка. Приятного общения!"
        ),
    }
}

pub fn leftover_notice(lang: Language) -> String {
    match lang {
        Language::En => "This week we couldn't find you a partner: an odd number of people \
                         signed up. You stay on the list for next week."
            .to_string(),
        Language::Ru => "На этой неделе пары не нашлось: участников оказалось нечётное число. \
                         Вы остаётесь в списке на следующую неделю."
            .to_string(),
    }
}

// ---------------------------------------------------------------------------
// Check-ins
// ---------------------------------------------------------------------------

fn outcome_label(lang: Language, outcome: FeedbackOutcome) -> &'static str {
    match (lang, outcome) {
        (Language::En, FeedbackOutcome::Met) => "✅ We met",
        (Language::En, FeedbackOutcome::Scheduled) => "📅 Scheduled",
        (Language::En, FeedbackOutcome::NotMet) => "⏳ Not yet",
        (Language::En, FeedbackOutcome::Failed) => "❌ Didn't work out",
        (Language::Ru, FeedbackOutcome::Met) => "✅ Встретились",
        (Language::Ru, FeedbackOutcome::Scheduled) => "📅 Договорились",
        (Language::Ru, FeedbackOutcome::NotMet) => "⏳ Пока нет",
        (Language::Ru, FeedbackOutcome::Failed) => "❌ Не получилось",
    }
}

fn feedback_keyboard(
    lang: Language,
    action: &str,
    pairing_id: &str,
    side: Side,
    outcomes: &[FeedbackOutcome],
) -> Keyboard {
    outcomes
        .iter()
        .map(|&outcome| {
            let payload = FeedbackCallback {
                action: action.to_string(),
                pairing_id: pairing_id.to_string(),
                side,
                outcome,
            };
            vec![Button::new(outcome_label(lang, outcome), payload.encode())]
        })
        .collect()
}

pub fn midweek_prompt(lang: Language, partner_name: &str) -> String {
    let partner = escape(partner_name);
    match lang {
        Language::En => format!(
            "👋 Midweek check-in: have you connected with <b>{partner}</b> yet?"
        ),
        Language::Ru => format!(
            "👋 Середина недели: удалось связаться с <b>{partner}</b>?"
        ),
    }
}

pub fn midweek_keyboard(lang: Language, pairing_id: &str, side: Side) -> Keyboard {
    feedback_keyboard(
        lang,
        MIDWEEK_ACTION,
        pairing_id,
        side,
        &[
            FeedbackOutcome::Met,
            FeedbackOutcome::Scheduled,
            FeedbackOutcome::NotMet,
        ],
    )
}

pub fn weekend_prompt(lang: Language, partner_name: &str) -> String {
    let partner = escape(partner_name);
    match lang {
        Language::En => format!(
            "🗓 The week is almost over. How did your coffee with <b>{partner}</b> go?"
        ),
        Language::Ru => format!(
            "🗓 Неделя подходит к концу. Как прошла встреча с <b>{partner}</b>?"
        ),
    }
}

pub fn weekend_keyboard(lang: Language, pairing_id: &str, side: Side) -> Keyboard {
    feedback_keyboard(
        lang,
        WEEKEND_ACTION,
        pairing_id,
        side,
        FeedbackOutcome::all(),
    )
}

// ---------------------------------------------------------------------------
// Weekly invitation
// ---------------------------------------------------------------------------

/// Copy depends on whether the participant is currently opted in.
pub fn invitation(lang: Language, current: WeekStatus) -> String {
    match (lang, current) {
        (Language::En, WeekStatus::Active) => "☕ A new week of coffee chats starts Monday. \
             You're on the list: tap <b>Yes</b> to stay in, or <b>Skip</b> to sit this one out."
            .to_string(),
        (Language::En, WeekStatus::Passive) => "☕ A new week of coffee chats starts Monday. \
             Want to meet someone new? Tap <b>Yes</b> to join this week."
            .to_string(),
        (Language::Ru, WeekStatus::Active) => "☕ В понедельник начинается новая неделя встреч. \
             Вы в списке: нажмите <b>Да</b>, чтобы остаться, или <b>Пропустить</b>."
            .to_string(),
        (Language::Ru, WeekStatus::Passive) => "☕ В понедельник начинается новая неделя встреч. \
             Хотите познакомиться с кем-то новым? Нажмите <b>Да</b>, чтобы участвовать."
            .to_string(),
    }
}

pub fn invitation_keyboard(lang: Language) -> Keyboard {
    let (yes, no) = match lang {
        Language::En => ("✅ Yes, I'm in", "⏸ Skip this week"),
        Language::Ru => ("✅ Да, участвую", "⏸ Пропустить"),
    };
    vec![vec![
        Button::new(yes, PARTICIPATE_YES),
        Button::new(no, PARTICIPATE_NO),
    ]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Pool;
    use crate::types::MatchStatus;

    fn partner(name: Option<&str>, username: Option<&str>) -> Participant {
        Participant {
            id: "recB".into(),
            name: name.map(String::from),
            username: username.map(String::from),
            chat_id: Some("2".into()),
            consent: true,
            language: Language::En,
            pool: Pool::Global,
            next_week_status: WeekStatus::Active,
            current_week_status: MatchStatus::Matched,
            spam_opt_out: false,
            weekend_notification_sent: false,
        }
    }

    #[test]
    fn intro_escapes_names_and_shows_handle() {
        let body = pairing_intro(Language::En, &partner(Some("Bo <script>"), Some("bo")));
        assert!(body.contains("Bo &lt;script&gt; (@bo)"));
    }

    #[test]
    fn intro_falls_back_to_handle() {
        let body = pairing_intro(Language::Ru, &partner(None, Some("bo")));
        assert!(body.contains("@bo"));
        assert!(body.contains("собеседник"));
    }

    #[test]
    fn weekend_keyboard_offers_all_outcomes_for_the_side() {
        let kb = weekend_keyboard(Language::En, "recP", Side::First);
        let payloads: Vec<&str> = kb.iter().map(|row| row[0].callback_data.as_str()).collect();
        assert_eq!(
            payloads,
            [
                "weekend:recP:1:met",
                "weekend:recP:1:scheduled",
                "weekend:recP:1:not_met",
                "weekend:recP:1:failed"
            ]
        );
    }

    #[test]
    fn invitation_buttons_carry_fixed_payloads() {
        let kb = invitation_keyboard(Language::Ru);
        assert_eq!(kb[0][0].callback_data, PARTICIPATE_YES);
        assert_eq!(kb[0][1].callback_data, PARTICIPATE_NO);
        assert_ne!(
            invitation(Language::En, WeekStatus::Active),
            invitation(Language::En, WeekStatus::Passive)
        );
    }
}

use super::{Reminder, ReminderKind, ReminderSettings};

const MINUTES_PLACEHOLDER: &str = "{minutes}";

/// Title and body for a reminder. A custom template from the settings
/// replaces the default body.
pub fn render(reminder: &Reminder, settings: &ReminderSettings) -> (String, String) {
    let minutes = reminder.remaining_minutes;
    let title = match reminder.kind {
        ReminderKind::Approaching => "Almost out of time",
        ReminderKind::FirstWarning => "Screen time reminder",
        ReminderKind::FinalWarning => "Final screen time warning",
        ReminderKind::LimitReached => "Daily limit reached",
        ReminderKind::ResetDone => "Screen time reset",
    };

    let template = match reminder.kind {
        ReminderKind::Approaching => settings.approaching_message.as_deref(),
        ReminderKind::FirstWarning => settings.first_message.as_deref(),
        ReminderKind::FinalWarning => settings.final_message.as_deref(),
        ReminderKind::LimitReached => settings.limit_message.as_deref(),
        ReminderKind::ResetDone => None,
    };

    let body = match template.filter(|t| !t.trim().is_empty()) {
        Some(t) => t.replace(MINUTES_PLACEHOLDER, &minutes.to_string()),
        None => default_body(reminder.kind, minutes),
    };

    (title.to_string(), body)
}

fn default_body(kind: ReminderKind, minutes: u64) -> String {
    match kind {
        ReminderKind::Approaching => {
            format!("About {} of screen time left today.", plural_minutes(minutes))
        }
        ReminderKind::FirstWarning => {
            format!("{} left before today's limit.", plural_minutes(minutes))
        }
        ReminderKind::FinalWarning => format!(
            "Only {} left. Monitored apps will be blocked when time runs out.",
            plural_minutes(minutes)
        ),
        ReminderKind::LimitReached => {
            "You've used all of today's screen time. Monitored apps are blocked until tomorrow."
                .to_string()
        }
        ReminderKind::ResetDone => "A new day has started and your usage has been reset.".to_string(),
    }
}

fn plural_minutes(minutes: u64) -> String {
    if minutes == 1 {
        "1 minute".to_string()
    } else {
        format!("{minutes} minutes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bodies_mention_remaining_minutes() {
        let settings = ReminderSettings::default();
        let (title, body) = render(&Reminder::new(ReminderKind::FirstWarning, 10), &settings);
        assert_eq!(title, "Screen time reminder");
        assert_eq!(body, "10 minutes left before today's limit.");

        let (_, body) = render(&Reminder::new(ReminderKind::Approaching, 1), &settings);
        assert!(body.contains("1 minute "));
    }

    #[test]
    fn custom_template_substitutes_minutes() {
        let settings = ReminderSettings {
            final_message: Some("{minutes} min to go!".into()),
            ..Default::default()
        };
        let (_, body) = render(&Reminder::new(ReminderKind::FinalWarning, 5), &settings);
        assert_eq!(body, "5 min to go!");
    }

    #[test]
    fn blank_template_falls_back_to_default() {
        let settings = ReminderSettings {
            limit_message: Some("   ".into()),
            ..Default::default()
        };
        let (_, body) = render(&Reminder::new(ReminderKind::LimitReached, 0), &settings);
        assert!(body.starts_with("You've used all"));
    }
}

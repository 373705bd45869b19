//! Reminder delivery with permission handling and fallbacks.
//!
//! Escalation order:
//! 1. System notification, prompting for permission when it isn't granted
//! 2. Sound and vibration when the notification can't be delivered
//! 3. In-app overlay on top of whichever channel was used, when enabled

use super::{render, Reminder, ReminderSettings};
use crate::error::PlatformError;
use crate::platform::{Notifier, OverlaySurface, Permission};

/// Vibration pattern in milliseconds: wait, buzz, pause, buzz.
pub const REMINDER_VIBRATION: [u64; 4] = [0, 400, 200, 400];

/// What a single dispatch actually did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub via_notification: bool,
    pub fallback_used: bool,
    pub sound_played: bool,
    pub vibrated: bool,
    pub overlay_shown: bool,
}

pub struct ReminderDispatcher {
    permission: Permission,
}

impl ReminderDispatcher {
    /// Reads the current permission from the platform.
    pub fn new(notifier: &dyn Notifier) -> Self {
        let permission = notifier.permission_status();
        tracing::debug!(?permission, "notification permission");
        Self { permission }
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    /// Deliver one reminder. Returns `None` when the settings suppress it.
    pub fn dispatch(
        &mut self,
        reminder: &Reminder,
        settings: &ReminderSettings,
        notifier: &dyn Notifier,
        overlay: Option<&dyn OverlaySurface>,
    ) -> Option<DispatchReport> {
        if !settings.enabled && reminder.kind.is_warning() {
            tracing::debug!(kind = ?reminder.kind, "reminders disabled");
            return None;
        }

        let (title, body) = render(reminder, settings);
        let mut report = DispatchReport::default();

        if settings.notification_enabled {
            report.via_notification = self.notify(notifier, &title, &body);
        }

        if !report.via_notification {
            report.fallback_used = true;
            if settings.sound_enabled {
                report.sound_played = log_failure("sound", notifier.play_sound());
            }
            if settings.vibration_enabled {
                report.vibrated = log_failure("vibration", notifier.vibrate(&REMINDER_VIBRATION));
            }
        }

        if settings.overlay_enabled && reminder.kind.has_overlay() {
            if let Some(overlay) = overlay {
                report.overlay_shown = log_failure(
                    "overlay",
                    overlay.show_reminder_overlay(reminder.remaining_minutes),
                );
            }
        }

        tracing::info!(
            kind = ?reminder.kind,
            remaining_minutes = reminder.remaining_minutes,
            via_notification = report.via_notification,
            fallback = report.fallback_used,
            "reminder dispatched"
        );
        Some(report)
    }

    fn notify(&mut self, notifier: &dyn Notifier, title: &str, body: &str) -> bool {
        if self.permission != Permission::Authorized {
            self.permission = notifier.request_permission();
            if self.permission != Permission::Authorized {
                tracing::info!(permission = ?self.permission, "notification permission not granted");
                return false;
            }
        }

        match notifier.notify(title, body) {
            Ok(()) => true,
            Err(PlatformError::PermissionDenied { .. }) => {
                // Revoked behind our back.
                self.permission = Permission::Denied;
                tracing::warn!("notification permission revoked");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "notification failed");
                false
            }
        }
    }
}

fn log_failure(channel: &str, result: Result<(), PlatformError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(channel, error = %e, "reminder channel failed");
            false
        }
    }
}

//! User directory model and notification preferences.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A user as seen by the core: an external directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
}

pub const DEFAULT_FREQUENCY: &str = "inmediata";
pub const DEFAULT_KINDS: &str = "estado";

/// Per-user notification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub user_id: i64,
    pub frequency: String,
    pub kinds: String,
    pub enabled: bool,
}

impl NotificationPreferences {
    pub fn defaults_for(user_id: i64) -> Self {
        Self {
            user_id,
            frequency: DEFAULT_FREQUENCY.to_string(),
            kinds: DEFAULT_KINDS.to_string(),
            enabled: true,
        }
    }

    /// Whether the user asked to hear about registration status changes.
    pub fn wants_status_alerts(&self) -> bool {
        self.enabled && self.kinds.to_lowercase().contains(DEFAULT_KINDS)
    }
}

/// Request payload for updating notification preferences.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdatePreferencesRequest {
    #[serde(rename = "frecuencia")]
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub frequency: String,

    #[serde(rename = "tipos")]
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub kinds: String,

    #[serde(rename = "habilitado", default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Response payload for notification preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreferencesResponse {
    #[serde(rename = "id_usuario")]
    pub user_id: i64,
    #[serde(rename = "frecuencia")]
    pub frequency: String,
    #[serde(rename = "tipos")]
    pub kinds: String,
    #[serde(rename = "habilitado")]
    pub enabled: bool,
}

impl From<NotificationPreferences> for PreferencesResponse {
    fn from(p: NotificationPreferences) -> Self {
        Self {
            user_id: p.user_id,
            frequency: p.frequency,
            kinds: p.kinds,
            enabled: p.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_enable_status_alerts() {
        let prefs = NotificationPreferences::defaults_for(5);
        assert_eq!(prefs.frequency, "inmediata");
        assert!(prefs.wants_status_alerts());
    }

    #[test]
    fn test_status_alerts_follow_kinds_and_flag() {
        let mut prefs = NotificationPreferences::defaults_for(5);
        prefs.kinds = "Pagos, ESTADO".into();
        assert!(prefs.wants_status_alerts());

        prefs.kinds = "pagos".into();
        assert!(!prefs.wants_status_alerts());

        prefs.kinds = "estado".into();
        prefs.enabled = false;
        assert!(!prefs.wants_status_alerts());
    }

    #[test]
    fn test_update_request_rejects_blank() {
        let request: UpdatePreferencesRequest =
            serde_json::from_str(r#"{"frecuencia": " ", "tipos": "estado"}"#).unwrap();
        assert!(request.enabled);
        assert!(request.validate().is_err());
    }
}

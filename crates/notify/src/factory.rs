//! Builds the enabled channel set from notifier configuration.
//!
//! A channel whose `required` section has any empty field is not
//! configured; it is skipped before construction and never receives
//! anything. The enabled list is logged once.

use indexmap::IndexMap;
use sigwatch_core::NotifierConfig;

use crate::discord::DiscordNotifier;
use crate::dispatcher::Channel;
use crate::email::EmailNotifier;
use crate::slack::SlackNotifier;
use crate::stdout::StdoutNotifier;
use crate::telegram::TelegramNotifier;
use crate::templating::TemplateRenderer;
use crate::traits::{Notifier, NotifyError};
use crate::twilio::TwilioNotifier;
use crate::webhook::WebhookNotifier;

/// Construct the notifier for a named channel.
pub fn build_notifier(name: &str, config: &NotifierConfig) -> Result<Box<dyn Notifier>, NotifyError> {
    let notifier: Box<dyn Notifier> = match name {
        "twilio" => Box::new(TwilioNotifier::from_config(config)?),
        "discord" => Box::new(DiscordNotifier::from_config(config)?),
        "slack" => Box::new(SlackNotifier::from_config(config)?),
        "gmail" => Box::new(EmailNotifier::from_config(config)?),
        "telegram" => Box::new(TelegramNotifier::from_config(config)?),
        "webhook" => Box::new(WebhookNotifier::from_config(config)?),
        "stdout" => Box::new(StdoutNotifier::new()),
        other => return Err(NotifyError::Config(format!("unknown notifier '{other}'"))),
    };
    Ok(notifier)
}

/// Build every configured channel with the built-in notifiers.
pub fn build_channels(configs: &IndexMap<String, NotifierConfig>) -> Vec<Channel> {
    build_channels_with(configs, build_notifier)
}

/// Build every configured channel using `build` as the constructor.
///
/// Unconfigured channels are skipped without calling `build`. A channel
/// whose construction fails is logged and left out. A template that does
/// not parse is logged here; the channel is still built and sends nothing
/// per cycle until the template is fixed.
pub fn build_channels_with<F>(configs: &IndexMap<String, NotifierConfig>, build: F) -> Vec<Channel>
where
    F: Fn(&str, &NotifierConfig) -> Result<Box<dyn Notifier>, NotifyError>,
{
    let renderer = TemplateRenderer::new();
    let mut channels = Vec::new();

    for (name, config) in configs {
        if !config.is_configured() {
            tracing::debug!(
                channel = %name,
                missing = ?config.missing_required(),
                "Notifier not configured, skipping"
            );
            continue;
        }

        let template = config.template();
        if let Some(template) = &template {
            if let Err(e) = renderer.validate(template) {
                tracing::warn!(channel = %name, error = %e, "Channel template does not parse");
            }
        }

        match build(name.as_str(), config) {
            Ok(notifier) => channels.push(Channel::new(notifier, template)),
            Err(e) => {
                tracing::warn!(channel = %name, error = %e, "Failed to build notifier");
            }
        }
    }

    let enabled: Vec<&str> = channels.iter().map(Channel::name).collect();
    tracing::info!(?enabled, "Enabled notifiers");

    channels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Notification;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn notifier_config(required: serde_json::Value, optional: serde_json::Value) -> NotifierConfig {
        NotifierConfig {
            required: required.as_object().cloned().unwrap_or_default(),
            optional: optional.as_object().cloned().unwrap_or_default(),
        }
    }

    struct CountingNotifier {
        name: String,
        sends: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Notifier for CountingNotifier {
        async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn channel_name(&self) -> &str {
            &self.name
        }
    }

    #[test]
    fn unconfigured_channel_is_never_built() {
        let mut configs = IndexMap::new();
        configs.insert(
            "telegram".to_string(),
            notifier_config(json!({"token": "", "chat_id": "1"}), json!({})),
        );
        configs.insert(
            "slack".to_string(),
            notifier_config(json!({"webhook": "https://hooks.example.com"}), json!({"template": "{{ market }}"})),
        );

        let built = Arc::new(std::sync::Mutex::new(Vec::new()));
        let built_in = built.clone();
        let channels = build_channels_with(&configs, move |name, _| {
            built_in.lock().unwrap().push(name.to_string());
            let notifier: Box<dyn Notifier> = Box::new(CountingNotifier {
                name: name.to_string(),
                sends: Arc::new(AtomicUsize::new(0)),
            });
            Ok(notifier)
        });

        assert_eq!(*built.lock().unwrap(), vec!["slack"]);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name(), "slack");
        assert_eq!(channels[0].template(), "{{ market }}");
    }

    #[test]
    fn missing_template_falls_back_to_default() {
        let mut configs = IndexMap::new();
        configs.insert("stdout".to_string(), notifier_config(json!({"enable": true}), json!({})));

        let channels = build_channels(&configs);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].template(), crate::templating::DEFAULT_TEMPLATE);
    }

    #[test]
    fn disabled_stdout_is_skipped() {
        let mut configs = IndexMap::new();
        configs.insert("stdout".to_string(), notifier_config(json!({"enable": false}), json!({})));
        assert!(build_channels(&configs).is_empty());
    }

    #[test]
    fn unknown_channel_is_left_out() {
        let mut configs = IndexMap::new();
        configs.insert("pager".to_string(), notifier_config(json!({"key": "x"}), json!({})));
        assert!(build_channels(&configs).is_empty());
        assert!(build_notifier("pager", &NotifierConfig::default()).is_err());
    }

    #[test]
    fn builds_known_channels_in_config_order() {
        let mut configs = IndexMap::new();
        configs.insert(
            "webhook".to_string(),
            notifier_config(json!({"url": "https://example.com/hook"}), json!({})),
        );
        configs.insert(
            "telegram".to_string(),
            notifier_config(json!({"token": "1:A", "chat_id": "-1"}), json!({"parse_mode": "html"})),
        );
        configs.insert(
            "discord".to_string(),
            notifier_config(json!({"webhook": "https://discord.example/w", "username": "bot"}), json!({})),
        );

        let channels = build_channels(&configs);
        let names: Vec<&str> = channels.iter().map(Channel::name).collect();
        assert_eq!(names, vec!["webhook", "telegram", "discord"]);
    }

    #[test]
    fn broken_template_still_builds_channel() {
        let mut configs = IndexMap::new();
        configs.insert(
            "stdout".to_string(),
            notifier_config(json!({"enable": true}), json!({"template": "{{ unclosed"})),
        );

        let channels = build_channels(&configs);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].template(), "{{ unclosed");
        assert!(TemplateRenderer::new().validate(channels[0].template()).is_err());
    }
}

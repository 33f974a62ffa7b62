//! ==============================================================================
//! alerts.rs - out-of-range alert delivery
//! ==============================================================================
//!
//! purpose:
//!     turns range breaches into text messages and pushes them to a
//!     Telegram bot. delivery is fire-and-forget: handlers dispatch to a
//!     spawned task, and a failed send is logged and dropped.
//!
//! relationships:
//!     - used by: server.rs (/update and /predict handlers)
//!     - uses: ranges.rs (Breach), config.rs (AlertsConfig)
//!
//! transport:
//!     AlertTransport is the seam. production uses TelegramTransport
//!     (reqwest, Bot API sendMessage). tests plug in a recorder.
//!
//! ==============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::AlertsConfig;
use crate::projection::Horizon;
use crate::ranges::Breach;

/// where a breach was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    RealTime,
    Prediction(Horizon),
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::RealTime => f.write_str("Real-time"),
            AlertKind::Prediction(horizon) => write!(f, "{} Prediction", horizon),
        }
    }
}

/// Renders the fixed alert template for one breach.
pub fn format_alert(breach: &Breach, kind: AlertKind) -> String {
    format!(
        "⚠ ALERT: {} ({}) is out of range! Current Value: {}",
        breach.parameter, kind, breach.value
    )
}

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Bot API returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
}

/// Sends one rendered alert message.
#[async_trait]
pub trait AlertTransport: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), AlertError>;
}

// ==============================================================================
// telegram transport
// ==============================================================================

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Telegram Bot API `sendMessage` over HTTPS.
pub struct TelegramTransport {
    client: reqwest::Client,
    url: String,
    chat_id: String,
}

impl TelegramTransport {
    pub fn new(
        api_base: &str,
        bot_token: &str,
        chat_id: &str,
        timeout: Duration,
    ) -> Result<Self, AlertError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!(
                "{}/bot{}/sendMessage",
                api_base.trim_end_matches('/'),
                bot_token
            ),
            chat_id: chat_id.to_string(),
        })
    }
}

#[async_trait]
impl AlertTransport for TelegramTransport {
    async fn send(&self, message: &str) -> Result<(), AlertError> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: message,
        };
        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AlertError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

// ==============================================================================
// forwarder
// ==============================================================================

/// Fans breaches out to the configured transport.
///
/// Without a transport (alerts disabled or no credentials) alerts are only
/// logged.
#[derive(Clone)]
pub struct AlertForwarder {
    transport: Option<Arc<dyn AlertTransport>>,
}

impl AlertForwarder {
    pub fn new(transport: Arc<dyn AlertTransport>) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    pub fn disabled() -> Self {
        Self { transport: None }
    }

    /// Builds the Telegram forwarder from config, or a log-only one when
    /// delivery is switched off or credentials are missing.
    pub fn from_config(config: &AlertsConfig) -> Result<Self, AlertError> {
        if !config.enabled {
            tracing::info!("[ALERTS] delivery disabled in config");
            return Ok(Self::disabled());
        }
        if config.bot_token.is_empty() || config.chat_id.is_empty() {
            tracing::warn!("[ALERTS] no bot token or chat id configured, alerts will only be logged");
            return Ok(Self::disabled());
        }
        let transport = TelegramTransport::new(
            &config.api_base,
            &config.bot_token,
            &config.chat_id,
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self::new(Arc::new(transport)))
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Hands the breaches to a background task and returns immediately.
    ///
    /// The request that found the breaches never waits on the Bot API.
    /// Returns `None` when there is nothing to send.
    pub fn dispatch(&self, breaches: Vec<Breach>, kind: AlertKind) -> Option<JoinHandle<()>> {
        if breaches.is_empty() {
            return None;
        }
        let forwarder = self.clone();
        Some(tokio::spawn(async move {
            forwarder.notify(&breaches, kind).await;
        }))
    }

    /// Sends one message per breach. Failures are logged, never returned.
    pub async fn notify(&self, breaches: &[Breach], kind: AlertKind) {
        for breach in breaches {
            let message = format_alert(breach, kind);
            let Some(transport) = &self.transport else {
                tracing::warn!(parameter = %breach.parameter, value = breach.value, "{}", message);
                continue;
            };
            match transport.send(&message).await {
                Ok(()) => {
                    tracing::info!(parameter = %breach.parameter, value = breach.value, %kind, "[ALERTS] sent");
                }
                Err(e) => {
                    tracing::error!(parameter = %breach.parameter, error = %e, "[ALERTS] delivery failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Parameter;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<String>>);

    #[async_trait]
    impl AlertTransport for Recorder {
        async fn send(&self, message: &str) -> Result<(), AlertError> {
            self.0.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl AlertTransport for Failing {
        async fn send(&self, _message: &str) -> Result<(), AlertError> {
            Err(AlertError::HttpStatus {
                status: 502,
                body: "bad gateway".into(),
            })
        }
    }

    fn breach(parameter: Parameter, value: f64) -> Breach {
        Breach {
            parameter,
            value,
            range: parameter.safe_range(),
        }
    }

    #[test]
    fn message_template() {
        let msg = format_alert(&breach(Parameter::Ph, 9.2), AlertKind::RealTime);
        assert_eq!(msg, "⚠ ALERT: PH (Real-time) is out of range! Current Value: 9.2");

        let msg = format_alert(
            &breach(Parameter::Turbidity, 55.5),
            AlertKind::Prediction(Horizon::TwelveHours),
        );
        assert_eq!(
            msg,
            "⚠ ALERT: TURBIDITY (12hr Prediction) is out of range! Current Value: 55.5"
        );
    }

    #[tokio::test]
    async fn one_send_per_breach() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let forwarder = AlertForwarder::new(recorder.clone());

        forwarder
            .notify(
                &[breach(Parameter::Temperature, 35.0), breach(Parameter::Ammonia, 0.9)],
                AlertKind::RealTime,
            )
            .await;

        let sent = recorder.0.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].contains("TEMP"));
        assert!(sent[1].contains("AMMONIA"));
    }

    #[tokio::test]
    async fn dispatch_sends_in_background() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let forwarder = AlertForwarder::new(recorder.clone());

        assert!(forwarder.dispatch(Vec::new(), AlertKind::RealTime).is_none());

        let handle = forwarder
            .dispatch(vec![breach(Parameter::Ph, 4.0)], AlertKind::RealTime)
            .unwrap();
        handle.await.unwrap();

        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let forwarder = AlertForwarder::new(Arc::new(Failing));
        forwarder
            .notify(&[breach(Parameter::DissolvedOxygen, 2.0)], AlertKind::RealTime)
            .await;
    }

    #[test]
    fn missing_credentials_disable_delivery() {
        let config = AlertsConfig {
            bot_token: String::new(),
            ..AlertsConfig::default()
        };
        let forwarder = AlertForwarder::from_config(&config).unwrap();
        assert!(!forwarder.is_enabled());

        let config = AlertsConfig {
            enabled: true,
            bot_token: "123:abc".into(),
            chat_id: "42".into(),
            ..AlertsConfig::default()
        };
        assert!(AlertForwarder::from_config(&config).unwrap().is_enabled());
    }
}

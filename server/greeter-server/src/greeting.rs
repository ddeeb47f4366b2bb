use chrono::{DateTime, SecondsFormat, Utc};

/// Event derived from one greeting request. Carries no key; its identity is
/// its rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreetingEvent {
    pub rendered_text: String,
    pub produced_at: DateTime<Utc>,
}

impl GreetingEvent {
    /// Render the event published for `name` at `produced_at`.
    ///
    /// `name` is used verbatim, including when empty.
    pub fn render(name: &str, produced_at: DateTime<Utc>) -> Self {
        let timestamp = produced_at.to_rfc3339_opts(SecondsFormat::Millis, true);
        Self {
            rendered_text: format!("Hello {name} from Service A at {timestamp}"),
            produced_at,
        }
    }

    pub fn now(name: &str) -> Self {
        Self::render(name, Utc::now())
    }
}

/// Reply returned by Service A once the event is acknowledged.
pub fn publisher_reply(name: &str) -> String {
    format!("Hello {name} from Service A")
}

/// Reply returned by Service B's echo endpoint.
pub fn echo_reply(name: &str) -> String {
    format!("Hello {name} from Service B")
}

//! Request-scoped call context and extraction of its log fields.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::ExtraFieldSpec;
use crate::log::Fields;

/// Values, deadline and cancellation scoped to one call (or one chain of
/// calls made on behalf of the same inbound request).
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    values: HashMap<String, Value>,
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Keeps the earlier of the existing deadline and `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }
}

/// Collects the extra log fields `extra` asks for out of `ctx`.
///
/// The field map (if configured and present as an object) is merged first,
/// then each named key whose value is a non-empty string. Anything missing or
/// of another type is skipped.
pub fn extract_fields(ctx: &CallContext, extra: &ExtraFieldSpec) -> Fields {
    let mut fields = Fields::new();
    append_fields(ctx, extra, &mut fields);
    fields
}

/// Same as `extract_fields`, writing into an existing record so later keys
/// overwrite earlier ones.
pub(crate) fn append_fields(ctx: &CallContext, extra: &ExtraFieldSpec, fields: &mut Fields) {
    if let Some(Value::Object(map)) = extra.field_map.as_deref().and_then(|key| ctx.value(key)) {
        for (key, value) in map {
            fields.insert(key.clone(), value.clone());
        }
    }
    for name in &extra.names {
        if let Some(Value::String(s)) = ctx.value(name) {
            if !s.is_empty() {
                fields.insert(name.clone(), Value::String(s.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wanted(names: &str, field_map: &str) -> ExtraFieldSpec {
        ExtraFieldSpec::parse(names, field_map)
    }

    #[test]
    fn copies_configured_string_values() {
        let ctx = CallContext::new().with_value("tenant", "acme").with_value("user", "bob");
        let fields = extract_fields(&ctx, &wanted("tenant", ""));
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["tenant"], "acme");
    }

    #[test]
    fn skips_missing_empty_and_non_string_values() {
        let ctx = CallContext::new()
            .with_value("empty", "")
            .with_value("count", 3)
            .with_value("flag", true);
        let fields = extract_fields(&ctx, &wanted("missing,empty,count,flag", ""));
        assert!(fields.is_empty());
    }

    #[test]
    fn merges_field_map_entries() {
        let ctx = CallContext::new().with_value(
            "log_fields",
            json!({ "region": "eu", "attempt": 2, "canary": false }),
        );
        let fields = extract_fields(&ctx, &wanted("", "log_fields"));
        assert_eq!(fields["region"], "eu");
        assert_eq!(fields["attempt"], 2);
        assert_eq!(fields["canary"], false);
    }

    #[test]
    fn field_map_of_wrong_type_is_ignored() {
        let ctx = CallContext::new().with_value("log_fields", "not a map");
        assert!(extract_fields(&ctx, &wanted("", "log_fields")).is_empty());
    }

    #[test]
    fn named_field_overwrites_field_map_entry() {
        let ctx = CallContext::new()
            .with_value("log_fields", json!({ "tenant": "from-map", "zone": "a" }))
            .with_value("tenant", "acme");
        let fields = extract_fields(&ctx, &wanted("tenant", "log_fields"));
        assert_eq!(fields["tenant"], "acme");
        assert_eq!(fields["zone"], "a");
    }

    #[test]
    fn append_overwrites_existing_record_keys() {
        let ctx = CallContext::new().with_value("tenant", "acme");
        let mut fields = Fields::new();
        fields.insert("tenant".to_string(), json!("stale"));
        fields.insert("duration".to_string(), json!(12));
        append_fields(&ctx, &wanted("tenant", ""), &mut fields);
        assert_eq!(fields["tenant"], "acme");
        assert_eq!(fields["duration"], 12);
    }

    #[tokio::test]
    async fn earlier_deadline_wins() {
        let now = Instant::now();
        let ctx = CallContext::new()
            .with_deadline(now + Duration::from_secs(10))
            .with_deadline(now + Duration::from_secs(1));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(1)));
        assert!(ctx.remaining().unwrap() <= Duration::from_secs(1));
    }

    #[test]
    fn remaining_is_zero_after_deadline() {
        let ctx = CallContext::new().with_deadline(Instant::now() - Duration::from_millis(5));
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }
}

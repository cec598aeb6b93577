//! Well-known typed facts carried on a request [`Context`].
//!
//! Each fact kind has a private key and three accessors:
//!
//! - `set_*` derives a new context carrying the value.
//! - `*` (e.g. [`device_id`]) returns `None` when the fact is absent. Use it
//!   whenever absence is a normal case at that stage.
//! - `must_*` (e.g. [`must_device_id`]) treats absence as a wiring defect and
//!   unwinds with a [`MissingFact`] payload naming the fact. A recovery point
//!   at the stage boundary turns that payload back into an error.

use std::any::Any;

use crate::canonical::DeviceId;
use crate::context::{Context, ContextKey};
use crate::convey::Convey;
use crate::logging::Logger;
use crate::secure::Token;

/// Sentinel carried by the unwind raised from a `must_*` accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum MissingFact {
    #[error("no logger present")]
    Logger,
    #[error("no device id present")]
    DeviceId,
    #[error("no convey payload present")]
    Convey,
    #[error("no token present")]
    Token,
}

impl MissingFact {
    /// Identify a caught panic payload raised by a `must_*` accessor.
    ///
    /// Returns `None` for any other panic.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Option<Self> {
        payload.downcast_ref::<Self>().copied()
    }
}

struct LoggerKey;
impl ContextKey for LoggerKey {
    type Value = Logger;
}

struct DeviceIdKey;
impl ContextKey for DeviceIdKey {
    type Value = DeviceId;
}

struct ConveyKey;
impl ContextKey for ConveyKey {
    type Value = Convey;
}

struct TokenKey;
impl ContextKey for TokenKey {
    type Value = Token;
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

/// Derives a context carrying the request logger.
#[must_use]
pub fn set_logger(ctx: &Context, logger: Logger) -> Context {
    ctx.with_value::<LoggerKey>(logger)
}

/// Returns the request logger, if one was set.
#[must_use]
pub fn logger(ctx: &Context) -> Option<&Logger> {
    ctx.value::<LoggerKey>()
}

/// Returns the request logger.
///
/// # Panics
///
/// Unwinds with [`MissingFact::Logger`] if no logger was set on this chain.
#[must_use]
pub fn must_logger(ctx: &Context) -> &Logger {
    match logger(ctx) {
        Some(logger) => logger,
        None => std::panic::panic_any(MissingFact::Logger),
    }
}

// ---------------------------------------------------------------------------
// DeviceId
// ---------------------------------------------------------------------------

/// Derives a context carrying the canonical device id.
#[must_use]
pub fn set_device_id(ctx: &Context, id: DeviceId) -> Context {
    ctx.with_value::<DeviceIdKey>(id)
}

/// Returns the canonical device id, if one was set.
#[must_use]
pub fn device_id(ctx: &Context) -> Option<&DeviceId> {
    ctx.value::<DeviceIdKey>()
}

/// Returns the canonical device id.
///
/// # Panics
///
/// Unwinds with [`MissingFact::DeviceId`] if no device id was set on this chain.
#[must_use]
pub fn must_device_id(ctx: &Context) -> &DeviceId {
    match device_id(ctx) {
        Some(id) => id,
        None => std::panic::panic_any(MissingFact::DeviceId),
    }
}

// ---------------------------------------------------------------------------
// Convey
// ---------------------------------------------------------------------------

/// Derives a context carrying the decoded convey payload.
#[must_use]
pub fn set_convey(ctx: &Context, payload: Convey) -> Context {
    ctx.with_value::<ConveyKey>(payload)
}

/// Returns the decoded convey payload, if one was set.
#[must_use]
pub fn convey(ctx: &Context) -> Option<&Convey> {
    ctx.value::<ConveyKey>()
}

/// Returns the decoded convey payload.
///
/// # Panics
///
/// Unwinds with [`MissingFact::Convey`] if no payload was set on this chain.
#[must_use]
pub fn must_convey(ctx: &Context) -> &Convey {
    match convey(ctx) {
        Some(payload) => payload,
        None => std::panic::panic_any(MissingFact::Convey),
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// Derives a context carrying the security token.
#[must_use]
pub fn set_token(ctx: &Context, token: Token) -> Context {
    ctx.with_value::<TokenKey>(token)
}

/// Returns the security token, if one was set.
#[must_use]
pub fn token(ctx: &Context) -> Option<&Token> {
    ctx.value::<TokenKey>()
}

/// Returns the request's security token.
///
/// # Panics
///
/// Unwinds with [`MissingFact::Token`] if no token was set on this chain.
#[must_use]
pub fn must_token(ctx: &Context) -> &Token {
    match token(ctx) {
        Some(token) => token,
        None => std::panic::panic_any(MissingFact::Token),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use proptest::prelude::*;

    use super::*;
    use crate::canonical::parse_id;
    use crate::convey::{parse_payload, Encoding};

    const CONVEY_PAYLOAD: &str = "eyAicGFyYW1ldGVycyI6IFsgeyAibmFtZSI6ICJEZXZpY2UuRGV2aWNlSW5mby5XZWJwYS5YX0NPTUNBU1QtQ09NX0NJRCIsICJ2YWx1ZSI6ICIwIiwgImRhdGFUeXBlIjogMCB9LCB7ICJuYW1lIjogIkRldmljZS5EZXZpY2VJbmZvLldlYnBhLlhfQ09NQ0FTVC1DT01fQ01DIiwgInZhbHVlIjogIjI2OSIsICJkYXRhVHlwZSI6IDIgfSBdIH0K";
    const BASIC_AUTH: &str = "Basic dXNlcjpwYXNzd29yZA==";

    /// Runs `f` and returns the `MissingFact` it unwound with, if any.
    fn missing<R>(f: impl FnOnce() -> R) -> Option<MissingFact> {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(_) => None,
            Err(payload) => Some(
                MissingFact::from_panic(payload.as_ref())
                    .expect("panic payload should be a MissingFact"),
            ),
        }
    }

    fn sample_device() -> DeviceId {
        parse_id("mac:111122223333").unwrap()
    }

    // ---- Logger ----

    #[test]
    fn logger_absent_then_present() {
        let ctx = Context::root();
        assert!(logger(&ctx).is_none());
        assert_eq!(missing(|| must_logger(&ctx).request_id().len()), Some(MissingFact::Logger));

        let ctx = set_logger(&ctx, Logger::for_request("req-1"));
        assert_eq!(logger(&ctx).map(Logger::request_id), Some("req-1"));
        assert_eq!(missing(|| must_logger(&ctx).request_id().len()), None);
        assert_eq!(must_logger(&ctx).request_id(), "req-1");
    }

    // ---- DeviceId ----

    #[test]
    fn device_id_absent_then_present() {
        let ctx = Context::root();
        assert!(device_id(&ctx).is_none());
        assert_eq!(missing(|| must_device_id(&ctx).as_str().len()), Some(MissingFact::DeviceId));

        let id = sample_device();
        let ctx = set_device_id(&ctx, id.clone());
        assert_eq!(device_id(&ctx), Some(&id));
        assert_eq!(must_device_id(&ctx), &id);
    }

    // ---- Convey ----

    #[test]
    fn convey_absent_then_present() {
        let ctx = Context::root();
        assert!(convey(&ctx).is_none());
        assert_eq!(missing(|| must_convey(&ctx).len()), Some(MissingFact::Convey));

        let payload = parse_payload(Encoding::Standard, CONVEY_PAYLOAD).unwrap();
        let ctx = set_convey(&ctx, payload.clone());
        assert_eq!(convey(&ctx), Some(&payload));
        assert_eq!(must_convey(&ctx), &payload);
    }

    // ---- Token ----

    #[test]
    fn token_absent_then_present() {
        let ctx = Context::root();
        assert!(token(&ctx).is_none());
        assert_eq!(missing(|| must_token(&ctx).value().len()), Some(MissingFact::Token));

        let parsed = Token::parse(BASIC_AUTH).unwrap();
        let ctx = set_token(&ctx, parsed.clone());
        assert_eq!(token(&ctx), Some(&parsed));
        assert_eq!(must_token(&ctx), &parsed);
    }

    // ---- Contract properties ----

    #[test]
    fn sentinels_are_pairwise_distinct() {
        let ctx = Context::root();
        let raised = [
            missing(|| must_logger(&ctx).request_id().len()),
            missing(|| must_device_id(&ctx).as_str().len()),
            missing(|| must_convey(&ctx).len()),
            missing(|| must_token(&ctx).value().len()),
        ];
        let expected = [
            Some(MissingFact::Logger),
            Some(MissingFact::DeviceId),
            Some(MissingFact::Convey),
            Some(MissingFact::Token),
        ];
        assert_eq!(raised, expected);

        for (i, a) in expected.iter().enumerate() {
            for b in &expected[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn sentinel_messages_name_the_fact() {
        assert_eq!(MissingFact::Logger.to_string(), "no logger present");
        assert_eq!(MissingFact::DeviceId.to_string(), "no device id present");
        assert_eq!(MissingFact::Convey.to_string(), "no convey payload present");
        assert_eq!(MissingFact::Token.to_string(), "no token present");
    }

    #[test]
    fn foreign_panic_is_not_a_missing_fact() {
        let payload = catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(MissingFact::from_panic(payload.as_ref()), None);
    }

    #[test]
    fn earlier_sibling_does_not_observe_later_set() {
        let parent = Context::root();
        let sibling = set_token(&parent, Token::parse(BASIC_AUTH).unwrap());
        let with_device = set_device_id(&parent, sample_device());

        assert!(device_id(&sibling).is_none());
        assert!(device_id(&parent).is_none());
        assert!(device_id(&with_device).is_some());
        assert!(token(&with_device).is_none());
    }

    #[test]
    fn last_write_wins_along_one_chain() {
        let first = parse_id("mac:111122223333").unwrap();
        let second = parse_id("mac:aabbccddeeff").unwrap();

        let ctx = set_device_id(&Context::root(), first.clone());
        let ctx2 = set_device_id(&ctx, second.clone());

        assert_eq!(device_id(&ctx2), Some(&second));
        assert_eq!(device_id(&ctx), Some(&first));
    }

    #[test]
    fn device_id_does_not_collide_with_other_facts() {
        let ctx = set_device_id(&Context::root(), sample_device());

        assert!(logger(&ctx).is_none());
        assert!(convey(&ctx).is_none());
        assert!(token(&ctx).is_none());
    }

    #[test]
    fn device_id_then_missing_logger() {
        let ctx = Context::root();
        let id = sample_device();
        let new_ctx = set_device_id(&ctx, id.clone());

        assert_eq!(device_id(&new_ctx), Some(&id));
        assert_eq!(id.as_str(), "mac:111122223333");
        assert_eq!(
            missing(|| must_logger(&new_ctx).request_id().len()),
            Some(MissingFact::Logger)
        );
    }

    #[test]
    fn all_facts_share_one_chain() {
        let ctx = Context::root();
        let ctx = set_logger(&ctx, Logger::for_request("req-2"));
        let ctx = set_token(&ctx, Token::parse(BASIC_AUTH).unwrap());
        let ctx = set_device_id(&ctx, sample_device());
        let ctx = set_convey(&ctx, parse_payload(Encoding::Standard, CONVEY_PAYLOAD).unwrap());

        assert_eq!(must_logger(&ctx).request_id(), "req-2");
        assert_eq!(must_token(&ctx).value(), "dXNlcjpwYXNzd29yZA==");
        assert_eq!(must_device_id(&ctx).as_str(), "mac:111122223333");
        assert!(must_convey(&ctx).get("parameters").is_some());
        assert_eq!(ctx.depth(), 4);
    }

    #[test]
    fn concurrent_readers_see_the_same_facts() {
        let ctx = set_device_id(&Context::root(), sample_device());

        std::thread::scope(|scope| {
            for n in 0..4 {
                let ctx = &ctx;
                scope.spawn(move || {
                    let derived = set_logger(ctx, Logger::for_request(format!("req-{n}")));
                    assert_eq!(must_device_id(&derived).as_str(), "mac:111122223333");
                    assert_eq!(must_logger(&derived).request_id(), format!("req-{n}"));
                    assert!(logger(ctx).is_none());
                });
            }
        });
    }

    proptest! {
        #[test]
        fn set_then_get_round_trips_any_mac(bytes in proptest::array::uniform6(any::<u8>())) {
            let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
            let id = parse_id(&format!("mac:{hex}")).unwrap();
            let ctx = set_device_id(&Context::root(), id.clone());
            prop_assert_eq!(device_id(&ctx), Some(&id));
            prop_assert!(token(&ctx).is_none());
        }

        #[test]
        fn set_then_get_round_trips_any_convey(key in "[a-z]{1,12}", value in any::<i64>()) {
            let mut map = serde_json::Map::new();
            map.insert(key.clone(), value.into());
            let json = serde_json::Value::Object(map).to_string();
            let payload = parse_payload(Encoding::Standard, &STANDARD.encode(json)).unwrap();
            let ctx = set_convey(&Context::root(), payload.clone());
            prop_assert_eq!(convey(&ctx), Some(&payload));
            prop_assert_eq!(
                must_convey(&ctx).get(&key).and_then(serde_json::Value::as_i64),
                Some(value)
            );
        }

        #[test]
        fn last_of_many_device_ids_wins(ids in proptest::collection::vec(any::<u64>(), 1..16)) {
            let mut ctx = Context::root();
            for n in &ids {
                let id = parse_id(&format!("serial:{n}")).unwrap();
                ctx = set_device_id(&ctx, id);
            }
            let last = format!("serial:{}", ids[ids.len() - 1]);
            prop_assert_eq!(must_device_id(&ctx).as_str(), last.as_str());
        }
    }
}

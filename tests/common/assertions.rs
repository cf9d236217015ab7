//! Domain-specific assertion macros for rptwatch harnesses.
//!
//! These wrap plain comparisons with failure messages that show the whole
//! event or notification, so a broken pattern is obvious from the output.

// ---------------------------------------------------------------------------
// Event assertions
// ---------------------------------------------------------------------------

/// Assert that a classified event has the expected kind.
///
/// ```rust
/// assert_kind!(event, EventKind::HostRunning);
/// ```
#[macro_export]
macro_rules! assert_kind {
    ($event:expr, $kind:expr) => {{
        let event: &rptwatch_core::LogEvent = &$event;
        let expected: rptwatch_core::EventKind = $kind;
        if event.kind != expected {
            panic!(
                "assert_kind! failed:\n  expected: {}\n  actual:   {}\n  event: {:?}",
                expected, event.kind, event
            );
        }
    }};
}

/// Assert that an event carries `field` with the expected value.
///
/// ```rust
/// assert_field!(event, "slot", 2i64);
/// assert_field!(event, "source", "N0CALL");
/// ```
#[macro_export]
macro_rules! assert_field {
    ($event:expr, $field:expr, $value:expr) => {{
        let event: &rptwatch_core::LogEvent = &$event;
        let field: &str = $field;
        let expected = rptwatch_core::FieldValue::from($value);
        match event.fields.get(field) {
            Some(actual) if *actual == expected => {}
            Some(actual) => panic!(
                "assert_field! failed:\n  event.fields[{:?}]\n  expected: {:?}\n  actual:   {:?}",
                field, expected, actual
            ),
            None => panic!(
                "assert_field! failed: field {:?} not found.\n  Available fields: {:?}",
                field,
                event.fields.keys().collect::<Vec<_>>()
            ),
        }
    }};
}

// ---------------------------------------------------------------------------
// Notification assertions
// ---------------------------------------------------------------------------

/// Assert that no notification in the slice is an error.
#[macro_export]
macro_rules! assert_no_errors {
    ($notes:expr) => {{
        let errors: Vec<String> = $notes
            .iter()
            .filter_map(|n| match n {
                rptwatch_core::Notification::Error(err) => Some(err.to_string()),
                _ => None,
            })
            .collect();
        if !errors.is_empty() {
            panic!("assert_no_errors! failed:\n  {}", errors.join("\n  "));
        }
    }};
}

/// Assert that the slice contains an error matching `$pattern`.
///
/// ```rust
/// assert_error!(notes, MonitorError::Read { .. });
/// ```
#[macro_export]
macro_rules! assert_error {
    ($notes:expr, $pattern:pat) => {{
        let found = $notes.iter().any(|n| match n {
            rptwatch_core::Notification::Error(err) => matches!(err.as_ref(), $pattern),
            _ => false,
        });
        if !found {
            panic!(
                "assert_error! failed: no error matching {}\n  notifications: {:?}",
                stringify!($pattern),
                $notes
            );
        }
    }};
}

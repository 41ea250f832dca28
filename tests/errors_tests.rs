use std::error::Error;

use hookdog::core::models::TaskStatus;
use hookdog::errors::HookError;

#[test]
fn test_hook_error_implements_error_trait() {
    fn assert_error<T: Error + Send + Sync + 'static>(_: &T) {}

    let error = HookError::Parse("test error".to_string());
    assert_error(&error);
}

#[test]
fn test_hook_error_display() {
    let error = HookError::Verification("bad signature".to_string());
    assert_eq!(format!("{error}"), "Webhook verification failed: bad signature");

    let error = HookError::Http("Connection error".to_string());
    assert_eq!(format!("{error}"), "Failed to send HTTP request: Connection error");

    let error = HookError::InvalidTransition {
        from: TaskStatus::Completed,
        to: TaskStatus::Processing,
    };
    assert_eq!(format!("{error}"), "Illegal task transition: completed -> processing");
}

#[test]
fn test_hook_error_from_conversions() {
    let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let err: HookError = json_err.into();
    assert!(matches!(err, HookError::Parse(_)));

    #[allow(unused)]
    #[allow(clippy::items_after_statements)]
    fn _check_reqwest_conversion(err: reqwest::Error) -> HookError {
        HookError::from(err)
    }
}

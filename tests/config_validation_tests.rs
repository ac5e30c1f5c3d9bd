//! Config Validation Tests
//!
//! Typo detection and range checks for `coach_config.toml`, exercised
//! independently from the rest of the pipeline.

use drive_coach::config::validation::{known_config_keys, suggest_correction, validate_unknown_keys};
use drive_coach::config::CoachConfig;

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_scheduler_key_warns_with_suggestion() {
    let toml_str = r#"
[scheduler]
max_windw = 10
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("max_windw"));
    assert_eq!(warnings[0].suggestion.as_deref(), Some("scheduler.max_windows"));
}

#[test]
fn unknown_section_warns() {
    let warnings = validate_unknown_keys("[telemetry]\nrate = 25\n");
    assert!(!warnings.is_empty());
    assert!(warnings.iter().any(|w| w.field.starts_with("telemetry")));
}

#[test]
fn complete_config_has_no_unknown_keys() {
    let toml_str = r#"
[data]
trips_root = "data/trips"

[store]
path = "./data/coach_store"

[scheduler]
max_windows = 15
tick_interval_secs = 10

[inference]
model_path = "models/coach.gguf"
use_stub = false
coach_substitutions = [["segment", "trip"]]
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());
    let config = CoachConfig::from_toml_str(toml_str).unwrap();
    assert_eq!(config.scheduler.max_windows, 15);
    assert_eq!(config.inference.coach_substitutions, vec![("segment".to_string(), "trip".to_string())]);
}

#[test]
fn far_off_key_gets_no_suggestion() {
    let known = known_config_keys();
    assert!(suggest_correction("inference.completely_unrelated", &known).is_none());
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn zero_window_cap_and_tick_warn() {
    let config = CoachConfig::from_toml_str(
        "[scheduler]\nmax_windows = 0\ntick_interval_secs = 0\n[inference]\nuse_stub = true\n",
    )
    .unwrap();
    let warnings = config.validate();
    assert!(warnings.iter().any(|w| w.field == "scheduler.max_windows"));
    assert!(warnings.iter().any(|w| w.field == "scheduler.tick_interval_secs"));
}

#[test]
fn stub_mode_needs_no_model() {
    let config = CoachConfig::from_toml_str("[inference]\nuse_stub = true\n").unwrap();
    assert!(!config.validate().iter().any(|w| w.field == "inference.model_path"));
}

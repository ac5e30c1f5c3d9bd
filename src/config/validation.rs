//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Unknown keys are found by walking the raw `toml::Value` tree before serde
//! deserialization. Warnings never break a config.

use std::collections::HashSet;

use super::CoachConfig;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Valid dotted key paths for `CoachConfig`.
///
/// Must be kept in step with the structs in `coach_config.rs`.
pub fn known_config_keys() -> HashSet<&'static str> {
    [
        "data",
        "data.trips_root",
        "store",
        "store.path",
        "scheduler",
        "scheduler.max_windows",
        "scheduler.tick_interval_secs",
        "inference",
        "inference.model_path",
        "inference.use_stub",
        "inference.coach_substitutions",
    ]
    .into_iter()
    .collect()
}

/// Collect every dotted key path in a TOML value tree.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Closest known key within edit distance 3. Ties resolve alphabetically.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut candidates: Vec<&str> = known.iter().copied().collect();
    candidates.sort_unstable();
    candidates
        .into_iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|&(_, d)| d <= 3)
        .min_by_key(|&(_, d)| d)
        .map(|(k, _)| k.to_string())
}

/// Warnings for every key in `raw_toml` that `CoachConfig` does not know.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new(); // parse errors are reported by serde
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            message: format!("Unknown config key '{key}'"),
            suggestion: suggest_correction(&key, &known),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

/// Check tunable values for settings that cannot work.
pub fn validate_ranges(config: &CoachConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut warn = |field: &str, message: String| {
        warnings.push(ValidationWarning { field: field.to_string(), message, suggestion: None });
    };

    if config.scheduler.max_windows == 0 {
        warn(
            "scheduler.max_windows",
            "scheduler.max_windows is 0; streaming sessions will have nothing to show".to_string(),
        );
    }
    if config.scheduler.tick_interval_secs == 0 {
        warn(
            "scheduler.tick_interval_secs",
            "scheduler.tick_interval_secs is 0; the stream view will tick as fast as it can".to_string(),
        );
    }
    if !config.inference.use_stub && config.inference.model_path.is_none() {
        warn(
            "inference.model_path",
            "no inference.model_path set and use_stub is false; a model must be supplied at startup"
                .to_string(),
        );
    }
    for (i, (from, _)) in config.inference.coach_substitutions.iter().enumerate() {
        if from.is_empty() {
            warn(
                "inference.coach_substitutions",
                format!("coach substitution #{i} has an empty pattern and will be skipped"),
            );
        }
    }
    if !config.data.trips_root.exists() {
        warn(
            "data.trips_root",
            format!("data.trips_root {} does not exist", config.data.trips_root.display()),
        );
    }

    warnings
}

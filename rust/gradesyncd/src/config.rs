use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a number greater than 0 (got {value:?})")]
    InvalidNumber { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub max_achievable: f64,
    pub default_target_grade: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            max_achievable: 100.0,
            default_target_grade: 85.0,
        }
    }
}

impl Config {
    /// Optional:
    /// - `GRADESYNC_WORKSPACE` (opened at startup when set)
    /// - `GRADESYNC_MAX_ACHIEVABLE` (default: 100)
    /// - `GRADESYNC_DEFAULT_TARGET` (default: 85)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let workspace = lookup("GRADESYNC_WORKSPACE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let max_achievable = positive_number(
            "GRADESYNC_MAX_ACHIEVABLE",
            lookup("GRADESYNC_MAX_ACHIEVABLE"),
            defaults.max_achievable,
        )?;
        let default_target_grade = positive_number(
            "GRADESYNC_DEFAULT_TARGET",
            lookup("GRADESYNC_DEFAULT_TARGET"),
            defaults.default_target_grade,
        )?;

        Ok(Self {
            workspace,
            max_achievable,
            default_target_grade,
        })
    }
}

fn positive_number(var: &'static str, raw: Option<String>, default: f64) -> Result<f64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(ConfigError::InvalidNumber { var, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = Config::from_lookup(lookup(&[])).expect("config");
        assert_eq!(cfg.workspace, None);
        assert_eq!(cfg.max_achievable, 100.0);
        assert_eq!(cfg.default_target_grade, 85.0);
    }

    #[test]
    fn reads_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("GRADESYNC_WORKSPACE", "/tmp/grades"),
            ("GRADESYNC_MAX_ACHIEVABLE", "110"),
            ("GRADESYNC_DEFAULT_TARGET", " 90 "),
        ]))
        .expect("config");
        assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/grades")));
        assert_eq!(cfg.max_achievable, 110.0);
        assert_eq!(cfg.default_target_grade, 90.0);
    }

    #[test]
    fn rejects_bad_numbers() {
        let res = Config::from_lookup(lookup(&[("GRADESYNC_MAX_ACHIEVABLE", "lots")]));
        assert!(matches!(
            res,
            Err(ConfigError::InvalidNumber {
                var: "GRADESYNC_MAX_ACHIEVABLE",
                ..
            })
        ));
        assert!(Config::from_lookup(lookup(&[("GRADESYNC_DEFAULT_TARGET", "-5")])).is_err());
    }
}

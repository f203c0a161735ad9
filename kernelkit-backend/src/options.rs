//! Typed option sets for compilation and command submission.
//!
//! Each target has a plain struct that callers fill in directly. A flat JSON
//! map can also be applied through [`Configurable::apply_options`]; keys the
//! target does not know, or values of the wrong type, are logged and skipped.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Why a single option was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    UnknownKey,
    WrongType(&'static str),
}

impl std::fmt::Display for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownKey => write!(f, "unknown key"),
            Self::WrongType(expected) => write!(f, "expected {}", expected),
        }
    }
}

/// An option set that accepts string-keyed values.
pub trait Configurable {
    /// Name used in log lines.
    const TARGET: &'static str;

    /// Applies one option. Must leave `self` untouched on rejection.
    fn set_option(&mut self, key: &str, value: &Value) -> Result<(), Rejected>;

    /// Applies every entry of `opts`, logging the ones that were skipped.
    fn apply_options(&mut self, opts: &Map<String, Value>) -> &mut Self
    where
        Self: Sized,
    {
        for (key, value) in opts {
            match self.set_option(key, value) {
                Ok(()) => log::debug!("set({}) {} <- {}", Self::TARGET, key, value),
                Err(reason) => {
                    log::error!("cannot set({}) {} <- {} ({})", Self::TARGET, key, value, reason)
                }
            }
        }
        self
    }
}

fn as_string(value: &Value) -> Result<String, Rejected> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or(Rejected::WrongType("string"))
}

fn as_bool(value: &Value) -> Result<bool, Rejected> {
    value.as_bool().ok_or(Rejected::WrongType("bool"))
}

/// Options used when compiling a library and building its pipelines.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    pub label: Option<String>,
    pub zero_initialize_workgroup_memory: bool,
    /// Values for `override` declarations in the kernel source.
    pub constants: HashMap<String, f64>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            label: None,
            zero_initialize_workgroup_memory: true,
            constants: HashMap::new(),
        }
    }
}

impl Configurable for CompileOptions {
    const TARGET: &'static str = "CompileOptions";

    fn set_option(&mut self, key: &str, value: &Value) -> Result<(), Rejected> {
        match key {
            "label" => self.label = Some(as_string(value)?),
            "zero_initialize_workgroup_memory" => {
                self.zero_initialize_workgroup_memory = as_bool(value)?
            }
            "constants" => {
                let table = value.as_object().ok_or(Rejected::WrongType("object"))?;
                let mut constants = HashMap::with_capacity(table.len());
                for (name, v) in table {
                    let v = v.as_f64().ok_or(Rejected::WrongType("number"))?;
                    constants.insert(name.clone(), v);
                }
                self.constants.extend(constants);
            }
            _ => return Err(Rejected::UnknownKey),
        }
        Ok(())
    }
}

/// Options for command encoders and compute passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueOptions {
    pub label: Option<String>,
    pub pass_label: Option<String>,
}

impl Configurable for QueueOptions {
    const TARGET: &'static str = "QueueOptions";

    fn set_option(&mut self, key: &str, value: &Value) -> Result<(), Rejected> {
        match key {
            "label" => self.label = Some(as_string(value)?),
            "pass_label" => self.pass_label = Some(as_string(value)?),
            _ => return Err(Rejected::UnknownKey),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use std::sync::Mutex;

    /// Keeps every error-level record so tests can look for skipped options.
    struct ErrorLog(Mutex<Vec<String>>);

    impl log::Log for ErrorLog {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            metadata.level() <= log::Level::Error
        }

        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                if let Ok(mut lines) = self.0.lock() {
                    lines.push(record.args().to_string());
                }
            }
        }

        fn flush(&self) {}
    }

    static ERRORS: ErrorLog = ErrorLog(Mutex::new(Vec::new()));

    fn error_lines() -> Vec<String> {
        if log::set_logger(&ERRORS).is_ok() {
            log::set_max_level(log::LevelFilter::Error);
        }
        ERRORS.0.lock().unwrap().clone()
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_unknown_key_is_only_logged() {
        error_lines();
        let mut opts = CompileOptions::default();
        assert_eq!(opts.set_option("fooBar", &json!(1)), Err(Rejected::UnknownKey));
        opts.apply_options(&map(json!({"fooBar": 1})));
        assert_eq!(opts, CompileOptions::default());
        assert!(error_lines()
            .iter()
            .any(|l| l == "cannot set(CompileOptions) fooBar <- 1 (unknown key)"));

        let mut queue = QueueOptions::default();
        queue.apply_options(&map(json!({"fooBar": 1})));
        assert_eq!(queue, QueueOptions::default());
    }

    #[test]
    fn test_known_keys_applied() {
        let mut opts = CompileOptions::default();
        opts.apply_options(&map(json!({
            "label": "fractal",
            "zero_initialize_workgroup_memory": false,
            "constants": {"iterations": 64}
        })));
        assert_eq!(opts.label.as_deref(), Some("fractal"));
        assert!(!opts.zero_initialize_workgroup_memory);
        assert_eq!(opts.constants.get("iterations"), Some(&64.0));
    }

    #[test]
    fn test_wrong_type_is_skipped() {
        let mut queue = QueueOptions::default();
        assert_eq!(
            queue.set_option("label", &json!(7)),
            Err(Rejected::WrongType("string"))
        );
        assert_eq!(queue.label, None);

        let mut opts = CompileOptions::default();
        assert!(opts
            .set_option("constants", &json!({"a": 1, "b": "x"}))
            .is_err());
        assert!(opts.constants.is_empty());
    }

    #[test]
    fn test_mixed_map_applies_good_entries() {
        let mut queue = QueueOptions::default();
        queue.apply_options(&map(json!({"label": "run", "retainedReferences": true})));
        assert_eq!(queue.label.as_deref(), Some("run"));
        assert_eq!(queue.pass_label, None);
    }
}

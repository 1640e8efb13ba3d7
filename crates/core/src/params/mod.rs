use std::{collections::HashMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

/// Names of the parameters a synthesis session reacts to.
pub mod names {
    pub const MIN_MAGNITUDE: &str = "minMagnitude";
    pub const MAX_MAGNITUDE: &str = "maxMagnitude";
    pub const AUDIO_FILE: &str = "audioFile";
    pub const PITCH: &str = "pitch";
    pub const PITCH_VAR: &str = "pitchVar";
}

/// Value carried by a parameter change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Choice(String),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Choice(_) => None,
        }
    }

    pub fn as_choice(&self) -> Option<&str> {
        match self {
            Self::Choice(label) => Some(label),
            Self::Number(_) => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Choice(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Choice(value)
    }
}

/// Callback bound to a parameter name. The optional index accompanies
/// enumerated choices.
pub type Listener = Arc<dyn Fn(&ParamValue, Option<usize>) + Send + Sync>;

/// Append-only registry of parameter listeners.
///
/// Publishing runs the listeners of one name synchronously, in registration
/// order, on the caller's thread.
#[derive(Default)]
pub struct ParameterRegistry {
    bindings: HashMap<String, Vec<Listener>>,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `listener` to `name`. Returns `false` if that same listener is
    /// already bound to the name.
    pub fn register(&mut self, name: impl Into<String>, listener: Listener) -> bool {
        let listeners = self.bindings.entry(name.into()).or_default();
        if listeners.iter().any(|bound| Arc::ptr_eq(bound, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Invokes every listener bound to `name` and returns how many ran.
    pub fn publish(
        &self,
        name: &str,
        value: impl Into<ParamValue>,
        aux_index: Option<usize>,
    ) -> usize {
        let value = value.into();
        let Some(listeners) = self.bindings.get(name) else {
            tracing::debug!(name, ?value, "no listeners bound to parameter");
            return 0;
        };

        tracing::debug!(name, ?value, aux_index, "publishing parameter");
        for listener in listeners {
            listener(&value, aux_index);
        }
        listeners.len()
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.bindings.get(name).map_or(0, Vec::len)
    }
}

impl fmt::Debug for ParameterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, listeners) in &self.bindings {
            map.entry(name, &listeners.len());
        }
        map.finish()
    }
}

//! Widgets: keyed, value-bearing units of script output and input.
//!
//! Cell bodies call the free functions below while a run is active. Each
//! call registers the widget in the session's widget store under a key that
//! is stable across reruns of the same call site, and input widgets return
//! the last value the client supplied for that key.
//!
//! # Example
//!
//! ```rust,ignore
//! use rill_core::widgets;
//!
//! let name = widgets::text_input("name", "world")?;
//! widgets::text(format!("Hello, {name}!"))?;
//! ```

use serde::{Deserialize, Serialize};

use crate::context;
use crate::error::{Error, Result};
use crate::store::WidgetState;

/// Widget kind tag used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WidgetKind {
    Text,
    TextInput,
    Slider,
    Checkbox,
}

/// Widget value that can be stored, diffed, and sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WidgetValue {
    /// Numeric value (sliders).
    Number(f64),
    /// String value (text display and input).
    Text(String),
    /// Boolean value (checkboxes).
    Bool(bool),
}

impl WidgetValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            WidgetValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            WidgetValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            WidgetValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// A value-bearing UI element identified by a key that is stable across
/// reruns of the same logical call site.
///
/// Key uniqueness is the caller's responsibility. Widgets of different
/// kinds share one key space; when two widgets collide on a key, the later
/// write silently wins.
#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    /// Display-only text. The key defaults to the displayed content.
    Text { key: String, value: String },
    /// Single-line text input. The key defaults to the label.
    TextInput {
        key: String,
        label: String,
        value: String,
    },
    /// Numeric slider. The key defaults to the label.
    Slider {
        key: String,
        label: String,
        min: f64,
        max: f64,
        value: f64,
    },
    /// Boolean checkbox. The key defaults to the label.
    Checkbox {
        key: String,
        label: String,
        value: bool,
    },
}

impl Widget {
    pub fn key(&self) -> &str {
        match self {
            Widget::Text { key, .. } => key,
            Widget::TextInput { key, .. } => key,
            Widget::Slider { key, .. } => key,
            Widget::Checkbox { key, .. } => key,
        }
    }

    pub fn kind(&self) -> WidgetKind {
        match self {
            Widget::Text { .. } => WidgetKind::Text,
            Widget::TextInput { .. } => WidgetKind::TextInput,
            Widget::Slider { .. } => WidgetKind::Slider,
            Widget::Checkbox { .. } => WidgetKind::Checkbox,
        }
    }

    pub fn value(&self) -> WidgetValue {
        match self {
            Widget::Text { value, .. } | Widget::TextInput { value, .. } => {
                WidgetValue::Text(value.clone())
            }
            Widget::Slider { value, .. } => WidgetValue::Number(*value),
            Widget::Checkbox { value, .. } => WidgetValue::Bool(*value),
        }
    }

    /// Replace the widget's value, coercing to its kind. Slider values are
    /// clamped to the widget's range. Returns `false` and leaves the widget
    /// untouched when the value's type does not fit.
    pub fn set_value(&mut self, new: &WidgetValue) -> bool {
        match (self, new) {
            (Widget::Text { value, .. }, WidgetValue::Text(s))
            | (Widget::TextInput { value, .. }, WidgetValue::Text(s)) => {
                *value = s.clone();
                true
            }
            (
                Widget::Slider {
                    min, max, value, ..
                },
                WidgetValue::Number(n),
            ) => {
                *value = n.clamp(*min, *max);
                true
            }
            (Widget::Checkbox { value, .. }, WidgetValue::Bool(b)) => {
                *value = *b;
                true
            }
            _ => false,
        }
    }

    /// Whether the widget carries user input (everything but plain text).
    /// Input widgets adopt the client-known value for their key on rerun.
    pub fn is_input(&self) -> bool {
        !matches!(self, Widget::Text { .. })
    }
}

// =============================================================================
// Emission API
// =============================================================================

/// Display a line of text. The key is derived from the content.
pub fn text(value: impl Into<String>) -> Result<()> {
    let value = value.into();
    register(Widget::Text {
        key: value.clone(),
        value,
    })?;
    Ok(())
}

/// Display text under an explicit key, stable across content changes.
pub fn text_keyed(key: impl Into<String>, value: impl Into<String>) -> Result<()> {
    register(Widget::Text {
        key: key.into(),
        value: value.into(),
    })?;
    Ok(())
}

/// Text input labeled `label`, keyed by the label. Returns the current
/// value: the client-supplied one if the key is known, `default` otherwise.
pub fn text_input(label: impl Into<String>, default: impl Into<String>) -> Result<String> {
    let label = label.into();
    text_input_keyed(label.clone(), label, default)
}

/// Text input with an explicit key.
pub fn text_input_keyed(
    key: impl Into<String>,
    label: impl Into<String>,
    default: impl Into<String>,
) -> Result<String> {
    let value = register(Widget::TextInput {
        key: key.into(),
        label: label.into(),
        value: default.into(),
    })?;
    Ok(value.as_str().unwrap_or_default().to_string())
}

/// Numeric slider keyed by its label. Returns the current value.
pub fn slider(label: impl Into<String>, min: f64, max: f64, default: f64) -> Result<f64> {
    let label = label.into();
    slider_keyed(label.clone(), label, min, max, default)
}

/// Numeric slider with an explicit key.
pub fn slider_keyed(
    key: impl Into<String>,
    label: impl Into<String>,
    min: f64,
    max: f64,
    default: f64,
) -> Result<f64> {
    let default = default.clamp(min, max);
    let value = register(Widget::Slider {
        key: key.into(),
        label: label.into(),
        min,
        max,
        value: default,
    })?;
    Ok(value.as_f64().unwrap_or(default))
}

/// Checkbox keyed by its label. Returns the current value.
pub fn checkbox(label: impl Into<String>, default: bool) -> Result<bool> {
    let label = label.into();
    checkbox_keyed(label.clone(), label, default)
}

/// Checkbox with an explicit key.
pub fn checkbox_keyed(
    key: impl Into<String>,
    label: impl Into<String>,
    default: bool,
) -> Result<bool> {
    let value = register(Widget::Checkbox {
        key: key.into(),
        label: label.into(),
        value: default,
    })?;
    Ok(value.as_bool().unwrap_or(default))
}

/// Register a widget with the run bound to the calling thread: adopt the
/// stored value for input widgets, bump the cell's output-slot index, and
/// publish the new state.
///
/// If the run's cancellation flag is already set, the last known value is
/// returned without registering state or emitting output, so a superseded
/// run cannot publish stale in-progress values.
fn register(mut widget: Widget) -> Result<WidgetValue> {
    context::with_current(|scope| {
        if widget.is_input() {
            if let Some(previous) = scope.session.store().get(widget.key()) {
                if !widget.set_value(&previous.widget.value()) {
                    tracing::debug!(
                        key = widget.key(),
                        "stored value has a different kind, keeping the default"
                    );
                }
            }
        }

        let widget_index = scope.next_slot();
        let value = widget.value();

        if scope.run.is_cancelled() {
            return Ok(value);
        }

        let (cell_id, cell_index) = scope.current_cell().ok_or(Error::NoActiveRun)?;
        let state = WidgetState::new(widget, cell_id, cell_index, widget_index);
        scope.session.store().put(state.clone());
        scope.session.callbacks().on_widget_published(&state);
        Ok(value)
    })?
}

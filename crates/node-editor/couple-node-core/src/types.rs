use serde::{Deserialize, Serialize};

pub type NodeId = u32;
pub type LinkId = u32;

/// Type tag carried by every dynamic region socket.
pub const COUPLE_REGION: &str = "COUPLE_REGION";

/// Type tag that accepts a connection of any type.
pub const ANY_TYPE: &str = "*";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputSocket {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkId>,
}

impl InputSocket {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        InputSocket {
            name: name.into(),
            ty: ty.into(),
            link: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputSocket {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl OutputSocket {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        OutputSocket {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// Range and granularity a number widget enforces on its own value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct NumberOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

impl NumberOptions {
    pub fn int_range(min: f64, max: f64) -> Self {
        NumberOptions {
            min: Some(min),
            max: Some(max),
            step: Some(1.0),
        }
    }

    /// Whether `value` lies inside the configured bounds.
    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    /// Snap `value` to the step grid (anchored at `min`), then clamp into range.
    pub fn constrain(&self, value: f64) -> f64 {
        let mut v = value;
        if let Some(step) = self.step.filter(|s| *s > 0.0) {
            let base = self.min.unwrap_or(0.0);
            v = base + ((v - base) / step).round() * step;
        }
        if let Some(min) = self.min {
            v = v.max(min);
        }
        if let Some(max) = self.max {
            v = v.min(max);
        }
        v
    }
}

/// What a button does when the user activates it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
    Reconcile,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WidgetKind {
    Number {
        value: f64,
        #[serde(default)]
        options: NumberOptions,
    },
    Combo {
        value: String,
        options: Vec<String>,
    },
    Toggle {
        value: bool,
    },
    Text {
        value: String,
    },
    Button {
        action: ButtonAction,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Widget {
    pub name: String,
    #[serde(flatten)]
    pub kind: WidgetKind,
}

impl Widget {
    pub fn number(name: impl Into<String>, value: f64, options: NumberOptions) -> Self {
        Widget {
            name: name.into(),
            kind: WidgetKind::Number {
                value: options.constrain(value),
                options,
            },
        }
    }

    pub fn combo(name: impl Into<String>, options: &[&str]) -> Self {
        Widget {
            name: name.into(),
            kind: WidgetKind::Combo {
                value: options.first().map(|s| s.to_string()).unwrap_or_default(),
                options: options.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    pub fn button(label: impl Into<String>, action: ButtonAction) -> Self {
        Widget {
            name: label.into(),
            kind: WidgetKind::Button { action },
        }
    }

    /// Current value of a number widget, `None` for every other kind.
    pub fn as_number(&self) -> Option<f64> {
        match self.kind {
            WidgetKind::Number { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn number_options(&self) -> Option<&NumberOptions> {
        match &self.kind {
            WidgetKind::Number { options, .. } => Some(options),
            _ => None,
        }
    }

    pub fn action(&self) -> Option<ButtonAction> {
        match self.kind {
            WidgetKind::Button { action } => Some(action),
            _ => None,
        }
    }

    /// Assign a JSON value the way the widget's own control would.
    ///
    /// Number widgets clamp and snap; combos only accept one of their options.
    /// Returns `false` (leaving the widget untouched) when the value does not fit.
    pub fn assign(&mut self, input: &serde_json::Value) -> bool {
        match &mut self.kind {
            WidgetKind::Number { value, options } => match input.as_f64() {
                Some(v) if v.is_finite() => {
                    *value = options.constrain(v);
                    true
                }
                _ => false,
            },
            WidgetKind::Combo { value, options } => match input.as_str() {
                Some(s) if options.iter().any(|o| o == s) => {
                    *value = s.to_string();
                    true
                }
                _ => false,
            },
            WidgetKind::Toggle { value } => match input.as_bool() {
                Some(b) => {
                    *value = b;
                    true
                }
                None => false,
            },
            WidgetKind::Text { value } => match input.as_str() {
                Some(s) => {
                    *value = s.to_string();
                    true
                }
                None => false,
            },
            WidgetKind::Button { .. } => false,
        }
    }
}

/// A live node as the editor holds it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub inputs: Vec<InputSocket>,
    #[serde(default)]
    pub outputs: Vec<OutputSocket>,
    #[serde(default)]
    pub widgets: Vec<Widget>,
    /// Type tag assigned to sockets the node's behavior creates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_type: Option<String>,
    /// Number of leading input sockets no behavior may add or remove.
    #[serde(default)]
    pub inputs_offset: usize,
}

impl Node {
    pub fn new(id: NodeId, type_name: impl Into<String>) -> Self {
        Node {
            id,
            type_name: type_name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            widgets: Vec::new(),
            socket_type: None,
            inputs_offset: 0,
        }
    }

    pub fn find_widget(&self, name: &str) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.name == name)
    }

    pub fn find_widget_mut(&mut self, name: &str) -> Option<&mut Widget> {
        self.widgets.iter_mut().find(|w| w.name == name)
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|s| s.name.as_str()).collect()
    }
}

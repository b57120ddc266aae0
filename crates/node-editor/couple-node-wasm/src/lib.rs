use couple_node_core::{
    schema, EditorError, Extension, ExtensionConfig, NodeDef, NodeEditor, ReconcileOutcome,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Bumped whenever the exported surface changes shape.
const ABI_VERSION: u32 = 1;

#[wasm_bindgen]
pub fn abi_version() -> u32 {
    ABI_VERSION
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[derive(Serialize)]
#[serde(tag = "kind", content = "count", rename_all = "lowercase")]
enum OutcomeJson {
    Unchanged,
    Added(usize),
    Removed(usize),
}

impl From<ReconcileOutcome> for OutcomeJson {
    fn from(out: ReconcileOutcome) -> Self {
        match out {
            ReconcileOutcome::Unchanged => OutcomeJson::Unchanged,
            ReconcileOutcome::Added(n) => OutcomeJson::Added(n),
            ReconcileOutcome::Removed(n) => OutcomeJson::Removed(n),
        }
    }
}

fn outcome_json(out: Result<ReconcileOutcome, EditorError>) -> Result<String, JsValue> {
    let out = out.map_err(js_err)?;
    serde_json::to_string(&OutcomeJson::from(out)).map_err(js_err)
}

/// Editor host living on the wasm side. The browser registers node types,
/// creates nodes and forwards button clicks; node state comes back as JSON.
#[wasm_bindgen]
pub struct WasmEditor {
    editor: NodeEditor,
}

#[wasm_bindgen]
impl WasmEditor {
    /// `config` may be `undefined`/`null`, a JSON string, or a plain object.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<WasmEditor, JsValue> {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        let cfg = if config.is_undefined() || config.is_null() {
            ExtensionConfig::default()
        } else if let Some(s) = config.as_string() {
            ExtensionConfig::from_json_str(&s).map_err(js_err)?
        } else {
            let cfg: ExtensionConfig = serde_wasm_bindgen::from_value(config).map_err(js_err)?;
            cfg.validate().map_err(js_err)?;
            cfg
        };
        Ok(WasmEditor {
            editor: NodeEditor::with_extension(&Extension::couple(&cfg)),
        })
    }

    /// Register one node type from its JSON definition; returns whether the
    /// extension attached its behavior to it.
    #[wasm_bindgen]
    pub fn register_node_def(&mut self, json: &str) -> Result<bool, JsValue> {
        let def: NodeDef = serde_json::from_str(json).map_err(js_err)?;
        Ok(self.editor.register_node_def(def))
    }

    /// Register the built-in couple node types. Returns how many were claimed.
    #[wasm_bindgen]
    pub fn register_builtin_defs(&mut self) -> usize {
        self.editor.register_node_defs(schema::catalog())
    }

    #[wasm_bindgen]
    pub fn create_node(&mut self, type_name: &str) -> Result<u32, JsValue> {
        self.editor.create_node(type_name).map_err(js_err)
    }

    #[wasm_bindgen]
    pub fn remove_node(&mut self, node: u32) -> Result<(), JsValue> {
        self.editor.remove_node(node).map(|_| ()).map_err(js_err)
    }

    #[wasm_bindgen]
    pub fn connect(
        &mut self,
        origin: u32,
        origin_slot: usize,
        target: u32,
        target_slot: usize,
    ) -> Result<u32, JsValue> {
        self.editor
            .connect(origin, origin_slot, target, target_slot)
            .map_err(js_err)
    }

    #[wasm_bindgen]
    pub fn set_widget_value(&mut self, node: u32, name: &str, value: JsValue) -> Result<(), JsValue> {
        let value: serde_json::Value = serde_wasm_bindgen::from_value(value).map_err(js_err)?;
        self.editor
            .set_widget_value(node, name, &value)
            .map_err(js_err)
    }

    /// Click a button widget. Returns `{"kind": "added"|"removed"|"unchanged", "count": n}`.
    #[wasm_bindgen]
    pub fn activate_widget(&mut self, node: u32, name: &str) -> Result<String, JsValue> {
        outcome_json(self.editor.activate_widget(node, name))
    }

    #[wasm_bindgen]
    pub fn reconcile(&mut self, node: u32) -> Result<String, JsValue> {
        outcome_json(self.editor.reconcile(node))
    }

    #[wasm_bindgen]
    pub fn node_json(&self, node: u32) -> Result<String, JsValue> {
        let n = self
            .editor
            .node(node)
            .ok_or_else(|| js_err(EditorError::UnknownNode(node)))?;
        serde_json::to_string(n).map_err(js_err)
    }

    #[wasm_bindgen]
    pub fn snapshot_json(&self) -> Result<String, JsValue> {
        self.editor.snapshot_json().map_err(js_err)
    }

    #[wasm_bindgen]
    pub fn load_snapshot_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.editor.load_snapshot_json(json).map_err(js_err)
    }
}

/// Expose the built-in node definitions as JSON for tooling/UI.
#[wasm_bindgen]
pub fn get_node_defs_json() -> Result<String, JsValue> {
    schema::catalog_json().map_err(js_err)
}

use serde::{Deserialize, Serialize};

use crate::types::{NumberOptions, Widget, COUPLE_REGION};

/// Largest image side the couple nodes accept.
pub const MAX_RESOLUTION: f64 = 16384.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// Node type metadata the host hands over when a type is registered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeDef {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub inputs: Vec<InputDef>,
    #[serde(default)]
    pub widgets: Vec<Widget>,
    #[serde(default)]
    pub outputs: Vec<OutputDef>,
}

// Helpers
fn input(name: &str, ty: &str) -> InputDef {
    InputDef {
        name: name.to_string(),
        ty: ty.to_string(),
    }
}

fn output(name: &str, ty: &str) -> OutputDef {
    OutputDef {
        name: name.to_string(),
        ty: ty.to_string(),
    }
}

fn def(name: &str, inputs: Vec<InputDef>, widgets: Vec<Widget>, outputs: Vec<OutputDef>) -> NodeDef {
    NodeDef {
        name: name.to_string(),
        display_name: name.to_string(),
        category: "loaders".to_string(),
        inputs,
        widgets,
        outputs,
    }
}

fn dimension(name: &str) -> Widget {
    Widget::number(
        name,
        512.0,
        NumberOptions {
            min: Some(16.0),
            max: Some(MAX_RESOLUTION),
            step: Some(8.0),
        },
    )
}

/// Node types shipped by the region-coupling package.
pub fn catalog() -> Vec<NodeDef> {
    vec![
        def(
            "Comfy Couple",
            vec![
                input("model", "MODEL"),
                input("positive_1", "CONDITIONING"),
                input("positive_2", "CONDITIONING"),
                input("negative", "CONDITIONING"),
            ],
            vec![
                Widget::combo("orientation", &["horizontal", "vertical"]),
                Widget::number(
                    "center",
                    0.5,
                    NumberOptions {
                        min: Some(0.0),
                        max: Some(1.0),
                        step: Some(0.01),
                    },
                ),
                dimension("width"),
                dimension("height"),
            ],
            vec![
                output("MODEL", "MODEL"),
                output("CONDITIONING", "CONDITIONING"),
                output("CONDITIONING", "CONDITIONING"),
            ],
        ),
        // The two declared regions are the reference regions; `inputcount`
        // counts the ones added on top of them.
        def(
            "ComfyCoupleMask",
            vec![input("region_1", COUPLE_REGION), input("region_2", COUPLE_REGION)],
            vec![Widget::number(
                "inputcount",
                0.0,
                NumberOptions::int_range(0.0, 1000.0),
            )],
            vec![
                output("model", "MODEL"),
                output("positive", "CONDITIONING"),
                output("negative", "CONDITIONING"),
            ],
        ),
        def(
            "ComfyCoupleRegion",
            vec![input("positive", "CONDITIONING"), input("mask", "MASK")],
            vec![],
            vec![output("COUPLE_REGION", COUPLE_REGION)],
        ),
    ]
}

pub fn find_def(name: &str) -> Option<NodeDef> {
    catalog().into_iter().find(|d| d.name == name)
}

pub fn catalog_json() -> Result<String, serde_json::Error> {
    serde_json::to_string(&catalog())
}

//! Adapter-neutral modal model.
//!
//! Managers build a [`Modal`] out of [`Block`]s; the chat adapter translates it
//! into its own wire format. Only the handful of widgets the booking flows need
//! are modelled.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modal {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit: Option<String>,
    pub close: String,
    pub blocks: Vec<Block>,
}

impl Modal {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            submit: None,
            close: "Close".to_string(),
            blocks: Vec::new(),
        }
    }

    pub fn submit(mut self, label: impl Into<String>) -> Self {
        self.submit = Some(label.into());
        self
    }

    pub fn close(mut self, label: impl Into<String>) -> Self {
        self.close = label.into();
        self
    }

    pub fn block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn blocks(mut self, blocks: impl IntoIterator<Item = Block>) -> Self {
        self.blocks.extend(blocks);
        self
    }

    /// Every interactive element in the modal, in order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.blocks.iter().flat_map(|block| match block {
            Block::Section { accessory, .. } => accessory.iter().collect::<Vec<_>>(),
            Block::Actions { elements, .. } => elements.iter().collect(),
            Block::Input { element, .. } => vec![element],
            _ => Vec::new(),
        })
    }

    /// All text shown in headers, sections and context lines.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                Block::Header { text } | Block::Section { text, .. } | Block::Context { text } => {
                    Some(text.as_str())
                }
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header {
        text: String,
    },
    Section {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        accessory: Option<Element>,
    },
    Actions {
        #[serde(rename = "blockId")]
        block_id: String,
        elements: Vec<Element>,
    },
    Input {
        #[serde(rename = "blockId")]
        block_id: String,
        label: String,
        element: Element,
        #[serde(default)]
        optional: bool,
    },
    Context {
        text: String,
    },
    Divider,
}

impl Block {
    pub fn header(text: impl Into<String>) -> Self {
        Self::Header { text: text.into() }
    }

    pub fn section(text: impl Into<String>) -> Self {
        Self::Section {
            text: text.into(),
            accessory: None,
        }
    }

    pub fn section_with(text: impl Into<String>, accessory: Element) -> Self {
        Self::Section {
            text: text.into(),
            accessory: Some(accessory),
        }
    }

    pub fn context(text: impl Into<String>) -> Self {
        Self::Context { text: text.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOption {
    pub text: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(text: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Element {
    Button {
        action_id: String,
        text: String,
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        style: Option<ButtonStyle>,
    },
    StaticSelect {
        action_id: String,
        placeholder: String,
        options: Vec<SelectOption>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_option: Option<SelectOption>,
    },
    DatePicker {
        action_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_date: Option<String>,
    },
    PlainTextInput {
        action_id: String,
        #[serde(default)]
        multiline: bool,
    },
}

impl Element {
    pub fn button(action_id: &str, text: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Button {
            action_id: action_id.to_string(),
            text: text.into(),
            value: value.into(),
            style: None,
        }
    }

    pub fn styled(self, style: ButtonStyle) -> Self {
        match self {
            Self::Button {
                action_id,
                text,
                value,
                ..
            } => Self::Button {
                action_id,
                text,
                value,
                style: Some(style),
            },
            other => other,
        }
    }

    pub fn action_id(&self) -> &str {
        match self {
            Self::Button { action_id, .. }
            | Self::StaticSelect { action_id, .. }
            | Self::DatePicker { action_id, .. }
            | Self::PlainTextInput { action_id, .. } => action_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elements_are_collected_across_blocks() {
        let modal = Modal::new("Parking")
            .block(Block::header("Parking"))
            .block(Block::section_with(
                "1st floor 10",
                Element::button("reserveSpace", "Reserve", "1st floor 10"),
            ))
            .block(Block::Actions {
                block_id: "filters".into(),
                elements: vec![Element::DatePicker {
                    action_id: "releaseStartDate".into(),
                    initial_date: None,
                }],
            })
            .block(Block::Divider);

        let ids: Vec<&str> = modal.elements().map(Element::action_id).collect();
        assert_eq!(ids, vec!["reserveSpace", "releaseStartDate"]);
        assert_eq!(modal.text(), "Parking\n1st floor 10");
    }

    #[test]
    fn wire_shape_is_tagged() {
        let button = Element::button("releaseSpace", "Release", "1st floor 10").styled(ButtonStyle::Danger);
        let json = serde_json::to_value(&button).unwrap();
        assert_eq!(json["type"], "button");
        assert_eq!(json["actionId"], "releaseSpace");
        assert_eq!(json["style"], "danger");
    }
}

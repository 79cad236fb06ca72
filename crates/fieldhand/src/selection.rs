// ABOUTME: Selection session: the interactive "pick an element for this field" mode.
// ABOUTME: Idle -> Selecting -> Idle, driven by pointer and key input, emitting pick or cancel events.

//! Element picking.
//!
//! While a session is selecting, pointer input is captured: moves retarget
//! the highlight overlay and clicks are consumed so the host page never sees
//! them. A click ends the session with an [`Event::ElementSelected`]; Escape
//! ends it with [`Event::SelectionCancelled`].

use ego_tree::NodeId;
use scraper::ElementRef;
use tracing::debug;

use crate::dom::selector::synthesize_selector;
use crate::dom::Page;
use crate::events::Event;
use crate::extractors::text::extract_text;
use crate::options::DEFAULT_SAMPLE_LENGTH;

/// Overlay label shown when the session has no field label.
pub const DEFAULT_OVERLAY_LABEL: &str = "Select an element";

/// Key name that cancels a session.
pub const CANCEL_KEY: &str = "Escape";

/// Input delivered by the page while it is being scraped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageInput {
    PointerMove { target: NodeId },
    Click { target: NodeId },
    /// `key` follows DOM `KeyboardEvent.key` naming.
    KeyDown { key: String },
}

impl PageInput {
    pub fn escape() -> Self {
        PageInput::KeyDown {
            key: CANCEL_KEY.to_string(),
        }
    }
}

/// Whether the host page should still see an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Continue,
    Suppressed,
}

/// Outcome of handing one input to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub propagation: Propagation,
    pub event: Option<Event>,
}

impl Dispatch {
    fn pass() -> Self {
        Self {
            propagation: Propagation::Continue,
            event: None,
        }
    }

    fn consumed(event: Option<Event>) -> Self {
        Self {
            propagation: Propagation::Suppressed,
            event,
        }
    }
}

/// Highlight box that follows the element under the pointer.
///
/// Geometry is left to whoever renders the page; the overlay only tracks
/// which element it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    pub label: String,
    pub target: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SelectionState {
    #[default]
    Idle,
    Selecting {
        field_label: String,
        overlay: Overlay,
    },
}

#[derive(Debug, Clone)]
pub struct SelectionSession {
    state: SelectionState,
    sample_length: usize,
}

impl Default for SelectionSession {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_LENGTH)
    }
}

impl SelectionSession {
    pub fn new(sample_length: usize) -> Self {
        Self {
            state: SelectionState::Idle,
            sample_length,
        }
    }

    /// Enters Selecting for `field_label`. A session already selecting is replaced.
    pub fn start(&mut self, field_label: impl Into<String>) {
        let field_label = field_label.into();
        let label = if field_label.trim().is_empty() {
            DEFAULT_OVERLAY_LABEL.to_string()
        } else {
            field_label.clone()
        };
        debug!(field = %field_label, "selection started");
        self.state = SelectionState::Selecting {
            field_label,
            overlay: Overlay {
                label,
                target: None,
            },
        };
    }

    /// Returns to Idle without emitting anything.
    pub fn stop(&mut self) {
        self.state = SelectionState::Idle;
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SelectionState::Selecting { .. })
    }

    pub fn field_label(&self) -> Option<&str> {
        match &self.state {
            SelectionState::Selecting { field_label, .. } => Some(field_label),
            SelectionState::Idle => None,
        }
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        match &self.state {
            SelectionState::Selecting { overlay, .. } => Some(overlay),
            SelectionState::Idle => None,
        }
    }

    /// Feeds one page input through the session.
    pub fn handle(&mut self, page: &Page, input: &PageInput) -> Dispatch {
        let SelectionState::Selecting {
            field_label,
            overlay,
        } = &mut self.state
        else {
            return Dispatch::pass();
        };

        match input {
            PageInput::PointerMove { target } => {
                overlay.target = nearest_element(page, *target).map(|el| el.id());
                Dispatch::consumed(None)
            }
            PageInput::Click { target } => {
                let Some(element) = nearest_element(page, *target) else {
                    return Dispatch::consumed(None);
                };
                let selector = synthesize_selector(page.document(), element);
                let sample_value: String = extract_text(page.styles(), Some(element))
                    .chars()
                    .take(self.sample_length)
                    .collect();
                let field = std::mem::take(field_label);
                self.state = SelectionState::Idle;
                debug!(%field, %selector, "element selected");
                Dispatch::consumed(Some(Event::ElementSelected {
                    field,
                    selector,
                    sample_value,
                }))
            }
            PageInput::KeyDown { key } if key == CANCEL_KEY => {
                self.state = SelectionState::Idle;
                debug!("selection cancelled");
                Dispatch {
                    propagation: Propagation::Continue,
                    event: Some(Event::SelectionCancelled),
                }
            }
            PageInput::KeyDown { .. } => Dispatch::pass(),
        }
    }
}

/// The element itself, or the closest element ancestor of a text node.
fn nearest_element(page: &Page, id: NodeId) -> Option<ElementRef<'_>> {
    let node = page.document().tree.get(id)?;
    std::iter::once(node)
        .chain(node.ancestors())
        .find_map(ElementRef::wrap)
}

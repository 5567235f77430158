//! In-memory editing state for a form: the ordered field instances the user
//! has dropped, reordered and edited before the form is compiled.

use std::fmt;

use serde_json::Value;
use shared::{
    compiler::{self, FieldDraft, ValidationError},
    domain::{FieldType, FormSchema},
};
use tracing::debug;

use crate::palette::{self, PaletteEntryId};

/// Identity of a field instance on the canvas. `seq` comes from a per-canvas
/// counter and is never handed out twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanvasId {
    pub source: FieldType,
    pub seq: u64,
}

impl fmt::Display for CanvasId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "canvas:{}-{}", self.source.slug(), self.seq)
    }
}

/// Anything the user can pick up: a palette template or a placed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DragId {
    Palette(PaletteEntryId),
    Canvas(CanvasId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropIndicator {
    #[default]
    End,
    Index(usize),
}

/// What a drag was released over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropZone {
    Canvas,
    Item(DragId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDraftConfig {
    pub name: Option<String>,
    pub is_required: bool,
    pub configuration: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanvasFieldInstance {
    pub id: CanvasId,
    pub field_type: FieldType,
    pub label: String,
    pub draft: FieldDraftConfig,
}

impl CanvasFieldInstance {
    fn to_draft(&self) -> FieldDraft {
        FieldDraft {
            name: self.draft.name.clone(),
            label: self.label.clone(),
            field_type: self.field_type,
            is_required: self.draft.is_required,
            configuration: self.draft.configuration.clone(),
        }
    }
}

/// Partial edit of a field. `name: Some(None)` clears an explicit name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPatch {
    pub label: Option<String>,
    pub name: Option<Option<String>>,
    pub is_required: Option<bool>,
    pub configuration: Option<Value>,
}

impl FieldPatch {
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    Insert {
        entry: PaletteEntryId,
        drop: DropIndicator,
    },
    Reorder {
        active: CanvasId,
        over: CanvasId,
    },
    Select(Option<CanvasId>),
    Update {
        id: CanvasId,
        patch: FieldPatch,
    },
    Remove(CanvasId),
    DragEnd {
        active: DragId,
        over: Option<DropZone>,
    },
}

impl Gesture {
    /// Selection alone is not worth an undo step.
    pub fn is_undoable(&self) -> bool {
        !matches!(self, Gesture::Select(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Inserted(CanvasId),
    Changed,
    Unchanged,
}

impl Outcome {
    pub fn changed(self) -> bool {
        !matches!(self, Outcome::Unchanged)
    }
}

impl From<bool> for Outcome {
    fn from(changed: bool) -> Self {
        if changed {
            Outcome::Changed
        } else {
            Outcome::Unchanged
        }
    }
}

/// Field list and selection, without the id counter.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasSnapshot {
    fields: Vec<CanvasFieldInstance>,
    selected: Option<CanvasId>,
}

impl CanvasSnapshot {
    pub fn fields(&self) -> &[CanvasFieldInstance] {
        &self.fields
    }
}

/// Where the last reorder landed, so repeating it is a no-op.
#[derive(Debug, Clone, Copy)]
struct SettledMove {
    active: CanvasId,
    over: CanvasId,
    landed_at: usize,
}

#[derive(Debug, Default)]
pub struct Canvas {
    fields: Vec<CanvasFieldInstance>,
    selected: Option<CanvasId>,
    next_seq: u64,
    settled: Option<SettledMove>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[CanvasFieldInstance] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, id: CanvasId) -> Option<&CanvasFieldInstance> {
        self.fields.iter().find(|field| field.id == id)
    }

    pub fn index_of(&self, id: CanvasId) -> Option<usize> {
        self.fields.iter().position(|field| field.id == id)
    }

    pub fn selected(&self) -> Option<CanvasId> {
        self.selected
    }

    pub fn selected_field(&self) -> Option<&CanvasFieldInstance> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn insert_from_palette(&mut self, entry: PaletteEntryId, drop: DropIndicator) -> CanvasId {
        let entry = palette::entry(entry);
        let id = CanvasId {
            source: entry.field_type,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        let instance = CanvasFieldInstance {
            id,
            field_type: entry.field_type,
            label: entry.default_label.to_string(),
            draft: FieldDraftConfig {
                name: None,
                is_required: false,
                configuration: entry.default_configuration(),
            },
        };
        let at = match drop {
            DropIndicator::End => self.fields.len(),
            DropIndicator::Index(index) => index.min(self.fields.len()),
        };
        self.fields.insert(at, instance);
        self.settled = None;
        debug!(%id, at, "field inserted");
        id
    }

    /// Moves `active` to the index `over` occupies. Returns whether anything moved.
    pub fn reorder(&mut self, active: CanvasId, over: CanvasId) -> bool {
        if active == over {
            return false;
        }
        let (Some(from), Some(to)) = (self.index_of(active), self.index_of(over)) else {
            return false;
        };
        if let Some(settled) = self.settled {
            if settled.active == active && settled.over == over && settled.landed_at == from {
                return false;
            }
        }

        let moved = self.fields.remove(from);
        self.fields.insert(to, moved);
        self.settled = Some(SettledMove {
            active,
            over,
            landed_at: to,
        });
        debug!(%active, from, to, "field moved");
        true
    }

    /// Unknown ids clear the selection.
    pub fn select(&mut self, id: Option<CanvasId>) -> bool {
        let next = id.filter(|id| self.index_of(*id).is_some());
        let changed = self.selected != next;
        self.selected = next;
        changed
    }

    pub fn update_field(&mut self, id: CanvasId, patch: FieldPatch) -> bool {
        let Some(field) = self.fields.iter_mut().find(|field| field.id == id) else {
            return false;
        };
        let before = field.clone();
        if let Some(label) = patch.label {
            field.label = label;
        }
        if let Some(name) = patch.name {
            field.draft.name = name;
        }
        if let Some(is_required) = patch.is_required {
            field.draft.is_required = is_required;
        }
        if let Some(configuration) = patch.configuration {
            field.draft.configuration = configuration;
        }
        *field != before
    }

    pub fn remove(&mut self, id: CanvasId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.fields.remove(index);
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.settled = None;
        true
    }

    /// Resolves a finished drag into an insert, a reorder, or nothing.
    pub fn handle_drag_end(&mut self, active: DragId, over: Option<DropZone>) -> Outcome {
        match (active, over) {
            (DragId::Palette(entry), Some(DropZone::Canvas)) => {
                Outcome::Inserted(self.insert_from_palette(entry, DropIndicator::End))
            }
            (DragId::Palette(entry), Some(DropZone::Item(DragId::Canvas(target)))) => {
                match self.index_of(target) {
                    Some(index) => {
                        Outcome::Inserted(self.insert_from_palette(entry, DropIndicator::Index(index)))
                    }
                    None => Outcome::Unchanged,
                }
            }
            (DragId::Canvas(active), Some(DropZone::Item(DragId::Canvas(target)))) => {
                self.reorder(active, target).into()
            }
            _ => Outcome::Unchanged,
        }
    }

    pub fn apply(&mut self, gesture: Gesture) -> Outcome {
        match gesture {
            Gesture::Insert { entry, drop } => Outcome::Inserted(self.insert_from_palette(entry, drop)),
            Gesture::Reorder { active, over } => self.reorder(active, over).into(),
            Gesture::Select(id) => self.select(id).into(),
            Gesture::Update { id, patch } => self.update_field(id, patch).into(),
            Gesture::Remove(id) => self.remove(id).into(),
            Gesture::DragEnd { active, over } => self.handle_drag_end(active, over),
        }
    }

    pub fn snapshot(&self) -> CanvasSnapshot {
        CanvasSnapshot {
            fields: self.fields.clone(),
            selected: self.selected,
        }
    }

    /// Replaces the field list and selection. The id counter keeps counting.
    pub fn restore(&mut self, snapshot: CanvasSnapshot) {
        self.fields = snapshot.fields;
        self.selected = snapshot.selected;
        self.settled = None;
    }

    pub fn drafts(&self) -> Vec<FieldDraft> {
        self.fields.iter().map(CanvasFieldInstance::to_draft).collect()
    }

    pub fn compile(
        &self,
        form_name: &str,
        display_name: &str,
        description: Option<&str>,
    ) -> Result<FormSchema, ValidationError> {
        compiler::compile(&self.drafts(), form_name, display_name, description)
    }
}

#[cfg(test)]
#[path = "tests/canvas_tests.rs"]
mod tests;

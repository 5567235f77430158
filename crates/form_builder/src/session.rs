//! One user's editing session: a canvas plus the form-level metadata and an
//! undo history.

use std::collections::VecDeque;

use shared::{
    compiler::ValidationError, domain::FormSchema, protocol::CreateFormRequest,
};

use crate::canvas::{Canvas, CanvasSnapshot, Gesture, Outcome};

pub const DEFAULT_UNDO_DEPTH: usize = 50;

#[derive(Debug)]
pub struct EditorSession {
    canvas: Canvas,
    pub form_name: String,
    pub display_name: String,
    pub description: Option<String>,
    history: VecDeque<CanvasSnapshot>,
    undo_depth: usize,
}

impl EditorSession {
    pub fn new(form_name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            canvas: Canvas::new(),
            form_name: form_name.into(),
            display_name: display_name.into(),
            description: None,
            history: VecDeque::new(),
            undo_depth: DEFAULT_UNDO_DEPTH,
        }
    }

    pub fn with_undo_depth(mut self, depth: usize) -> Self {
        self.undo_depth = depth;
        self.trim_history();
        self
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn apply(&mut self, gesture: Gesture) -> Outcome {
        let before = gesture.is_undoable().then(|| self.canvas.snapshot());
        let outcome = self.canvas.apply(gesture);
        if let (Some(snapshot), true) = (before, outcome.changed()) {
            self.history.push_back(snapshot);
            self.trim_history();
        }
        outcome
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    /// Rolls the canvas back one gesture. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.pop_back() {
            Some(snapshot) => {
                self.canvas.restore(snapshot);
                true
            }
            None => false,
        }
    }

    pub fn compile(&self) -> Result<FormSchema, ValidationError> {
        self.canvas.compile(
            &self.form_name,
            &self.display_name,
            self.description.as_deref(),
        )
    }

    /// Compiles locally first so invalid forms never reach the server.
    pub fn build_request(&self) -> Result<CreateFormRequest, ValidationError> {
        self.compile()
            .map(|schema| CreateFormRequest::from_schema(&schema))
    }

    fn trim_history(&mut self) {
        while self.history.len() > self.undo_depth {
            self.history.pop_front();
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;

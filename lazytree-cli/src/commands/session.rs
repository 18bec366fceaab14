//! Synthetic debugger session.
//!
//! The session is a fixed-shape tree: threads at the top, stack frames under
//! each thread, variables under each frame, and `nesting` levels of fields
//! under each variable. Every answer is delayed to stand in for a round trip
//! to a debug target; sibling indices stagger the delay so answers arrive out
//! of order.

use std::time::Duration;

use futures::future::BoxFuture;
use lazytree::update::ColumnLabel;
use lazytree::{Element, ElementFilter, ElementModel, LabelData, TreePath, UpdateError};

/// Fields under each variable level.
const FIELDS_PER_VARIABLE: usize = 2;

/// Shape and latency of a synthetic session.
#[derive(Debug, Clone)]
pub struct SessionShape {
    pub threads: usize,
    pub frames: usize,
    pub variables: usize,
    pub nesting: usize,
    pub delay: Duration,
}

/// The debug target the simulation talks to.
#[derive(Debug)]
pub struct DebugSession {
    shape: SessionShape,
}

impl DebugSession {
    pub fn new(shape: SessionShape) -> Self {
        Self { shape }
    }

    /// Number of children of an element at `depth` (the root is depth 0).
    fn count_at(&self, depth: usize) -> usize {
        match depth {
            0 => self.shape.threads,
            1 => self.shape.frames,
            2 => self.shape.variables,
            d if d < 3 + self.shape.nesting => FIELDS_PER_VARIABLE,
            _ => 0,
        }
    }

    fn child_name(depth: usize, index: usize) -> String {
        match depth {
            0 => format!("thread-{}", index),
            1 => format!("frame-{}", index),
            2 => format!("var-{}", index),
            _ => format!("field-{}", index),
        }
    }

    /// Delay of one answer: the base delay, stretched for every third sibling.
    fn latency(&self, path: &TreePath) -> Duration {
        let index = path
            .last_segment()
            .and_then(|element| element.name().rsplit('-').next())
            .and_then(|suffix| suffix.parse::<u32>().ok())
            .unwrap_or(0);
        self.shape.delay * (1 + index % 3)
    }

    /// A stable pseudo value for a variable.
    fn value_of(path: &TreePath) -> String {
        let seed = path
            .to_string()
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
        format!("0x{:04x}", seed & 0xffff)
    }
}

impl ElementModel for DebugSession {
    fn child_count<'a>(&'a self, path: &'a TreePath) -> BoxFuture<'a, Result<usize, UpdateError>> {
        Box::pin(async move {
            tokio::time::sleep(self.latency(path)).await;
            Ok(self.count_at(path.len()))
        })
    }

    fn children<'a>(
        &'a self,
        path: &'a TreePath,
        offset: usize,
        length: usize,
    ) -> BoxFuture<'a, Result<Vec<Element>, UpdateError>> {
        Box::pin(async move {
            tokio::time::sleep(self.latency(path)).await;
            let depth = path.len();
            let end = (offset + length).min(self.count_at(depth));
            Ok((offset..end)
                .map(|index| Element::new(Self::child_name(depth, index)))
                .collect())
        })
    }

    fn label<'a>(&'a self, path: &'a TreePath) -> BoxFuture<'a, Result<LabelData, UpdateError>> {
        Box::pin(async move {
            tokio::time::sleep(self.shape.delay).await;
            let name = path
                .last_segment()
                .map(|element| element.name().to_string())
                .unwrap_or_default();
            let mut label = LabelData::text(name);
            if path.len() >= 3 {
                label.columns.push(ColumnLabel {
                    text: Some(Self::value_of(path)),
                    ..ColumnLabel::default()
                });
            }
            Ok(label)
        })
    }
}

/// Hides elements whose name matches one of the given names.
#[derive(Debug)]
pub struct HideNames {
    names: Vec<String>,
}

impl HideNames {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }
}

impl ElementFilter for HideNames {
    fn select(&self, _parent: &TreePath, element: &Element) -> bool {
        !self.names.iter().any(|name| name == element.name())
    }
}

//! Shared fixtures for the integration tests.
//!
//! [`ScriptedProvider`] answers from a fixed tree, either synchronously
//! inside the provider call or when the test says so. [`RecordingDisplay`]
//! logs every display hook and keeps the rows each parent shows.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use lazytree::update::{ChildCountUpdate, ChildrenUpdate, HasChildrenUpdate};
use lazytree::{
    Element, ElementContentProvider, ElementFilter, LabelData, TreeDisplay, TreeModelViewer,
    TreePath, UpdateError, UpdateKind, UpdateRequest, ViewerConfig, ViewerUpdate,
    ViewerUpdateListener,
};

// ============================================================================
// Paths
// ============================================================================

pub fn path(names: &[&str]) -> TreePath {
    TreePath::from_names(names.iter().copied())
}

pub fn root() -> TreePath {
    TreePath::root()
}

// ============================================================================
// Scripted Provider
// ============================================================================

/// One provider call as the provider saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub kind: UpdateKind,
    pub paths: Vec<TreePath>,
}

enum Held {
    HasChildren(Arc<HasChildrenUpdate>),
    ChildCount(Arc<ChildCountUpdate>),
    Children(Arc<ChildrenUpdate>),
}

impl Held {
    fn kind(&self) -> UpdateKind {
        match self {
            Self::HasChildren(_) => UpdateKind::HasChildren,
            Self::ChildCount(_) => UpdateKind::ChildCount,
            Self::Children(_) => UpdateKind::Children,
        }
    }

    fn path(&self) -> &TreePath {
        match self {
            Self::HasChildren(update) => update.element_path(),
            Self::ChildCount(update) => update.element_path(),
            Self::Children(update) => update.element_path(),
        }
    }
}

/// Content provider backed by a fixed tree.
///
/// Paths missing from the tree have no children.
pub struct ScriptedProvider {
    tree: Mutex<HashMap<TreePath, Vec<String>>>,
    hold: AtomicBool,
    held: Mutex<Vec<Held>>,
    failing: Mutex<HashSet<TreePath>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedProvider {
    /// Creates a provider answering inside each call.
    pub fn new(tree: &[(&[&str], &[&str])]) -> Arc<Self> {
        let tree = tree
            .iter()
            .map(|(parent, children)| {
                (
                    path(parent),
                    children.iter().map(|name| name.to_string()).collect(),
                )
            })
            .collect();
        Arc::new(Self {
            tree: Mutex::new(tree),
            hold: AtomicBool::new(false),
            held: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Holds requests until [`answer_matching`](Self::answer_matching) is called.
    pub fn holding(self: Arc<Self>) -> Arc<Self> {
        self.hold.store(true, Ordering::Release);
        self
    }

    pub fn set_children(&self, parent: &[&str], children: &[&str]) {
        self.tree.lock().insert(
            path(parent),
            children.iter().map(|name| name.to_string()).collect(),
        );
    }

    /// Fails every request targeting `path` until cleared.
    pub fn fail(&self, path: TreePath) {
        self.failing.lock().insert(path);
    }

    pub fn clear_failures(&self) {
        self.failing.lock().clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn calls_of(&self, kind: UpdateKind) -> Vec<Call> {
        self.calls().into_iter().filter(|call| call.kind == kind).collect()
    }

    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }

    /// Answers the held requests `matches` accepts; returns how many.
    pub fn answer_matching(&self, matches: impl Fn(UpdateKind, &TreePath) -> bool) -> usize {
        let ready: Vec<Held> = {
            let mut held = self.held.lock();
            let (ready, keep): (Vec<Held>, Vec<Held>) = held
                .drain(..)
                .partition(|update| matches(update.kind(), update.path()));
            *held = keep;
            ready
        };
        let answered = ready.len();
        for update in ready {
            self.answer(update);
        }
        answered
    }

    /// Cancels held requests of `kind` at `path` without answering them.
    pub fn cancel_held(&self, kind: UpdateKind, path: &TreePath) -> usize {
        let held = self.held.lock();
        let mut canceled = 0;
        for update in held.iter().filter(|u| u.kind() == kind && u.path() == path) {
            match update {
                Held::HasChildren(update) => update.cancel(),
                Held::ChildCount(update) => update.cancel(),
                Held::Children(update) => update.cancel(),
            }
            canceled += 1;
        }
        canceled
    }

    pub fn answer_all(&self) -> usize {
        self.answer_matching(|_, _| true)
    }

    fn children_of(&self, path: &TreePath) -> Vec<String> {
        self.tree.lock().get(path).cloned().unwrap_or_default()
    }

    fn failure(&self, path: &TreePath) -> Option<UpdateError> {
        self.failing
            .lock()
            .contains(path)
            .then(|| UpdateError::provider(format!("{path} unavailable")))
    }

    fn answer(&self, held: Held) {
        match held {
            Held::HasChildren(update) => {
                if !update.is_canceled() {
                    match self.failure(update.element_path()) {
                        Some(e) => update.set_error(e),
                        None => update
                            .set_has_children(!self.children_of(update.element_path()).is_empty()),
                    }
                }
                update.done();
            }
            Held::ChildCount(update) => {
                if !update.is_canceled() {
                    match self.failure(update.element_path()) {
                        Some(e) => update.set_error(e),
                        None => update.set_child_count(self.children_of(update.element_path()).len()),
                    }
                }
                update.done();
            }
            Held::Children(update) => {
                if !update.is_canceled() {
                    match self.failure(update.element_path()) {
                        Some(e) => update.set_error(e),
                        None => {
                            let range = update.range();
                            let children = self.children_of(update.element_path());
                            for (index, name) in children
                                .iter()
                                .enumerate()
                                .skip(range.offset)
                                .take(range.length)
                            {
                                if let Err(e) = update.set_child(Element::new(name), index) {
                                    update.set_error(e);
                                    break;
                                }
                            }
                        }
                    }
                }
                update.done();
            }
        }
    }

    fn receive(&self, kind: UpdateKind, updates: Vec<Held>) {
        self.calls.lock().push(Call {
            kind,
            paths: updates.iter().map(|update| update.path().clone()).collect(),
        });
        if self.hold.load(Ordering::Acquire) {
            self.held.lock().extend(updates);
            return;
        }
        for update in updates {
            self.answer(update);
        }
    }
}

impl ElementContentProvider for ScriptedProvider {
    fn update_has_children(&self, updates: Vec<Arc<HasChildrenUpdate>>) {
        self.receive(
            UpdateKind::HasChildren,
            updates.into_iter().map(Held::HasChildren).collect(),
        );
    }

    fn update_child_count(&self, updates: Vec<Arc<ChildCountUpdate>>) {
        self.receive(
            UpdateKind::ChildCount,
            updates.into_iter().map(Held::ChildCount).collect(),
        );
    }

    fn update_children(&self, updates: Vec<Arc<ChildrenUpdate>>) {
        self.receive(
            UpdateKind::Children,
            updates.into_iter().map(Held::Children).collect(),
        );
    }
}

// ============================================================================
// Recording Display
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Insert(TreePath, String, usize),
    Remove(TreePath, usize),
    Replace(TreePath, String, usize),
    ChildCount(TreePath, usize),
    HasChildren(TreePath, bool),
    Label(TreePath, String),
    AutoExpand(TreePath),
}

#[derive(Default)]
pub struct DisplayLog {
    pub ops: Vec<Op>,
    pub rows: HashMap<TreePath, Vec<Option<String>>>,
}

/// Display that records its hooks; clones share the log.
#[derive(Clone, Default)]
pub struct RecordingDisplay {
    log: Arc<Mutex<DisplayLog>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.log.lock().ops.clone()
    }

    pub fn op_count(&self) -> usize {
        self.log.lock().ops.len()
    }

    /// Names shown under `parent`; unfilled rows are `None`.
    pub fn rows(&self, parent: &TreePath) -> Vec<Option<String>> {
        self.log.lock().rows.get(parent).cloned().unwrap_or_default()
    }

    /// Names shown under `parent`, if every row is filled.
    pub fn names(&self, parent: &TreePath) -> Vec<String> {
        self.rows(parent).into_iter().flatten().collect()
    }
}

impl TreeDisplay for RecordingDisplay {
    fn insert(&mut self, parent: &TreePath, element: &Element, index: usize) {
        let mut log = self.log.lock();
        log.ops
            .push(Op::Insert(parent.clone(), element.name().to_string(), index));
        let rows = log.rows.entry(parent.clone()).or_default();
        let index = index.min(rows.len());
        rows.insert(index, Some(element.name().to_string()));
    }

    fn remove(&mut self, parent: &TreePath, index: usize) {
        let mut log = self.log.lock();
        log.ops.push(Op::Remove(parent.clone(), index));
        let rows = log.rows.entry(parent.clone()).or_default();
        if index < rows.len() {
            rows.remove(index);
        }
    }

    fn replace(&mut self, parent: &TreePath, element: &Element, index: usize) {
        let mut log = self.log.lock();
        log.ops
            .push(Op::Replace(parent.clone(), element.name().to_string(), index));
        let rows = log.rows.entry(parent.clone()).or_default();
        if rows.len() <= index {
            rows.resize(index + 1, None);
        }
        rows[index] = Some(element.name().to_string());
    }

    fn set_child_count(&mut self, path: &TreePath, count: usize) {
        let mut log = self.log.lock();
        log.ops.push(Op::ChildCount(path.clone(), count));
        log.rows.entry(path.clone()).or_default().resize(count, None);
    }

    fn set_has_children(&mut self, path: &TreePath, has_children: bool) {
        self.log
            .lock()
            .ops
            .push(Op::HasChildren(path.clone(), has_children));
    }

    fn set_label(&mut self, path: &TreePath, label: &LabelData) {
        let text = label.primary_text().unwrap_or_default().to_string();
        self.log.lock().ops.push(Op::Label(path.clone(), text));
    }

    fn auto_expand(&mut self, path: &TreePath) {
        self.log.lock().ops.push(Op::AutoExpand(path.clone()));
    }
}

// ============================================================================
// Filters and Listeners
// ============================================================================

/// Hides the named children of the root.
pub struct HideAtRoot(pub Vec<&'static str>);

impl ElementFilter for HideAtRoot {
    fn select(&self, _parent: &TreePath, element: &Element) -> bool {
        !self.0.iter().any(|name| *name == element.name())
    }

    fn is_applicable(&self, parent: &TreePath) -> bool {
        parent.is_root()
    }
}

/// Hides one named root child while switched on.
pub struct ToggleFilter {
    pub name: &'static str,
    pub enabled: AtomicBool,
}

impl ToggleFilter {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            enabled: AtomicBool::new(false),
        })
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}

impl ElementFilter for ToggleFilter {
    fn select(&self, _parent: &TreePath, element: &Element) -> bool {
        !(self.enabled.load(Ordering::Acquire) && element.name() == self.name)
    }

    fn is_applicable(&self, parent: &TreePath) -> bool {
        parent.is_root()
    }
}

/// Counts listener callbacks.
#[derive(Default)]
pub struct CountingListener {
    pub begins: AtomicUsize,
    pub completes: AtomicUsize,
    pub started: AtomicUsize,
    pub finished: AtomicUsize,
}

impl ViewerUpdateListener for CountingListener {
    fn updates_begin(&self) {
        self.begins.fetch_add(1, Ordering::SeqCst);
    }

    fn updates_complete(&self) {
        self.completes.fetch_add(1, Ordering::SeqCst);
    }

    fn update_started(&self, _update: &UpdateRequest) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn update_complete(&self, _update: &UpdateRequest) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Viewer Helpers
// ============================================================================

pub fn viewer(
    provider: &Arc<ScriptedProvider>,
    display: &RecordingDisplay,
    config: ViewerConfig,
) -> TreeModelViewer {
    let content: Arc<dyn ElementContentProvider> = provider.clone();
    TreeModelViewer::new(
        Arc::new(lazytree::UniformAdapters::new(content)),
        Box::new(display.clone()),
        config,
    )
}

/// Runs display jobs and held answers until neither produces more work.
pub fn settle(viewer: &mut TreeModelViewer, provider: &ScriptedProvider) {
    loop {
        let jobs = viewer.process_display_queue();
        let answered = if provider.hold.load(Ordering::Acquire) {
            0
        } else {
            provider.answer_all()
        };
        if jobs == 0 && answered == 0 {
            break;
        }
    }
}

/// Runs display jobs, answering held requests that match, until quiet.
pub fn settle_answering(
    viewer: &mut TreeModelViewer,
    provider: &ScriptedProvider,
    matches: impl Fn(UpdateKind, &TreePath) -> bool,
) {
    loop {
        let jobs = viewer.process_display_queue();
        let answered = provider.answer_matching(&matches);
        if jobs == 0 && answered == 0 {
            break;
        }
    }
}

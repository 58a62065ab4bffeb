//! Element arena, parent links and the active element stack.
//!
//! Elements live in an arena owned by [`ElementTree`] and refer to each other
//! through [`ElementId`]s. Parent links are plain ids, so a child always knows
//! its single owner and full ids can be recomputed at any time. The stack
//! holds the path from the root to the element currently being worked on:
//! every entry above the bottom is a child of the entry below it, except for
//! temporary elements which may sit on top of anything.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::error::EngineError;
use crate::exec::Executable;
use crate::handler::{Capability, Handler, HandlerRef};
use crate::node;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub enum ElementKind {
    /// Ordered children.
    List { children: Vec<ElementId> },
    /// A primary child and an optional secondary child.
    Compound {
        primary: Option<ElementId>,
        secondary: Option<ElementId>,
    },
    /// A runnable task.
    Leaf { executable: Arc<dyn Executable> },
}

impl ElementKind {
    fn id_prefix(&self) -> &'static str {
        match self {
            ElementKind::List { .. } => "list",
            ElementKind::Compound { .. } => "compound",
            ElementKind::Leaf { .. } => "exec",
        }
    }
}

pub(crate) struct HandlerSlot {
    local_id: String,
    /// `None` while the handler is lent out to a dispatch.
    handler: Option<Handler>,
}

pub struct Element {
    local_id: String,
    parent: Option<ElementId>,
    kind: ElementKind,
    handlers: Vec<HandlerSlot>,
    properties: BTreeMap<String, Value>,
    executed: bool,
    temporary: bool,
    /// The local id was drawn at random and may be redrawn on a clash.
    generated: bool,
}

impl Element {
    fn new(requested: &str, kind: ElementKind) -> Self {
        Self {
            local_id: node::local_id_or_generated(requested, kind.id_prefix()),
            generated: requested.trim().is_empty(),
            parent: None,
            kind,
            handlers: Vec::new(),
            properties: BTreeMap::new(),
            executed: false,
            temporary: false,
        }
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, ElementKind::Leaf { .. })
    }

    pub fn executable(&self) -> Option<&Arc<dyn Executable>> {
        match &self.kind {
            ElementKind::Leaf { executable } => Some(executable),
            _ => None,
        }
    }

    /// Whether this leaf ran since it was last initialized.
    pub fn executed(&self) -> bool {
        self.executed
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

#[derive(Default)]
pub struct ElementTree {
    nodes: Vec<Option<Element>>,
    free: Vec<usize>,
    root: Option<ElementId>,
    stack: Vec<ElementId>,
}

impl ElementTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_list(&mut self, local_id: &str) -> ElementId {
        self.alloc(Element::new(
            local_id,
            ElementKind::List {
                children: Vec::new(),
            },
        ))
    }

    pub fn add_compound(&mut self, local_id: &str) -> ElementId {
        self.alloc(Element::new(
            local_id,
            ElementKind::Compound {
                primary: None,
                secondary: None,
            },
        ))
    }

    /// Add a leaf. A blank `local_id` falls back to the executable's own id.
    pub fn add_leaf(&mut self, local_id: &str, executable: Arc<dyn Executable>) -> ElementId {
        let requested = if local_id.trim().is_empty() {
            executable.local_id().to_string()
        } else {
            local_id.to_string()
        };
        self.alloc(Element::new(&requested, ElementKind::Leaf { executable }))
    }

    /// Add a parentless leaf that may be pushed on top of any element and is
    /// released from the arena when popped.
    pub fn add_temporary_leaf(&mut self, executable: Arc<dyn Executable>) -> ElementId {
        let id = self.add_leaf("", executable);
        if let Some(element) = self.get_mut(id) {
            element.temporary = true;
        }
        id
    }

    fn alloc(&mut self, element: Element) -> ElementId {
        match self.free.pop() {
            Some(index) => {
                self.nodes[index] = Some(element);
                ElementId(index)
            }
            None => {
                self.nodes.push(Some(element));
                ElementId(self.nodes.len() - 1)
            }
        }
    }

    fn release(&mut self, id: ElementId) {
        if let Some(slot) = self.nodes.get_mut(id.0) {
            if slot.take().is_some() {
                self.free.push(id.0);
            }
        }
    }

    pub fn set_root(&mut self, id: ElementId) -> Result<(), EngineError> {
        let element = self.element(id)?;
        if element.parent.is_some() || element.temporary {
            return Err(EngineError::InvalidTree(format!(
                "{} cannot be the root: it has a parent or is temporary",
                element.local_id
            )));
        }
        self.root = Some(id);
        Ok(())
    }

    pub fn root(&self) -> Option<ElementId> {
        self.root
    }

    /// Append `child` to a list element, detaching it from any previous parent.
    /// Siblings must have distinct local ids.
    pub fn append_child(&mut self, parent: ElementId, child: ElementId) -> Result<(), EngineError> {
        self.check_adoptable(parent, child)?;
        if !matches!(self.element(parent)?.kind, ElementKind::List { .. }) {
            return Err(EngineError::InvalidTree(format!(
                "{} is not a list element",
                self.full_id(parent)
            )));
        }
        self.claim_sibling_id(parent, child, None)?;
        self.detach(child);
        if let Some(ElementKind::List { children }) = self.get_mut(parent).map(|e| &mut e.kind) {
            children.push(child);
        }
        self.set_parent(child, parent);
        Ok(())
    }

    pub fn set_primary(&mut self, compound: ElementId, child: ElementId) -> Result<(), EngineError> {
        self.set_compound_member(compound, child, true)
    }

    pub fn set_secondary(&mut self, compound: ElementId, child: ElementId) -> Result<(), EngineError> {
        self.set_compound_member(compound, child, false)
    }

    fn set_compound_member(
        &mut self,
        compound: ElementId,
        child: ElementId,
        primary: bool,
    ) -> Result<(), EngineError> {
        self.check_adoptable(compound, child)?;
        if !matches!(self.element(compound)?.kind, ElementKind::Compound { .. }) {
            return Err(EngineError::InvalidTree(format!(
                "{} is not a compound element",
                self.full_id(compound)
            )));
        }
        let replaced = if primary {
            self.primary(compound)
        } else {
            self.secondary(compound)
        };
        self.claim_sibling_id(compound, child, replaced)?;
        self.detach(child);
        let displaced = match self.get_mut(compound).map(|e| &mut e.kind) {
            Some(ElementKind::Compound {
                primary: slot, ..
            }) if primary => slot.replace(child),
            Some(ElementKind::Compound {
                secondary: slot, ..
            }) => slot.replace(child),
            _ => None,
        };
        if let Some(old) = displaced {
            if let Some(element) = self.get_mut(old) {
                element.parent = None;
            }
        }
        self.set_parent(child, compound);
        Ok(())
    }

    fn check_adoptable(&self, parent: ElementId, child: ElementId) -> Result<(), EngineError> {
        let child_element = self.element(child)?;
        self.element(parent)?;
        if child_element.temporary {
            return Err(EngineError::InvalidTree(
                "temporary elements cannot be adopted".to_string(),
            ));
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(EngineError::InvalidTree(format!(
                "adopting {} under {} would create a cycle",
                self.full_id(child),
                self.full_id(parent)
            )));
        }
        if self.stack.contains(&child) {
            return Err(EngineError::InvalidTree(format!(
                "{} is on the active stack",
                self.full_id(child)
            )));
        }
        Ok(())
    }

    /// Make sure `child` will not share a local id with the other children of
    /// `parent`, leaving out `replaced`. A clashing generated id is redrawn,
    /// an explicit one is rejected.
    fn claim_sibling_id(
        &mut self,
        parent: ElementId,
        child: ElementId,
        replaced: Option<ElementId>,
    ) -> Result<(), EngineError> {
        let taken: BTreeSet<String> = self
            .children(parent)
            .into_iter()
            .filter(|&c| c != child && Some(c) != replaced)
            .filter_map(|c| self.get(c).map(|e| e.local_id.clone()))
            .collect();
        let element = self.element(child)?;
        if !taken.contains(&element.local_id) {
            return Ok(());
        }
        if !element.generated {
            return Err(EngineError::InvalidTree(format!(
                "{} already has a child named {}",
                self.full_id(parent),
                element.local_id
            )));
        }
        let prefix = element.kind.id_prefix();
        let local_id = unused_id(prefix, |id| taken.contains(id));
        if let Some(element) = self.get_mut(child) {
            element.local_id = local_id;
        }
        Ok(())
    }

    fn is_ancestor(&self, candidate: ElementId, of: ElementId) -> bool {
        let mut current = self.get(of).and_then(|e| e.parent);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.get(id).and_then(|e| e.parent);
        }
        false
    }

    fn detach(&mut self, child: ElementId) {
        let Some(old_parent) = self.get(child).and_then(|e| e.parent) else {
            return;
        };
        if let Some(parent) = self.get_mut(old_parent) {
            match &mut parent.kind {
                ElementKind::List { children } => children.retain(|c| *c != child),
                ElementKind::Compound { primary, secondary } => {
                    if *primary == Some(child) {
                        *primary = None;
                    }
                    if *secondary == Some(child) {
                        *secondary = None;
                    }
                }
                ElementKind::Leaf { .. } => {}
            }
        }
        if self.root == Some(child) {
            self.root = None;
        }
        if let Some(element) = self.get_mut(child) {
            element.parent = None;
        }
    }

    fn set_parent(&mut self, child: ElementId, parent: ElementId) {
        if self.root == Some(child) {
            self.root = None;
        }
        if let Some(element) = self.get_mut(child) {
            element.parent = Some(parent);
        }
    }

    /// Attach a handler with a generated local id.
    pub fn attach(
        &mut self,
        element: ElementId,
        handler: impl Into<Handler>,
    ) -> Result<HandlerRef, EngineError> {
        self.attach_named(element, "", handler)
    }

    pub fn attach_named(
        &mut self,
        element: ElementId,
        local_id: &str,
        handler: impl Into<Handler>,
    ) -> Result<HandlerRef, EngineError> {
        let handler = handler.into();
        let target = self.element(element)?;
        if handler.requires_compound() && !matches!(target.kind, ElementKind::Compound { .. }) {
            return Err(EngineError::InvalidTree(format!(
                "{} handler needs a compound element, {} is not one",
                handler.default_prefix(),
                self.full_id(element)
            )));
        }
        let taken: BTreeSet<&str> = target.handlers.iter().map(|slot| slot.local_id.as_str()).collect();
        let local_id = if local_id.trim().is_empty() {
            unused_id(handler.default_prefix(), |id| taken.contains(id))
        } else if taken.contains(local_id.trim()) {
            return Err(EngineError::InvalidTree(format!(
                "{} already has a handler named {}",
                self.full_id(element),
                local_id.trim()
            )));
        } else {
            local_id.trim().to_string()
        };
        let Some(target) = self.get_mut(element) else {
            return Err(EngineError::UnknownElement(element));
        };
        target.handlers.push(HandlerSlot {
            local_id,
            handler: Some(handler),
        });
        Ok(HandlerRef {
            element,
            index: target.handlers.len() - 1,
        })
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn element(&self, id: ElementId) -> Result<&Element, EngineError> {
        self.get(id).ok_or(EngineError::UnknownElement(id))
    }

    /// Children in declaration order; compound elements list primary first.
    pub fn children(&self, id: ElementId) -> Vec<ElementId> {
        match self.get(id).map(|e| &e.kind) {
            Some(ElementKind::List { children }) => children.clone(),
            Some(ElementKind::Compound { primary, secondary }) => {
                primary.iter().chain(secondary.iter()).copied().collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn primary(&self, id: ElementId) -> Option<ElementId> {
        match self.get(id).map(|e| &e.kind) {
            Some(ElementKind::Compound { primary, .. }) => *primary,
            _ => None,
        }
    }

    pub fn secondary(&self, id: ElementId) -> Option<ElementId> {
        match self.get(id).map(|e| &e.kind) {
            Some(ElementKind::Compound { secondary, .. }) => *secondary,
            _ => None,
        }
    }

    pub fn executable(&self, id: ElementId) -> Option<Arc<dyn Executable>> {
        self.get(id).and_then(Element::executable).cloned()
    }

    /// Dot-joined local ids from the root down to `id`.
    pub fn full_id(&self, id: ElementId) -> String {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(next) = current {
            match self.get(next) {
                Some(element) => {
                    chain.push(element.local_id.as_str());
                    current = element.parent;
                }
                None => break,
            }
        }
        chain.reverse();
        node::join_ids(chain)
    }

    /// Reset an element before (re)entering it: clear its properties and
    /// executed marker and initialize its handlers.
    pub fn initialize(&mut self, id: ElementId) {
        let Some(element) = self.get_mut(id) else {
            return;
        };
        element.properties.clear();
        element.executed = false;
        for slot in &mut element.handlers {
            if let Some(handler) = slot.handler.as_mut() {
                handler.initialize(id);
            }
        }
    }

    pub fn mark_executed(&mut self, id: ElementId) {
        if let Some(element) = self.get_mut(id) {
            element.executed = true;
        }
    }

    /// A leaf that has not run since its last initialization.
    pub fn is_pending_leaf(&self, id: ElementId) -> bool {
        self.get(id).is_some_and(|e| e.is_leaf() && !e.executed)
    }

    pub fn set_property(&mut self, id: ElementId, name: &str, value: impl Into<Value>) {
        if let Some(element) = self.get_mut(id) {
            element.properties.insert(name.to_string(), value.into());
        }
    }

    pub fn property(&self, id: ElementId, name: &str) -> Option<&Value> {
        self.get(id).and_then(|e| e.property(name))
    }

    pub fn stack(&self) -> &[ElementId] {
        &self.stack
    }

    pub fn top(&self) -> Option<ElementId> {
        self.stack.last().copied()
    }

    /// Push `id`, which must be the root (on an empty stack), a child of the
    /// current top, or a temporary element on a non-empty stack.
    pub fn push(&mut self, id: ElementId) -> Result<(), EngineError> {
        let element = self.element(id)?;
        let allowed = match self.top() {
            None => self.root == Some(id),
            Some(_) if element.temporary => true,
            Some(top) => element.parent == Some(top),
        };
        if !allowed {
            return Err(EngineError::NotAChildOfTop {
                element: self.full_id(id),
                top: self
                    .top()
                    .map_or_else(|| "<empty>".to_string(), |top| self.full_id(top)),
            });
        }
        self.stack.push(id);
        Ok(())
    }

    /// Pop the top element. Temporary elements are released from the arena.
    pub fn pop(&mut self) -> Option<ElementId> {
        let id = self.stack.pop()?;
        if self.get(id).is_some_and(|e| e.temporary) {
            self.release(id);
        }
        Some(id)
    }

    pub fn clear_stack(&mut self) {
        while self.pop().is_some() {}
    }

    pub fn handler(&self, r: HandlerRef) -> Option<&Handler> {
        self.get(r.element)
            .and_then(|e| e.handlers.get(r.index))
            .and_then(|slot| slot.handler.as_ref())
    }

    pub fn handler_mut(&mut self, r: HandlerRef) -> Option<&mut Handler> {
        self.get_mut(r.element)
            .and_then(|e| e.handlers.get_mut(r.index))
            .and_then(|slot| slot.handler.as_mut())
    }

    pub(crate) fn take_handler(&mut self, r: HandlerRef) -> Option<Handler> {
        self.get_mut(r.element)
            .and_then(|e| e.handlers.get_mut(r.index))
            .and_then(|slot| slot.handler.take())
    }

    pub(crate) fn restore_handler(&mut self, r: HandlerRef, handler: Handler) {
        if let Some(slot) = self
            .get_mut(r.element)
            .and_then(|e| e.handlers.get_mut(r.index))
        {
            slot.handler = Some(handler);
        }
    }

    /// Full id of the owning element joined with the handler's local id.
    pub fn handler_full_id(&self, r: HandlerRef) -> String {
        let local = self
            .get(r.element)
            .and_then(|e| e.handlers.get(r.index))
            .map_or("", |slot| slot.local_id.as_str());
        node::child_id(&self.full_id(r.element), local)
    }

    /// Handlers of `element` supporting `capability`, in attachment order.
    pub fn handlers_on(&self, element: ElementId, capability: Capability) -> Vec<HandlerRef> {
        let Some(target) = self.get(element) else {
            return Vec::new();
        };
        target
            .handlers
            .iter()
            .enumerate()
            .filter(|(_, slot)| {
                slot.handler
                    .as_ref()
                    .is_some_and(|h| h.supports(capability))
            })
            .map(|(index, _)| HandlerRef { element, index })
            .collect()
    }

    /// Nearest handler supporting `capability`, scanning from the stack top.
    pub fn find_in_stack(&self, capability: Capability) -> Option<HandlerRef> {
        self.stack
            .iter()
            .rev()
            .find_map(|id| self.handlers_on(*id, capability).into_iter().next())
    }

    /// Every handler supporting `capability`, from the stack top to the root.
    pub fn find_all_in_stack(&self, capability: Capability) -> Vec<HandlerRef> {
        self.stack
            .iter()
            .rev()
            .flat_map(|id| self.handlers_on(*id, capability))
            .collect()
    }

    /// Elements reachable from the root, children before their parents.
    pub fn elements_post_order(&self) -> Vec<ElementId> {
        let mut out = Vec::new();
        if let Some(root) = self.root {
            self.collect_post_order(root, &mut out);
        }
        out
    }

    fn collect_post_order(&self, id: ElementId, out: &mut Vec<ElementId>) {
        for child in self.children(id) {
            self.collect_post_order(child, out);
        }
        out.push(id);
    }

    /// Every handler in the static tree supporting `capability`, innermost
    /// elements first.
    pub fn handlers_post_order(&self, capability: Capability) -> Vec<HandlerRef> {
        self.elements_post_order()
            .into_iter()
            .flat_map(|id| self.handlers_on(id, capability))
            .collect()
    }
}

/// Draw generated ids from `prefix` until one is not `taken`.
fn unused_id(prefix: &str, taken: impl Fn(&str) -> bool) -> String {
    loop {
        let id = node::generated_local_id(prefix);
        if !taken(&id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pause::PauseHandler;
    use crate::select::{CompoundSelector, ListSelector};
    use crate::test_support::ScriptedExecutable;
    use std::time::Duration;

    fn leaf(tree: &mut ElementTree, id: &str) -> ElementId {
        tree.add_leaf(id, Arc::new(ScriptedExecutable::finishing(id)))
    }

    fn sample() -> (ElementTree, ElementId, ElementId, ElementId) {
        let mut tree = ElementTree::new();
        let root = tree.add_list("module");
        let block = tree.add_list("block");
        let task = leaf(&mut tree, "task");
        tree.append_child(root, block).expect("block");
        tree.append_child(block, task).expect("task");
        tree.set_root(root).expect("root");
        (tree, root, block, task)
    }

    #[test]
    fn full_ids_follow_parent_chain() {
        let (tree, _, block, task) = sample();
        assert_eq!(tree.full_id(task), "module.block.task");
        assert_eq!(tree.full_id(block), "module.block");
    }

    #[test]
    fn reparenting_moves_child_and_recomputes_ids() {
        let (mut tree, root, block, task) = sample();
        tree.append_child(root, task).expect("reparent");
        assert!(tree.children(block).is_empty());
        assert_eq!(tree.children(root), vec![block, task]);
        assert_eq!(tree.full_id(task), "module.task");
    }

    #[test]
    fn cycles_are_rejected() {
        let (mut tree, root, block, _) = sample();
        let err = tree.append_child(block, root).expect_err("cycle");
        assert!(matches!(err, EngineError::InvalidTree(_)));
    }

    #[test]
    fn push_requires_child_of_top() {
        let (mut tree, root, block, task) = sample();
        assert!(matches!(
            tree.push(block),
            Err(EngineError::NotAChildOfTop { .. })
        ));
        tree.push(root).expect("root");
        assert!(tree.push(task).is_err());
        tree.push(block).expect("block");
        tree.push(task).expect("task");
        assert_eq!(tree.stack(), &[root, block, task]);
    }

    #[test]
    fn sibling_local_ids_must_be_unique() {
        let (mut tree, root, block, _) = sample();
        let first = leaf(&mut tree, "a");
        let second = leaf(&mut tree, "a");
        tree.append_child(root, first).expect("first a");
        let err = tree.append_child(root, second).expect_err("second a");
        assert!(matches!(err, EngineError::InvalidTree(_)));
        assert_eq!(tree.children(root), vec![block, first]);
        tree.append_child(block, second).expect("a under another parent");
        tree.append_child(root, first).expect("re-appending keeps its own name");

        let pair = tree.add_compound("pair");
        let primary = leaf(&mut tree, "x");
        let clash = leaf(&mut tree, "x");
        tree.set_primary(pair, primary).expect("primary");
        assert!(tree.set_secondary(pair, clash).is_err());
        assert_eq!(tree.secondary(pair), None);
        tree.set_primary(pair, clash).expect("replacing the slot holder");
        assert_eq!(tree.primary(pair), Some(clash));
    }

    #[test]
    fn generated_ids_never_clash_with_siblings() {
        let mut tree = ElementTree::new();
        let root = tree.add_list("module");
        for _ in 0..200 {
            let block = tree.add_list("");
            tree.append_child(root, block).expect("generated ids are redrawn");
        }
        let names: BTreeSet<&str> = tree
            .children(root)
            .into_iter()
            .filter_map(|c| tree.get(c).map(Element::local_id))
            .collect();
        assert_eq!(names.len(), 200);
        assert!(names.iter().all(|id| id.starts_with("list-")));

        for _ in 0..50 {
            tree.attach(root, PauseHandler::new(Duration::ZERO))
                .expect("generated handler ids are redrawn");
        }
        let handler_ids: BTreeSet<String> = (0..50)
            .map(|index| tree.handler_full_id(HandlerRef { element: root, index }))
            .collect();
        assert_eq!(handler_ids.len(), 50);
        assert!(tree
            .attach_named(root, "pause", PauseHandler::new(Duration::ZERO))
            .is_ok());
        assert!(tree
            .attach_named(root, "pause", PauseHandler::new(Duration::ZERO))
            .is_err());
    }

    #[test]
    fn temporary_needs_something_below_it() {
        let (mut tree, root, _, _) = sample();
        let temp = tree.add_temporary_leaf(Arc::new(ScriptedExecutable::finishing("notice")));
        assert!(matches!(
            tree.push(temp),
            Err(EngineError::NotAChildOfTop { .. })
        ));
        tree.push(root).expect("root");
        tree.push(temp).expect("temporary on top of the root");
    }

    #[test]
    fn temporary_elements_are_released_on_pop() {
        let (mut tree, root, _, _) = sample();
        tree.push(root).expect("root");
        let temp = tree.add_temporary_leaf(Arc::new(ScriptedExecutable::finishing("rating")));
        tree.push(temp).expect("temporary");
        assert_eq!(tree.pop(), Some(temp));
        assert!(tree.get(temp).is_none());
        assert_eq!(tree.top(), Some(root));
    }

    #[test]
    fn initialize_clears_executed_marker_and_properties() {
        let (mut tree, _, _, task) = sample();
        tree.mark_executed(task);
        tree.set_property(task, "level", 3);
        assert!(!tree.is_pending_leaf(task));
        tree.initialize(task);
        assert!(tree.is_pending_leaf(task));
        assert!(tree.property(task, "level").is_none());
    }

    #[test]
    fn handler_ids_and_stack_scans() {
        let (mut tree, root, block, task) = sample();
        let outer = tree
            .attach_named(root, "pause", PauseHandler::new(Duration::from_millis(500)))
            .expect("outer");
        let inner = tree
            .attach(block, PauseHandler::new(Duration::ZERO))
            .expect("inner");
        assert_eq!(tree.handler_full_id(outer), "module.pause");
        assert!(tree.handler_full_id(inner).starts_with("module.block.pause-"));

        tree.push(root).expect("root");
        tree.push(block).expect("block");
        tree.push(task).expect("task");
        assert_eq!(tree.find_in_stack(Capability::PauseHandler), Some(inner));
        assert_eq!(
            tree.find_all_in_stack(Capability::PauseHandler),
            vec![inner, outer]
        );
        assert_eq!(tree.find_in_stack(Capability::TimeoutHandler), None);
    }

    #[test]
    fn compound_selector_needs_compound_element() {
        let (mut tree, root, _, _) = sample();
        assert!(tree.attach(root, CompoundSelector::new()).is_err());
        let compound = tree.add_compound("pair");
        tree.attach(compound, CompoundSelector::new()).expect("compound");
        tree.attach(root, ListSelector::iterated(1)).expect("list");
    }

    #[test]
    fn post_order_visits_children_first() {
        let (tree, root, block, task) = sample();
        assert_eq!(tree.elements_post_order(), vec![task, block, root]);
    }
}

//! Headless element tree with identifiers, text/value state and listeners.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

/// Handle to an element in a [`Document`].
///
/// Slots of removed elements are reused; the generation tells a stale handle
/// from the element that took its slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    Input,
    KeyDown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub target: NodeId,
    /// Key name for `KeyDown` events.
    pub key: Option<String>,
}

pub type Handler = Rc<dyn Fn(&Event)>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DomError {
    #[error("element {0:?} does not exist")]
    UnknownNode(NodeId),
    #[error("element {0:?} is not attached")]
    Detached(NodeId),
    #[error("element {0:?} cannot be inserted under its own descendant")]
    HierarchyRequest(NodeId),
    #[error("listener {0:?} is not registered")]
    UnknownListener(ListenerId),
    #[error("resources were already released")]
    Released,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub tag: String,
    pub id: Option<String>,
    pub text: String,
    pub value: String,
    pub hidden: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attached: bool,
}

impl Element {
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

struct Slot {
    generation: u32,
    element: Option<Element>,
}

struct Listener {
    node: NodeId,
    kind: EventKind,
    handler: Handler,
}

/// The page-wide element tree. Slot 0 is the always-attached body.
pub struct Document {
    nodes: Vec<Slot>,
    free: Vec<usize>,
    listeners: BTreeMap<ListenerId, Listener>,
    next_listener: u64,
    scope_roots: BTreeSet<NodeId>,
    revision: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        let body = Element {
            tag: "body".to_owned(),
            id: None,
            text: String::new(),
            value: String::new(),
            hidden: false,
            parent: None,
            children: Vec::new(),
            attached: true,
        };
        Self {
            nodes: vec![Slot {
                generation: 0,
                element: Some(body),
            }],
            free: Vec::new(),
            listeners: BTreeMap::new(),
            next_listener: 0,
            scope_roots: BTreeSet::new(),
            revision: 0,
        }
    }

    #[must_use]
    pub fn body(&self) -> NodeId {
        NodeId {
            index: 0,
            generation: 0,
        }
    }

    /// Bumped on every visible change; hosts re-render when it moves.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    //
    // ─── TREE ──────────────────────────────────────────────────────────────────
    //

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str, id: Option<&str>) -> NodeId {
        let element = Element {
            tag: tag.to_owned(),
            id: id.map(str::to_owned),
            text: String::new(),
            value: String::new(),
            hidden: false,
            parent: None,
            children: Vec::new(),
            attached: false,
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.nodes[index];
            slot.element = Some(element);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        self.nodes.push(Slot {
            generation: 0,
            element: Some(element),
        });
        NodeId {
            index: self.nodes.len() - 1,
            generation: 0,
        }
    }

    /// # Errors
    ///
    /// Returns `DomError::UnknownNode` if either handle is invalid and
    /// `DomError::HierarchyRequest` if `child` encloses `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.element(parent).ok_or(DomError::UnknownNode(parent))?;
        self.element(child).ok_or(DomError::UnknownNode(child))?;
        if self.is_within(parent, child) {
            return Err(DomError::HierarchyRequest(child));
        }
        self.detach(child);
        let attached = self.contains(parent);
        if let Some(element) = self.element_mut(parent) {
            element.children.push(child);
        }
        if let Some(element) = self.element_mut(child) {
            element.parent = Some(parent);
        }
        self.set_attached(child, attached);
        self.touch();
        Ok(())
    }

    /// Create an element and append it in one step.
    ///
    /// # Errors
    ///
    /// Returns `DomError::UnknownNode` if `parent` is invalid.
    pub fn append_new(
        &mut self,
        parent: NodeId,
        tag: &str,
        id: Option<&str>,
    ) -> Result<NodeId, DomError> {
        let node = self.create_element(tag, id);
        self.append_child(parent, node)?;
        Ok(node)
    }

    /// Destroy `node` and its subtree. Listeners on removed elements are
    /// dropped, and their handles go stale.
    ///
    /// # Errors
    ///
    /// Returns `DomError::UnknownNode` for an invalid handle.
    pub fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        self.element(node).ok_or(DomError::UnknownNode(node))?;
        if node == self.body() {
            return Err(DomError::Detached(node));
        }
        self.detach(node);
        let removed: BTreeSet<NodeId> = self.subtree(node).into_iter().collect();
        self.listeners
            .retain(|_, listener| !removed.contains(&listener.node));
        self.scope_roots.retain(|root| !removed.contains(root));
        for id in removed {
            let slot = &mut self.nodes[id.index];
            slot.element = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
        }
        self.touch();
        Ok(())
    }

    #[must_use]
    pub fn element(&self, node: NodeId) -> Option<&Element> {
        self.nodes
            .get(node.index)
            .filter(|slot| slot.generation == node.generation)
            .and_then(|slot| slot.element.as_ref())
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        self.nodes
            .get_mut(node.index)
            .filter(|slot| slot.generation == node.generation)
            .and_then(|slot| slot.element.as_mut())
    }

    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.element(node).is_some_and(Element::is_attached)
    }

    /// `node` followed by all its descendants, in document order.
    #[must_use]
    pub fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let Some(element) = self.element(current) else {
                continue;
            };
            out.push(current);
            stack.extend(element.children.iter().rev().copied());
        }
        out
    }

    /// True when `ancestor` is `node` or one of its ancestors.
    #[must_use]
    pub fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.element(n).and_then(Element::parent);
        }
        false
    }

    /// First element in `root`'s subtree with identifier `id`.
    #[must_use]
    pub fn find_in_subtree(&self, root: NodeId, id: &str) -> Option<NodeId> {
        self.subtree(root)
            .into_iter()
            .find(|node| self.has_id(*node, id))
    }

    /// Attached elements with identifier `id`, in document order.
    #[must_use]
    pub fn find_all_by_id(&self, id: &str) -> Vec<NodeId> {
        self.subtree(self.body())
            .into_iter()
            .filter(|node| self.has_id(*node, id))
            .collect()
    }

    /// Page-wide lookup, like `getElementById`.
    #[must_use]
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.find_all_by_id(id).into_iter().next()
    }

    //
    // ─── STATE ─────────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn text(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|e| e.text.as_str())
    }

    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) {
        let text = text.into();
        let Some(element) = self.element_mut(node) else {
            return;
        };
        if element.text != text {
            element.text = text;
            self.touch();
        }
    }

    #[must_use]
    pub fn value(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|e| e.value.as_str())
    }

    pub fn set_value(&mut self, node: NodeId, value: impl Into<String>) {
        let value = value.into();
        let Some(element) = self.element_mut(node) else {
            return;
        };
        if element.value != value {
            element.value = value;
            self.touch();
        }
    }

    pub fn set_hidden(&mut self, node: NodeId, hidden: bool) {
        let Some(element) = self.element_mut(node) else {
            return;
        };
        if element.hidden != hidden {
            element.hidden = hidden;
            self.touch();
        }
    }

    /// Attached, and neither it nor any ancestor is hidden.
    #[must_use]
    pub fn is_visible(&self, node: NodeId) -> bool {
        if !self.contains(node) {
            return false;
        }
        let mut current = Some(node);
        while let Some(n) = current {
            match self.element(n) {
                Some(element) if element.hidden => return false,
                Some(element) => current = element.parent,
                None => return false,
            }
        }
        true
    }

    //
    // ─── SCOPES ────────────────────────────────────────────────────────────────
    //

    pub fn register_scope_root(&mut self, root: NodeId) {
        self.scope_roots.insert(root);
    }

    pub fn unregister_scope_root(&mut self, root: NodeId) {
        self.scope_roots.remove(&root);
    }

    /// Nearest registered scope root enclosing `node`, including itself.
    #[must_use]
    pub fn owning_scope(&self, node: NodeId) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.scope_roots.contains(&n) {
                return Some(n);
            }
            current = self.element(n).and_then(Element::parent);
        }
        None
    }

    //
    // ─── LISTENERS ─────────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `DomError::UnknownNode` for an invalid handle.
    pub fn add_listener(
        &mut self,
        node: NodeId,
        kind: EventKind,
        handler: Handler,
    ) -> Result<ListenerId, DomError> {
        self.element(node).ok_or(DomError::UnknownNode(node))?;
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.insert(id, Listener { node, kind, handler });
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns `DomError::UnknownListener` if the listener is already gone,
    /// e.g. because its element was removed.
    pub fn remove_listener(&mut self, id: ListenerId) -> Result<(), DomError> {
        self.listeners
            .remove(&id)
            .map(|_| ())
            .ok_or(DomError::UnknownListener(id))
    }

    #[must_use]
    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.listeners.contains_key(&id)
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Listeners an event of `kind` on `target` reaches, target first then
    /// each ancestor.
    #[must_use]
    pub fn propagation_path(&self, target: NodeId, kind: EventKind) -> Vec<(ListenerId, Handler)> {
        let mut out = Vec::new();
        let mut current = Some(target);
        while let Some(node) = current {
            out.extend(
                self.listeners
                    .iter()
                    .filter(|(_, l)| l.node == node && l.kind == kind)
                    .map(|(id, l)| (*id, Rc::clone(&l.handler))),
            );
            current = self.element(node).and_then(Element::parent);
        }
        out
    }

    fn has_id(&self, node: NodeId, id: &str) -> bool {
        self.element(node).is_some_and(|e| e.id.as_deref() == Some(id))
    }

    fn detach(&mut self, node: NodeId) {
        let parent = self.element_mut(node).and_then(|e| e.parent.take());
        if let Some(element) = parent.and_then(|p| self.element_mut(p)) {
            element.children.retain(|c| *c != node);
        }
        self.set_attached(node, false);
    }

    fn set_attached(&mut self, node: NodeId, attached: bool) {
        for n in self.subtree(node) {
            if let Some(element) = self.element_mut(n) {
                element.attached = attached;
            }
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

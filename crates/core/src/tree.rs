//! Layer tree reconstruction from the host's flat, bracketed listing.
//!
//! The host lists layers top to bottom with each group wrapped in a `Start`
//! and an `End` entry. [`walk_brackets`] replays that listing with a stack of
//! accumulated visibility so that counting and tree building agree on which
//! layers are effectively visible.

use layer_model::{LayerDescriptor, LayerHandle, LayerKind, SectionMarker};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("section end at index {index} has no matching start")]
    UnbalancedSection { index: usize },
    #[error("{open} section(s) left open at end of listing")]
    UnclosedSection { open: usize },
}

/// A step of the bracket walk. `visible` is the layer's own flag AND-ed with
/// every enclosing group's flag.
#[derive(Debug, Clone, Copy)]
pub enum BracketEvent<'a> {
    Enter { descriptor: &'a LayerDescriptor, visible: bool },
    Content { descriptor: &'a LayerDescriptor, visible: bool },
    Exit,
}

/// Replays a flat listing, calling `visit` with the index of every entry.
pub fn walk_brackets<'a, E, F>(descriptors: &'a [LayerDescriptor], mut visit: F) -> Result<(), E>
where
    E: From<TreeError>,
    F: FnMut(usize, BracketEvent<'a>) -> Result<(), E>,
{
    let mut stack = vec![true];

    for (index, descriptor) in descriptors.iter().enumerate() {
        let accumulated = stack.last().copied().unwrap_or(true);
        match descriptor.marker {
            SectionMarker::Start => {
                let visible = accumulated && descriptor.visible;
                stack.push(visible);
                visit(index, BracketEvent::Enter { descriptor, visible })?;
            }
            SectionMarker::Content => {
                let visible = accumulated && descriptor.visible;
                visit(index, BracketEvent::Content { descriptor, visible })?;
            }
            SectionMarker::End => {
                if stack.len() == 1 {
                    return Err(TreeError::UnbalancedSection { index }.into());
                }
                stack.pop();
                visit(index, BracketEvent::Exit)?;
            }
        }
    }

    if stack.len() > 1 {
        return Err(TreeError::UnclosedSection { open: stack.len() - 1 }.into());
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerNode {
    pub handle: LayerHandle,
    pub name: String,
    pub kind: LayerKind,
    /// The layer's own flag at collection time.
    pub visible: bool,
    /// Own flag AND-ed with every ancestor group's flag.
    pub effective_visible: bool,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Arena of layer nodes in host stacking order.
#[derive(Debug, Clone, Default)]
pub struct LayerTree {
    nodes: Vec<LayerNode>,
    roots: Vec<NodeId>,
    content: Vec<NodeId>,
}

impl LayerTree {
    pub fn from_descriptors(descriptors: &[LayerDescriptor]) -> Result<Self, TreeError> {
        let mut builder = TreeBuilder::default();
        walk_brackets(descriptors, |_, event| {
            builder.apply(event);
            Ok::<(), TreeError>(())
        })?;
        Ok(builder.finish())
    }

    pub fn node(&self, id: NodeId) -> &LayerNode {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Exportable leaves (everything except groups and adjustment layers), in
    /// depth-first stacking order.
    pub fn content_layers(&self) -> &[NodeId] {
        &self.content
    }

    pub fn visible_content_layers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.content
            .iter()
            .copied()
            .filter(|id| self.node(*id).effective_visible)
    }

    /// Parent chain from the immediate parent up to the root group.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors { tree: self, next: self.node(id).parent }
    }

    /// Raw group names from the root down to the node's parent.
    pub fn group_path(&self, id: NodeId) -> Vec<&str> {
        let mut path: Vec<&str> = self
            .ancestors(id)
            .map(|ancestor| self.node(ancestor).name.as_str())
            .collect();
        path.reverse();
        path
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// The document consists of nothing but its background layer.
    pub fn is_single_background(&self) -> bool {
        self.nodes.len() == 1 && self.nodes[0].kind == LayerKind::Background
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.name == name)
            .map(|index| NodeId(index as u32))
    }
}

pub struct Ancestors<'a> {
    tree: &'a LayerTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.node(current).parent;
        Some(current)
    }
}

/// Builds a [`LayerTree`] from bracket events, keeping open groups on a
/// parent stack.
#[derive(Debug, Default)]
pub(crate) struct TreeBuilder {
    tree: LayerTree,
    open: Vec<NodeId>,
}

impl TreeBuilder {
    pub(crate) fn apply(&mut self, event: BracketEvent<'_>) {
        match event {
            BracketEvent::Enter { descriptor, visible } => {
                let id = self.push(descriptor, visible, LayerKind::Group);
                self.open.push(id);
            }
            BracketEvent::Content { descriptor, visible } => {
                let id = self.push(descriptor, visible, descriptor.kind);
                if descriptor.kind.is_content() {
                    self.tree.content.push(id);
                }
            }
            BracketEvent::Exit => {
                self.open.pop();
            }
        }
    }

    fn push(&mut self, descriptor: &LayerDescriptor, effective_visible: bool, kind: LayerKind) -> NodeId {
        let id = NodeId(self.tree.nodes.len() as u32);
        let parent = self.open.last().copied();
        self.tree.nodes.push(LayerNode {
            handle: descriptor.handle,
            name: descriptor.name.clone(),
            kind,
            visible: descriptor.visible,
            effective_visible,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(parent) => self.tree.nodes[parent.index()].children.push(id),
            None => self.tree.roots.push(id),
        }
        id
    }

    pub(crate) fn finish(self) -> LayerTree {
        self.tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{descriptor, end, start};

    fn menu_listing() -> Vec<LayerDescriptor> {
        vec![
            start(1, "Main Menu", true),
            descriptor(2, "Title", true, LayerKind::Text),
            start(3, "Buttons", false),
            descriptor(4, "Play", true, LayerKind::Image),
            descriptor(5, "Tint", true, LayerKind::Adjustment),
            end(6),
            end(7),
            descriptor(8, "Background", true, LayerKind::Background),
        ]
    }

    #[test]
    fn builds_nested_groups() {
        let tree = LayerTree::from_descriptors(&menu_listing()).unwrap();

        assert_eq!(tree.len(), 6);
        assert_eq!(tree.roots().len(), 2);

        let play = tree.find("Play").unwrap();
        assert_eq!(tree.group_path(play), vec!["Main Menu", "Buttons"]);
        assert_eq!(tree.depth(play), 2);

        let menu = tree.find("Main Menu").unwrap();
        assert_eq!(tree.node(menu).kind, LayerKind::Group);
        assert_eq!(tree.node(menu).children.len(), 2);
    }

    #[test]
    fn hidden_group_hides_descendants() {
        let tree = LayerTree::from_descriptors(&menu_listing()).unwrap();

        let play = tree.node(tree.find("Play").unwrap());
        assert!(play.visible);
        assert!(!play.effective_visible);

        let visible: Vec<&str> = tree
            .visible_content_layers()
            .map(|id| tree.node(id).name.as_str())
            .collect();
        assert_eq!(visible, vec!["Title", "Background"]);
    }

    #[test]
    fn adjustments_are_not_content() {
        let tree = LayerTree::from_descriptors(&menu_listing()).unwrap();

        let content: Vec<&str> = tree
            .content_layers()
            .iter()
            .map(|id| tree.node(*id).name.as_str())
            .collect();
        assert_eq!(content, vec!["Title", "Play", "Background"]);
        assert!(tree.find("Tint").is_some());
    }

    #[test]
    fn unbalanced_end_is_rejected() {
        let listing = vec![descriptor(1, "A", true, LayerKind::Image), end(2)];
        assert_eq!(
            LayerTree::from_descriptors(&listing).unwrap_err(),
            TreeError::UnbalancedSection { index: 1 }
        );
    }

    #[test]
    fn unclosed_start_is_rejected() {
        let listing = vec![start(1, "A", true), descriptor(2, "B", true, LayerKind::Image)];
        assert_eq!(
            LayerTree::from_descriptors(&listing).unwrap_err(),
            TreeError::UnclosedSection { open: 1 }
        );
    }

    #[test]
    fn single_background_is_detected() {
        let only_background = vec![descriptor(1, "Background", true, LayerKind::Background)];
        assert!(LayerTree::from_descriptors(&only_background)
            .unwrap()
            .is_single_background());
        assert!(!LayerTree::from_descriptors(&menu_listing())
            .unwrap()
            .is_single_background());
    }
}

//! Per-layer isolation of host visibility.
//!
//! Before the export pass every candidate layer is hidden. Isolating a leaf
//! then turns on the leaf and any hidden ancestor group, so the composite
//! shows exactly that leaf. Reverting only turns the leaf back off: groups
//! stay on, and their remaining children are already hidden.

use crate::tree::{LayerTree, NodeId};
use host_engine::{HostDocument, HostError};
use layer_model::{LayerHandle, SectionMarker};

#[derive(Debug, thiserror::Error)]
pub enum VisibilityError {
    #[error("layer {} is still isolated; revert it first", .0.raw())]
    ScopeAlreadyOpen(LayerHandle),
    #[error("host operation failed: {0}")]
    Host(#[from] HostError),
}

/// Proof that a leaf is isolated. Hand it back to
/// [`VisibilityController::revert`].
#[derive(Debug)]
#[must_use = "an isolated layer must be reverted"]
pub struct VisibilityScope {
    handle: LayerHandle,
    revealed_groups: Vec<NodeId>,
}

impl VisibilityScope {
    /// Ancestor groups that were hidden and had to be turned on.
    pub fn revealed_groups(&self) -> &[NodeId] {
        &self.revealed_groups
    }
}

/// Allows at most one open isolation scope at a time.
#[derive(Debug, Default)]
pub struct VisibilityController {
    open: Option<LayerHandle>,
}

impl VisibilityController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn hide_all(
        &self,
        tree: &LayerTree,
        document: &mut dyn HostDocument,
        layers: &[NodeId],
    ) -> Result<(), VisibilityError> {
        for id in layers {
            document.set_visible(tree.node(*id).handle, false)?;
        }
        Ok(())
    }

    pub fn isolate(
        &mut self,
        tree: &LayerTree,
        document: &mut dyn HostDocument,
        leaf: NodeId,
    ) -> Result<VisibilityScope, VisibilityError> {
        if let Some(open) = self.open {
            return Err(VisibilityError::ScopeAlreadyOpen(open));
        }

        let handle = tree.node(leaf).handle;
        document.set_visible(handle, true)?;

        let mut revealed_groups = Vec::new();
        for ancestor in tree.ancestors(leaf) {
            let group = tree.node(ancestor).handle;
            if !document.is_visible(group)? {
                document.set_visible(group, true)?;
                revealed_groups.push(ancestor);
            }
        }

        self.open = Some(handle);
        Ok(VisibilityScope { handle, revealed_groups })
    }

    pub fn revert(
        &mut self,
        document: &mut dyn HostDocument,
        scope: VisibilityScope,
    ) -> Result<(), VisibilityError> {
        self.open = None;
        document.set_visible(scope.handle, false)?;
        Ok(())
    }
}

/// Visibility flags of every layer, captured before a run mutates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilitySnapshot {
    states: Vec<(LayerHandle, bool)>,
}

impl VisibilitySnapshot {
    pub fn capture(document: &dyn HostDocument) -> Result<Self, HostError> {
        let states = document
            .list_layers_flat()?
            .into_iter()
            .filter(|descriptor| descriptor.marker != SectionMarker::End)
            .map(|descriptor| (descriptor.handle, descriptor.visible))
            .collect();
        Ok(Self { states })
    }

    /// Puts back every flag that differs from the captured one.
    pub fn restore(&self, document: &mut dyn HostDocument) -> Result<(), HostError> {
        for (handle, visible) in &self.states {
            if document.is_visible(*handle)? != *visible {
                document.set_visible(*handle, *visible)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{menu_document, visible_content};
    use host_engine::MemoryDocument;

    fn tree_of(document: &MemoryDocument) -> LayerTree {
        LayerTree::from_descriptors(&document.list_layers_flat().unwrap()).unwrap()
    }

    #[test]
    fn isolate_reveals_hidden_ancestors() {
        let mut document = menu_document();
        let tree = tree_of(&document);
        let mut controller = VisibilityController::new();
        controller
            .hide_all(&tree, &mut document, tree.content_layers())
            .unwrap();

        let settings = tree.find("Settings").unwrap();
        let scope = controller.isolate(&tree, &mut document, settings).unwrap();

        assert_eq!(visible_content(&document), vec!["Settings"]);
        assert_eq!(scope.revealed_groups(), &[tree.find("Options").unwrap()]);

        controller.revert(&mut document, scope).unwrap();
        assert!(visible_content(&document).is_empty());
        assert!(!controller.is_open());
    }

    #[test]
    fn second_scope_is_refused() {
        let mut document = menu_document();
        let tree = tree_of(&document);
        let mut controller = VisibilityController::new();

        let scope = controller
            .isolate(&tree, &mut document, tree.find("Play").unwrap())
            .unwrap();
        let err = controller
            .isolate(&tree, &mut document, tree.find("Title").unwrap())
            .unwrap_err();
        assert!(matches!(err, VisibilityError::ScopeAlreadyOpen(_)));

        controller.revert(&mut document, scope).unwrap();
        assert!(controller
            .isolate(&tree, &mut document, tree.find("Title").unwrap())
            .is_ok());
    }

    #[test]
    fn snapshot_restores_every_flag() {
        let mut document = menu_document();
        let before = document.visibility_flags();
        let snapshot = VisibilitySnapshot::capture(&document).unwrap();

        let tree = tree_of(&document);
        let mut controller = VisibilityController::new();
        controller
            .hide_all(&tree, &mut document, tree.content_layers())
            .unwrap();
        let scope = controller
            .isolate(&tree, &mut document, tree.find("Settings").unwrap())
            .unwrap();
        controller.revert(&mut document, scope).unwrap();
        assert_ne!(document.visibility_flags(), before);

        snapshot.restore(&mut document).unwrap();
        assert_eq!(document.visibility_flags(), before);
    }
}

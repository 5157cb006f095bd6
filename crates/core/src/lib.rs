//! Layer export core
//!
//! Walks a host document's layer tree, exports every layer in isolation and
//! synthesizes the manifest of the selected target mode. The import side
//! rebuilds a UI node tree from an engine-import manifest.

pub mod cancel;
pub mod error;
pub mod import;
pub mod manifest;
pub mod preview;
pub mod progress;
pub mod run;
pub mod sanitize;
pub mod text_policy;
pub mod traverse;
pub mod tree;
pub mod visibility;

#[cfg(test)]
pub(crate) mod testing;

pub use cancel::CancellationToken;
pub use error::{RunError, RunResult};
pub use import::{
    reconstruct, FontRequest, FontTable, ImportError, ImportOptions, ImportReport, UiContent,
    UiNode, UiNodeId, UiTree,
};
pub use manifest::engine::EngineManifest;
pub use manifest::Manifest;
pub use progress::{LogProgress, NoProgress, Phase, Progress};
pub use run::{run_export, ExportReport, RunStatus};
pub use sanitize::{content_address, qualified_name, sanitize};
pub use traverse::{collect_layers, count_layers, ExportPass, LayerCounts, LayerExporter, LayerFailure};
pub use tree::{LayerNode, LayerTree, NodeId, TreeError};
pub use visibility::{VisibilityController, VisibilityError, VisibilityScope, VisibilitySnapshot};

//! Hiding text layers for targets that render text natively.
//!
//! Text layers are hidden in the document and inside every smart object, so
//! exported composites carry no baked-in text. [`HiddenText`] remembers what
//! was touched so the run can put it back.

use host_engine::{HostDocument, HostError};
use layer_model::{LayerHandle, LayerKind, SectionMarker};

#[derive(Debug, Default, PartialEq, Eq)]
#[must_use = "hidden text layers must be restored"]
pub struct HiddenText {
    hidden: Vec<LayerHandle>,
    embedded: Vec<(LayerHandle, HiddenText)>,
}

impl HiddenText {
    pub fn is_empty(&self) -> bool {
        self.hidden.is_empty() && self.embedded.is_empty()
    }

    /// Number of text layers hidden, including those inside smart objects.
    pub fn len(&self) -> usize {
        self.hidden.len() + self.embedded.iter().map(|(_, nested)| nested.len()).sum::<usize>()
    }

    /// Shows every hidden text layer again, committing the change inside smart
    /// objects.
    pub fn restore(self, document: &mut dyn HostDocument) -> Result<(), HostError> {
        for handle in &self.hidden {
            document.set_visible(*handle, true)?;
        }

        for (layer, nested) in self.embedded {
            let restored = {
                let embedded = document.open_embedded(layer)?;
                nested.restore(embedded)
            };
            document.close_embedded(layer, restored.is_ok())?;
            restored?;
        }
        Ok(())
    }
}

pub fn hide_text_layers(document: &mut dyn HostDocument) -> Result<HiddenText, HostError> {
    let mut record = HiddenText::default();

    for descriptor in document.list_layers_flat()? {
        if descriptor.marker != SectionMarker::Content {
            continue;
        }

        match descriptor.kind {
            LayerKind::Text if descriptor.visible => {
                document.set_visible(descriptor.handle, false)?;
                record.hidden.push(descriptor.handle);
            }
            LayerKind::SmartObject => {
                let nested = {
                    let embedded = document.open_embedded(descriptor.handle)?;
                    hide_text_layers(embedded)
                };
                // An error inside discards the partial edit.
                let commit = nested.as_ref().is_ok_and(|nested| !nested.is_empty());
                document.close_embedded(descriptor.handle, commit)?;

                let nested = nested?;
                if !nested.is_empty() {
                    record.embedded.push((descriptor.handle, nested));
                }
            }
            _ => {}
        }
    }

    log::debug!("hid {} text layer(s)", record.len());
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{menu_document, visible_content};
    use host_engine::MemoryDocument;

    fn embedded_visible(document: &MemoryDocument, name: &str) -> Vec<String> {
        let logo = document.find_layer(name).unwrap();
        visible_content(document.embedded(logo).unwrap())
    }

    #[test]
    fn hides_text_in_document_and_smart_objects() {
        let mut document = menu_document();

        let hidden = hide_text_layers(&mut document).unwrap();

        assert_eq!(hidden.len(), 2);
        assert!(!visible_content(&document).contains(&"Title".to_owned()));
        assert_eq!(embedded_visible(&document, "Logo"), vec!["Mark"]);
        assert!(!document.is_embedded_open(document.find_layer("Logo").unwrap()));
    }

    #[test]
    fn restore_shows_text_again() {
        let mut document = menu_document();
        let before = visible_content(&document);

        let hidden = hide_text_layers(&mut document).unwrap();
        hidden.restore(&mut document).unwrap();

        assert_eq!(visible_content(&document), before);
        assert_eq!(embedded_visible(&document, "Logo"), vec!["Caption", "Mark"]);
    }

    #[test]
    fn already_hidden_text_is_left_alone() {
        let mut document = MemoryDocument::from_json(
            r#"{ "name": "Doc", "width": 10, "height": 10, "layers": [
                { "type": "text", "name": "Note", "visible": false, "bounds": [0, 0, 5, 5],
                  "text": "n", "font": "Arial", "size": 12 } ] }"#,
        )
        .unwrap();

        let hidden = hide_text_layers(&mut document).unwrap();
        assert!(hidden.is_empty());
    }
}

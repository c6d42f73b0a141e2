//! Pending edit application
//!
//! Folds queued auxiliary-input edits into the observed text set, in arrival
//! order. The strict form is used for incremental application and rejects
//! any edit that does not line up with what the last run observed; the
//! lenient form is used by full runs and skips such edits.

use crate::error::EditFailure;
use sourcegen_types::{AdditionalText, PendingEdit};

/// Apply every edit, or report the first one that cannot be mapped
pub(crate) fn apply_strict(
    texts: &[AdditionalText],
    edits: &[PendingEdit],
) -> Result<Vec<AdditionalText>, EditFailure> {
    let mut texts = texts.to_vec();
    for edit in edits {
        apply_one(&mut texts, edit)?;
    }
    Ok(texts)
}

/// Apply every edit that maps, skipping the rest
pub(crate) fn apply_lenient(texts: &[AdditionalText], edits: &[PendingEdit]) -> Vec<AdditionalText> {
    let mut texts = texts.to_vec();
    for edit in edits {
        if let Err(failure) = apply_one(&mut texts, edit) {
            tracing::warn!(path = edit.path(), %failure, "skipping pending edit");
        }
    }
    texts
}

fn position(texts: &[AdditionalText], path: &str) -> Option<usize> {
    texts.iter().position(|t| t.path() == path)
}

fn apply_one(texts: &mut Vec<AdditionalText>, edit: &PendingEdit) -> Result<(), EditFailure> {
    match edit {
        PendingEdit::AdditionalFileAdded(text) => {
            if position(texts, text.path()).is_some() {
                return Err(EditFailure::AddedExistingText {
                    path: text.path().to_owned(),
                });
            }
            texts.push(text.clone());
        }

        PendingEdit::AdditionalFileRemoved(text) => {
            let index = position(texts, text.path()).ok_or_else(|| EditFailure::RemovedUnknownText {
                path: text.path().to_owned(),
            })?;
            texts.remove(index);
        }

        PendingEdit::AdditionalFileChanged { old, new } => {
            if old.path() != new.path() {
                return Err(EditFailure::PathMismatch {
                    old: old.path().to_owned(),
                    new: new.path().to_owned(),
                });
            }
            let index = position(texts, old.path()).ok_or_else(|| EditFailure::ChangedUnknownText {
                path: old.path().to_owned(),
            })?;
            if texts[index] != *old {
                return Err(EditFailure::StaleChange {
                    path: old.path().to_owned(),
                });
            }
            texts[index] = new.clone();
        }
    }
    Ok(())
}

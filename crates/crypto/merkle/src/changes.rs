use serde::{Deserialize, Serialize};

use crate::record::TraceRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeInfo {
    pub change_type: ChangeType,
    pub index: usize,
    pub old_record: Option<TraceRecord>,
    pub new_record: Option<TraceRecord>,
}

/// Index-keyed diff between two record lists.
///
/// Indices present only in `new` are additions, indices with differing
/// content are modifications, and old indices beyond the new length are
/// deletions. Unchanged indices are omitted.
pub fn detect_changes(old: &[TraceRecord], new: &[TraceRecord]) -> Vec<ChangeInfo> {
    let mut changes = Vec::new();

    for (index, new_record) in new.iter().enumerate() {
        match old.get(index) {
            None => changes.push(ChangeInfo {
                change_type: ChangeType::Added,
                index,
                old_record: None,
                new_record: Some(new_record.clone()),
            }),
            Some(old_record) if !old_record.same_content(new_record) => {
                changes.push(ChangeInfo {
                    change_type: ChangeType::Modified,
                    index,
                    old_record: Some(old_record.clone()),
                    new_record: Some(new_record.clone()),
                });
            }
            Some(_) => {}
        }
    }

    for (index, old_record) in old.iter().enumerate().skip(new.len()) {
        changes.push(ChangeInfo {
            change_type: ChangeType::Deleted,
            index,
            old_record: Some(old_record.clone()),
            new_record: None,
        });
    }

    changes
}

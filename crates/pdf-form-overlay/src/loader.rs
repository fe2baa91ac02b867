//! Page and field acquisition

use crate::backend::DocumentHandle;
use crate::types::{FieldDescriptor, FieldMetadata, PageEntry, Result};

/// Flatten grouped metadata, keeping group order and the order within groups
pub fn flatten_metadata(metadata: FieldMetadata) -> Vec<FieldDescriptor> {
    metadata.into_values().flatten().collect()
}

/// Surfaced descriptors for a 1-based page number, in metadata order
pub fn fields_for_page(all: &[FieldDescriptor], page_number: usize) -> Vec<FieldDescriptor> {
    all.iter()
        .filter(|d| d.is_surfaced() && d.belongs_to_page(page_number))
        .cloned()
        .collect()
}

/// Acquire every page of `document` with its surfaced fields.
///
/// Fails as a whole: either every page entry is produced or none is.
pub async fn load_page_entries<D: DocumentHandle>(
    document: &D,
) -> Result<Vec<PageEntry<D::Page>>> {
    let all_fields = flatten_metadata(document.field_metadata().await?);
    let page_count = document.page_count();
    log::debug!(
        "Loading {} pages with {} field widgets",
        page_count,
        all_fields.len()
    );

    let mut entries = Vec::with_capacity(page_count);
    for page_number in 1..=page_count {
        let page = document.page(page_number).await?;
        let fields = fields_for_page(&all_fields, page_number);
        entries.push(PageEntry { page, fields });
    }
    Ok(entries)
}

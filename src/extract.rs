//! Pulls normalized vehicle details out of a definition record.
//!
//! Records look like `<vehicle><storeData><name/><brand/><category/>
//! <image/><specs>...</specs></storeData>...</vehicle>`. Every field has a
//! default; one missing field never hides the others.
use roxmltree::{Document, Node};
use tracing::warn;

use crate::error::ListingError;
use crate::model::VehicleDetails;

pub const UNKNOWN: &str = "Unknown";

const PREFERRED_LANGUAGE: &str = "en";

/// Parse record text and extract details. Only an XML syntax error fails.
pub fn extract_details(source_name: &str, text: &str) -> Result<VehicleDetails, ListingError> {
    let doc = Document::parse(text).map_err(|e| ListingError::malformed(source_name, e))?;
    let store_data = doc
        .root_element()
        .children()
        .find(|n| n.has_tag_name("storeData"));
    if store_data.is_none() {
        warn!(record = source_name, "record has no storeData; using defaults");
    }
    Ok(details_from_store_data(store_data))
}

fn details_from_store_data(store_data: Option<Node<'_, '_>>) -> VehicleDetails {
    let field = |tag: &str| store_data.and_then(|sd| child(sd, tag));

    VehicleDetails {
        name: field("name")
            .and_then(localized_text)
            .unwrap_or_else(|| UNKNOWN.to_string()),
        brand: field("brand")
            .and_then(text_of)
            .unwrap_or_else(|| UNKNOWN.to_string()),
        category: field("category")
            .and_then(text_of)
            .unwrap_or_else(|| UNKNOWN.to_string()),
        specs: field("specs").map(flatten_specs).unwrap_or_default(),
        image_ref: field("image").and_then(text_of),
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(tag))
}

fn text_of(node: Node<'_, '_>) -> Option<String> {
    node.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// `<name>Foo</name>` or `<name><en>Foo</en><de>..</de></name>`.
fn localized_text(node: Node<'_, '_>) -> Option<String> {
    if let Some(text) = text_of(node) {
        return Some(text);
    }
    child(node, PREFERRED_LANGUAGE)
        .and_then(text_of)
        .or_else(|| node.children().filter(Node::is_element).find_map(text_of))
}

/// `"tag: value"` for each child element, space-joined in document order.
fn flatten_specs(specs: Node<'_, '_>) -> String {
    specs
        .children()
        .filter(Node::is_element)
        .map(|spec| {
            let value = spec.text().map(str::trim).unwrap_or("");
            format!("{}: {}", spec.tag_name().name(), value)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

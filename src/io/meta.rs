//! `titul` metadata section (organization, device, user, analysis name).

use roxmltree::Node;

use crate::domain::Metadata;
use crate::error::MetaParseError;

/// Decode the optional `titul` section. Absent section or fields decode to `None`.
pub fn decode_meta(root: Node) -> Result<Metadata, MetaParseError> {
    let sections: Vec<Node> = root.children().filter(|n| n.has_tag_name("titul")).collect();
    let titul = match sections.as_slice() {
        [] => return Ok(Metadata::default()),
        [one] => *one,
        many => return Err(MetaParseError::Duplicated(many.len())),
    };

    Ok(Metadata {
        organization: field(titul, "organization")?,
        device: field(titul, "device")?,
        user: field(titul, "user")?,
        analysis: field(titul, "aname")?,
    })
}

fn field(titul: Node, name: &str) -> Result<Option<String>, MetaParseError> {
    let Some(node) = titul.children().find(|n| n.has_tag_name(name)) else {
        return Ok(None);
    };
    if node.children().any(|n| n.is_element()) {
        return Err(MetaParseError::NotText(name.to_string()));
    }

    let text: String = node.children().filter_map(|n| n.text()).collect();
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

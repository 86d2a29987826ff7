//! Petits utilitaires XML partagés (xmltree).

use xmltree::{Element, EmitterConfig, XMLNode};

/// Itère sur les enfants éléments (ignore texte et commentaires).
pub(crate) fn xml_children(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(|node| match node {
        XMLNode::Element(elem) => Some(elem),
        _ => None,
    })
}

/// Texte du premier enfant portant ce nom local.
pub(crate) fn child_text(element: &Element, name: &str) -> Option<String> {
    xml_children(element)
        .find(|child| child.name == name)
        .and_then(|child| child.get_text().map(|cow| cow.into_owned()))
}

/// Élément feuille contenant un texte.
pub(crate) fn text_element(name: &str, value: impl Into<String>) -> Element {
    let mut elem = Element::new(name);
    elem.children.push(XMLNode::Text(value.into()));
    elem
}

pub(crate) fn push_child(parent: &mut Element, child: Element) {
    parent.children.push(XMLNode::Element(child));
}

/// Sérialise un document complet avec l'en-tête XML standard.
pub(crate) fn emit_document(root: &Element) -> Result<String, xmltree::Error> {
    let config = EmitterConfig::new()
        .write_document_declaration(true)
        .perform_indent(true)
        .indent_string("  ");

    let mut buf = Vec::new();
    root.write_with_config(&mut buf, config)?;

    Ok(String::from_utf8_lossy(&buf).to_string())
}

use xmltree::{Element, XMLNode};

/// Every element named `name` at or below `root`, in document order.
pub(crate) fn find_all<'a>(root: &'a Element, name: &str) -> Vec<&'a Element> {
    let mut found = Vec::new();
    collect(root, name, &mut found);
    found
}

/// The text of the only element named `name`; `None` if there are zero or several, or it is empty.
pub(crate) fn unique_text(root: &Element, name: &str) -> Option<String> {
    match find_all(root, name).as_slice() {
        [only] => only
            .get_text()
            .map(|text| text.into_owned())
            .filter(|text| !text.trim().is_empty()),
        _ => None,
    }
}

fn collect<'a>(element: &'a Element, name: &str, found: &mut Vec<&'a Element>) {
    if element.name == name {
        found.push(element);
    }
    for child in &element.children {
        if let XMLNode::Element(child) = child {
            collect(child, name, found);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn document_order() {
        let root = Element::parse(
            r"<feed>
                <entry><updated>first</updated></entry>
                <updated>second</updated>
              </feed>"
                .as_bytes(),
        )
        .unwrap();

        let found: Vec<_> = find_all(&root, "updated")
            .into_iter()
            .filter_map(|element| element.get_text())
            .collect();

        assert_eq!(found, vec!["first", "second"]);
    }

    #[test]
    fn duplicates_are_not_unique() {
        let root = Element::parse(
            "<Project><PackageId>A</PackageId><PackageId>B</PackageId></Project>".as_bytes(),
        )
        .unwrap();

        assert_eq!(unique_text(&root, "PackageId"), None);
    }

    #[test]
    fn empty_is_not_text() {
        let root =
            Element::parse("<Project><PackageId>  </PackageId></Project>".as_bytes()).unwrap();

        assert_eq!(unique_text(&root, "PackageId"), None);
    }
}

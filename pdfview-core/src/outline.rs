use serde::Serialize;

use crate::engine::OutlineEntry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineNode {
    pub title: String,
    pub target_page: usize,
    pub children: Vec<OutlineNode>,
}

/// Nests a flat outline. An entry at depth `d` becomes a child of the most
/// recent entry at depth `d - 1`; depths that skip levels attach to the
/// deepest open entry. Document order is preserved at every level.
pub fn build_tree(entries: &[OutlineEntry]) -> Vec<OutlineNode> {
    let mut roots = Vec::new();
    let mut open: Vec<OutlineNode> = Vec::new();

    for entry in entries {
        let depth = entry.depth.max(1);
        while open.len() >= depth {
            close_last(&mut open, &mut roots);
        }
        open.push(OutlineNode {
            title: entry.title.clone(),
            target_page: entry.target_page,
            children: Vec::new(),
        });
    }
    while !open.is_empty() {
        close_last(&mut open, &mut roots);
    }
    roots
}

fn close_last(open: &mut Vec<OutlineNode>, roots: &mut Vec<OutlineNode>) {
    if let Some(node) = open.pop() {
        match open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => roots.push(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(depth: usize, title: &str, page: usize) -> OutlineEntry {
        OutlineEntry {
            depth,
            title: title.into(),
            target_page: page,
        }
    }

    fn titles(nodes: &[OutlineNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.title.as_str()).collect()
    }

    #[test]
    fn nests_children_under_previous_shallower_entry() {
        let tree = build_tree(&[entry(1, "Ch1", 1), entry(2, "Ch1.1", 2), entry(1, "Ch2", 5)]);
        assert_eq!(titles(&tree), ["Ch1", "Ch2"]);
        assert_eq!(titles(&tree[0].children), ["Ch1.1"]);
        assert_eq!(tree[0].children[0].target_page, 2);
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn returns_to_outer_levels_in_order() {
        let tree = build_tree(&[
            entry(1, "A", 1),
            entry(2, "A.1", 2),
            entry(3, "A.1.a", 3),
            entry(2, "A.2", 4),
            entry(1, "B", 5),
        ]);
        assert_eq!(titles(&tree), ["A", "B"]);
        assert_eq!(titles(&tree[0].children), ["A.1", "A.2"]);
        assert_eq!(titles(&tree[0].children[0].children), ["A.1.a"]);
    }

    #[test]
    fn skipped_levels_attach_to_deepest_open_entry() {
        let tree = build_tree(&[entry(1, "A", 1), entry(3, "deep", 2)]);
        assert_eq!(titles(&tree[0].children), ["deep"]);
    }

    #[test]
    fn empty_outline_has_no_roots() {
        assert!(build_tree(&[]).is_empty());
    }
}

//! Debug surface: hierarchical tree dumps and a structural checker used
//! by the property tests.

use std::io::{self, Write};

use crate::node::{Node, NodeKind};
use crate::{SubjectTree, NO_PIVOT};

impl<T: std::fmt::Debug> SubjectTree<T> {
    /// Write an indented text rendition of the tree: one line per node
    /// with its kind and prefix, leaves with suffix and value. An empty
    /// tree prints `EMPTY`.
    pub fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match &self.root {
            None => writeln!(w, "EMPTY"),
            Some(root) => Self::dump_node(w, root, 0),
        }
    }

    fn dump_node<W: Write>(w: &mut W, n: &Node<T>, depth: usize) -> io::Result<()> {
        let pad = dump_pad(depth);
        match n {
            Node::Leaf(l) => {
                writeln!(w, "{pad}LEAF: suffix: \"{}\" value: {:?}", l.suffix.escape_ascii(), l.value)
            }
            _ => {
                writeln!(w, "{pad}{}: prefix: \"{}\"", n.kind().name(), n.path().escape_ascii())?;
                let mut result = Ok(());
                n.for_each_child(&mut |_, child| {
                    result = Self::dump_node(w, child, depth + 1);
                    result.is_ok()
                });
                result
            }
        }
    }
}

fn dump_pad(depth: usize) -> String {
    if depth == 0 {
        "-- ".to_string()
    } else {
        let mut pad = "  ".repeat(depth);
        pad.push_str("|__ ");
        pad
    }
}

impl<T> SubjectTree<T> {
    /// Walk the tree and report every structural violation found: child
    /// counts out of a layout's bounds, duplicate pivot keys, Node48
    /// table damage, stray single-child nodes, or mis-keyed children.
    /// Returns an empty list for a healthy tree.
    pub fn verify_integrity(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if let Some(root) = &self.root {
            Self::verify_node(root, true, &mut issues);
        }
        issues
    }

    fn verify_node(n: &Node<T>, is_root: bool, issues: &mut Vec<String>) {
        if let Node::Leaf(l) = n {
            if l.suffix.contains(&NO_PIVOT) {
                issues.push("leaf suffix contains the no-pivot byte".to_string());
            }
            return;
        }

        let cap = match n.kind() {
            NodeKind::Leaf => unreachable!(),
            NodeKind::Node4 => 4,
            NodeKind::Node10 => 10,
            NodeKind::Node16 => 16,
            NodeKind::Node48 => 48,
            NodeKind::Node256 => 256,
        };
        let size = n.num_children();
        if size > cap {
            issues.push(format!("{} holds {size} children (cap {cap})", n.kind().name()));
        }
        if size < 2 && !is_root {
            issues.push(format!("non-root {} has {size} children", n.kind().name()));
        }
        if n.path().contains(&NO_PIVOT) {
            issues.push(format!("{} prefix contains the no-pivot byte", n.kind().name()));
        }

        let mut keys = Vec::with_capacity(size);
        n.for_each_child(&mut |c, child| {
            keys.push(c);
            match child {
                Node::Leaf(l) if c == NO_PIVOT => {
                    if !l.suffix.is_empty() {
                        issues.push("no-pivot child carries a non-empty suffix".to_string());
                    }
                }
                _ if c == NO_PIVOT => {
                    issues.push("no-pivot child is not a leaf".to_string());
                }
                child => {
                    // Every child's path begins with its pivot byte.
                    if child.path().first() != Some(&c) {
                        issues.push(format!(
                            "child keyed {c:#04x} starts with {:?}",
                            child.path().first()
                        ));
                    }
                }
            }
            Self::verify_node(child, false, issues);
            true
        });
        if keys.len() != size {
            issues.push(format!(
                "{} reports {size} children but yields {}",
                n.kind().name(),
                keys.len()
            ));
        }
        let mut deduped = keys.clone();
        deduped.sort_unstable();
        deduped.dedup();
        if deduped.len() != keys.len() {
            issues.push(format!("{} has duplicate pivot keys", n.kind().name()));
        }

        if let Node::Node48(n48) = n {
            // The 1-indexed table must map exactly onto the dense slots.
            for (byte, &slot) in n48.table.iter().enumerate() {
                let slot = slot as usize;
                if slot > n48.size {
                    issues.push(format!("node48 table[{byte:#04x}] = {slot} beyond size"));
                } else if slot > 0 && n48.children[slot - 1].is_none() {
                    issues.push(format!("node48 table[{byte:#04x}] points at an empty slot"));
                }
            }
            let occupied = n48.children.iter().filter(|c| c.is_some()).count();
            if occupied != n48.size {
                issues.push(format!("node48 size {} but {occupied} occupied slots", n48.size));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::SubjectTree;

    #[test]
    fn dump_renders_hierarchy() {
        let mut st: SubjectTree<i32> = SubjectTree::new();
        let mut out = Vec::new();
        st.dump(&mut out).expect("write to vec");
        assert_eq!(out, b"EMPTY\n");

        st.insert(b"foo.bar.A", 1);
        st.insert(b"foo.bar.B", 2);
        st.insert(b"foo.bar", 3);
        let mut out = Vec::new();
        st.dump(&mut out).expect("write to vec");
        let text = String::from_utf8(out).expect("ascii dump");
        assert!(text.starts_with("-- NODE4"), "got: {text}");
        assert!(text.contains("LEAF: suffix: \"\" value: 3"), "got: {text}");
        assert!(text.contains("LEAF: suffix: \"A\" value: 1"), "got: {text}");
        assert!(text.contains("|__ "), "got: {text}");
    }

    #[test]
    fn integrity_clean_after_churn() {
        let mut st: SubjectTree<i32> = SubjectTree::new();
        for i in 0..300 {
            let subj = format!("tenant.{}.device.{}", i % 23, i);
            st.insert(subj.as_bytes(), i);
        }
        for i in (0..300).step_by(3) {
            let subj = format!("tenant.{}.device.{}", i % 23, i);
            assert!(st.delete(subj.as_bytes()).is_some());
        }
        assert_eq!(st.verify_integrity(), Vec::<String>::new());
    }
}

use colored::*;
use lockscan_core::{DependencyTree, NodeId};
use std::io::{self, Write};

/// Box-drawing characters for tree display
mod box_chars {
    pub const VERTICAL: &str = "│ ";
    pub const BRANCH: &str = "├─";
    pub const LAST_BRANCH: &str = "└─";
    pub const SPACE: &str = "  ";
}

pub(super) fn print_tree(out: &mut dyn Write, tree: &DependencyTree) -> io::Result<()> {
    let root = tree.root();
    writeln!(out, "{}@{}", root.name.bold(), root.version)?;
    print_children(out, tree, tree.root_id(), "")?;

    writeln!(out)?;
    writeln!(
        out,
        "{} packages, {} nodes",
        tree.package_count(),
        tree.node_count()
    )
}

fn print_children(
    out: &mut dyn Write,
    tree: &DependencyTree,
    parent: NodeId,
    prefix: &str,
) -> io::Result<()> {
    let children: Vec<_> = tree.children(parent).collect();
    let last = children.len().saturating_sub(1);

    for (i, (id, node)) in children.into_iter().enumerate() {
        let (branch, continuation) = if i == last {
            (box_chars::LAST_BRANCH, box_chars::SPACE)
        } else {
            (box_chars::BRANCH, box_chars::VERTICAL)
        };

        let label = match &node.alias {
            Some(alias) => format!("{} (npm:{}@{})", alias, node.name, node.version),
            None => format!("{}@{}", node.name, node.version),
        };
        let label = if node.is_dev_dependency {
            format!("{} {}", label.dimmed(), "(dev)".dimmed())
        } else {
            label
        };
        writeln!(out, "{}{} {}", prefix, branch, label)?;

        print_children(out, tree, id, &format!("{}{}", prefix, continuation))?;
    }
    Ok(())
}

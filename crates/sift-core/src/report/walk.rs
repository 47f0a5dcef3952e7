use super::ReportNode;
use crate::error::{Error, Result};
use tracing::trace;

/// Outcome of a traversal.
#[derive(Debug, Default)]
pub struct Walk<'a> {
    /// Named lines, in pre-order (parent before children, children in order).
    pub lines: Vec<&'a ReportNode>,

    /// Every node seen, named or not.
    pub visited: usize,
}

/// Walk the tree rooted at `root`, `root` included at depth 0.
pub fn walk(root: &ReportNode, max_depth: usize) -> Result<Walk<'_>> {
    walk_from(std::slice::from_ref(root), 0, max_depth)
}

/// Walk a list of sibling trees whose roots sit at depth 1, e.g. the
/// `subLines` of a report's `resultLine`.
pub fn walk_forest(roots: &[ReportNode], max_depth: usize) -> Result<Walk<'_>> {
    walk_from(roots, 1, max_depth)
}

fn walk_from(roots: &[ReportNode], base: usize, max_depth: usize) -> Result<Walk<'_>> {
    let mut out = Walk::default();

    // explicit work-stack; children are pushed in reverse so they pop in order
    let mut stack: Vec<(&ReportNode, usize)> = roots.iter().rev().map(|n| (n, base)).collect();
    while let Some((node, depth)) = stack.pop() {
        if depth > max_depth {
            return Err(Error::MalformedTree {
                depth,
                limit: max_depth,
            });
        }
        out.visited += 1;

        // unnamed lines are transparent groupings: not emitted, still descended
        match node.name() {
            Some(_) => out.lines.push(node),
            None => trace!("descending through an unnamed line at depth {depth}"),
        }

        stack.extend(node.children.iter().rev().map(|child| (child, depth + 1)));
    }

    Ok(out)
}

//! Symbol nesting derived from range containment.

use std::cmp::Ordering;

use crate::domain::{Symbol, SymbolNode};

/// Build a forest from a flat list of symbols of one file.
///
/// Symbols are sorted by start (ties: wider range first, so a container
/// precedes what it contains) and walked once with a stack of open
/// ancestors. A node is attached to the node beneath it on the stack when it
/// is popped, so children end up in sorted-start order.
///
/// Ranges are assumed properly nested; partial overlaps are not detected.
pub fn build_symbol_hierarchy(mut symbols: Vec<Symbol>) -> Vec<SymbolNode> {
    symbols.sort_by(|a, b| {
        let (a, b) = (&a.location.range, &b.location.range);
        a.start.cmp(&b.start).then_with(|| b.end.cmp(&a.end))
    });

    let mut roots = Vec::new();
    let mut stack: Vec<SymbolNode> = Vec::new();

    for symbol in symbols {
        while let Some(top) = stack.last() {
            if top.symbol.location.range.includes(&symbol.location.range) {
                break;
            }
            close_top(&mut stack, &mut roots);
        }
        stack.push(SymbolNode::leaf(symbol));
    }
    while !stack.is_empty() {
        close_top(&mut stack, &mut roots);
    }

    roots
}

fn close_top(stack: &mut Vec<SymbolNode>, roots: &mut Vec<SymbolNode>) {
    let Some(node) = stack.pop() else {
        return;
    };
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

/// Find the tightest symbol enclosing `target`, other than `target` itself.
///
/// A candidate spanning exactly the target's range is the target's own
/// table slot and never counts as its container.
///
/// Linear scan. Among enclosing candidates a narrower one replaces a wider
/// one. When two candidates do not nest, the one with the smaller span wins,
/// then the one starting later, so the result does not depend on iteration
/// order.
pub fn find_enclosing_symbol<'a, I>(symbols: I, target: &Symbol) -> Option<&'a Symbol>
where
    I: IntoIterator<Item = &'a Symbol>,
{
    let target_range = &target.location.range;
    let mut best: Option<&'a Symbol> = None;

    for candidate in symbols {
        let range = &candidate.location.range;
        if range == target_range || !range.includes(target_range) {
            continue;
        }
        best = match best {
            None => Some(candidate),
            Some(current) if is_tighter(candidate, current) => Some(candidate),
            keep => keep,
        };
    }

    best
}

fn is_tighter(candidate: &Symbol, current: &Symbol) -> bool {
    let (candidate, current) = (&candidate.location.range, &current.location.range);
    if candidate == current {
        return false;
    }
    if current.includes(candidate) {
        return true;
    }
    if candidate.includes(current) {
        return false;
    }
    match candidate.span_key().cmp(&current.span_key()) {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => candidate.start > current.start,
    }
}

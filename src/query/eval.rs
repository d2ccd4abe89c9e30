//! Query evaluation over a resident tree

use super::parser::{CompareOp, Operand, Query, Selector, Term};
use crate::core::glob::glob_match;
use crate::dom::Element;

/// No depth limit
pub const UNLIMITED_DEPTH: usize = usize::MAX;

/// Descendants of `origin` that satisfy every term, in pre-order
///
/// The `!` selector sees `origin/child/.../element`. `depth` 0 considers
/// only the immediate children. Paged-out children are skipped; callers
/// reload the tree first when it may be paged.
pub fn select<'a>(origin: &'a Element, query: &Query, depth: usize) -> Vec<&'a Element> {
    let mut results = Vec::new();
    let mut path = origin.name().to_string();

    // (element, level below origin's children, length of the parent's path)
    let mut stack: Vec<(&'a Element, usize, usize)> = Vec::new();
    push_children(&mut stack, origin, 0, path.len());

    while let Some((element, level, mark)) = stack.pop() {
        path.truncate(mark);
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(element.name());

        if query.terms.iter().all(|term| holds(term, element, &path)) {
            results.push(element);
        }
        if level < depth {
            push_children(&mut stack, element, level + 1, path.len());
        }
    }
    results
}

/// Push resident children in reverse so they pop in document order
fn push_children<'a>(
    stack: &mut Vec<(&'a Element, usize, usize)>,
    parent: &'a Element,
    level: usize,
    mark: usize,
) {
    let children = parent.children().iter().rev().filter_map(|c| c.resident());
    stack.extend(children.map(|child| (child, level, mark)));
}

fn holds(term: &Term, element: &Element, path: &str) -> bool {
    let value = match &term.selector {
        Selector::Attribute(name) => element.attribute(name).unwrap_or(""),
        Selector::Name => element.name(),
        Selector::Path => path,
        Selector::Content(n) => element.content_text(*n).unwrap_or(""),
    };

    match (&term.operand, term.op) {
        (Operand::Pattern(p), CompareOp::Eq) => glob_match(p, value),
        (Operand::Pattern(p), CompareOp::Ne) => !glob_match(p, value),
        // Ordering a glob has no meaning
        (Operand::Pattern(_), _) => false,
        (Operand::Invalid(_), _) => false,
        (Operand::Number(n), op) => match value.trim().parse::<i64>() {
            Ok(v) => match op {
                CompareOp::Eq => v == *n,
                CompareOp::Ne => v != *n,
                CompareOp::Lt => v < *n,
                CompareOp::Le => v <= *n,
                CompareOp::Gt => v > *n,
                CompareOp::Ge => v >= *n,
            },
            Err(_) => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, attrs: &[(&str, &str)]) -> Element {
        let mut e = Element::new(name);
        for (k, v) in attrs {
            e.set_attribute(*k, *v);
        }
        e
    }

    fn names(found: &[&Element]) -> Vec<String> {
        found.iter().map(|e| e.name().to_string()).collect()
    }

    fn run(root: &Element, expr: &str, depth: usize) -> Vec<String> {
        names(&select(root, &Query::parse(expr).unwrap(), depth))
    }

    #[test]
    fn test_and_semantics() {
        let mut root = Element::new("root");
        root.add_element(item("e1", &[("a", "x"), ("b", "1")]));
        root.add_element(item("e2", &[("a", "x"), ("b", "2")]));
        assert_eq!(run(&root, r#"a == "x" b == "1""#, 0), ["e1"]);
        assert_eq!(run(&root, r#"a == "x""#, 0), ["e1", "e2"]);
    }

    #[test]
    fn test_depth_and_preorder() {
        let mut root = Element::new("root");
        let mut a = item("a", &[]);
        let mut b = item("b", &[]);
        b.add_element(item("c", &[]));
        a.add_element(b);
        root.add_element(a);
        root.add_element(item("d", &[]));

        assert_eq!(run(&root, "", 0), ["a", "d"]);
        assert_eq!(run(&root, "", 1), ["a", "b", "d"]);
        assert_eq!(run(&root, "", UNLIMITED_DEPTH), ["a", "b", "c", "d"]);
    }

    #[test]
    fn test_name_and_path_selectors() {
        let mut root = Element::new("root");
        let mut list = item("List", &[]);
        list.add_element(item("Item", &[]));
        root.add_element(list);

        assert_eq!(run(&root, r#"? == "item""#, UNLIMITED_DEPTH), ["Item"]);
        assert_eq!(run(&root, r#"! == "*/list/*""#, UNLIMITED_DEPTH), ["Item"]);
        assert_eq!(run(&root, r#"! == "root/List""#, UNLIMITED_DEPTH), ["List"]);
    }

    #[test]
    fn test_numeric_comparisons() {
        let mut root = Element::new("root");
        for (name, n) in [("one", "1"), ("five", " 5 "), ("nan", "abc")] {
            root.add_element(item(name, &[("n", n)]));
        }
        assert_eq!(run(&root, "n > 1", 0), ["five"]);
        assert_eq!(run(&root, "n <= 5", 0), ["one", "five"]);
        assert_eq!(run(&root, "n != 1", 0), ["five"]);
        // Missing attribute compares as empty, which is not a number
        assert!(run(&root, "missing == 0", 0).is_empty());
    }

    #[test]
    fn test_non_integer_operand_never_holds() {
        let mut root = Element::new("root");
        root.add_element(item("a", &[("n", "abc")]));
        assert!(run(&root, "n < abc", 0).is_empty());
        assert!(run(&root, "n == abc", 0).is_empty());
        assert!(run(&root, "n != abc", 0).is_empty());
    }

    #[test]
    fn test_deep_chain_walk() {
        let mut chain = Element::new("leaf");
        for _ in 0..5000 {
            let mut parent = Element::new("n");
            parent.add_element(chain);
            chain = parent;
        }
        let found = run(&chain, r#"? == "leaf""#, UNLIMITED_DEPTH);
        assert_eq!(found, ["leaf"]);
        assert_eq!(run(&chain, "", 2), ["n", "n", "n"]);
    }

    #[test]
    fn test_ordering_operator_with_pattern_is_false() {
        let mut root = Element::new("root");
        root.add_element(item("a", &[("v", "x")]));
        assert!(run(&root, r#"v < "x""#, 0).is_empty());
        assert_eq!(run(&root, r#"missing == """#, 0), ["a"]);
    }

    #[test]
    fn test_content_selector() {
        let mut root = Element::new("root");
        let mut p = item("p", &[]);
        p.add_content("Hello");
        p.add_element(item("br", &[]));
        p.add_content("42");
        root.add_element(p);
        assert_eq!(run(&root, r#"~0 == "hel*""#, 0), ["p"]);
        assert_eq!(run(&root, "~1 == 42", 0), ["p"]);
        assert!(run(&root, r#"~2 == "?*""#, 0).is_empty());
    }
}

//! Proptest strategies for element trees
//!
//! Generated trees survive a compact text round trip: names are plain ASCII,
//! each insertion position holds at most one text run, and comment and CDATA
//! text cannot contain their terminators.

use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;

use super::Element;

type Attributes = Vec<(String, String)>;
type Slot = (Option<String>, Option<String>, Option<String>, Element);

fn attributes() -> impl Strategy<Value = Attributes> {
    vec(("[a-z]{1,4}", "\\PC{0,8}"), 0..3)
}

fn build(name: String, attributes: Attributes, slots: Vec<Slot>, tail: Option<String>) -> Element {
    let mut element = Element::new(name);
    for (name, value) in attributes {
        element.set_attribute(name, value);
    }
    for (comment, cdata, text, child) in slots {
        if let Some(comment) = comment {
            element.add_comment(comment);
        }
        if let Some(cdata) = cdata {
            element.add_cdata(cdata);
        }
        if let Some(text) = text {
            element.add_content(text);
        }
        element.add_element(child);
    }
    if let Some(text) = tail {
        element.add_content(text);
    }
    element
}

/// Trees up to four levels deep with attributes, text, comments and CDATA
pub(crate) fn element() -> impl Strategy<Value = Element> {
    let leaf = ("[a-z]{1,6}", attributes(), option::of("\\PC{1,12}"))
        .prop_map(|(name, attributes, text)| build(name, attributes, Vec::new(), text));

    leaf.prop_recursive(4, 48, 4, |inner| {
        let slot = (
            option::of("[a-z &]{0,8}"),
            option::of("[a-z &]{0,8}"),
            option::of("\\PC{1,12}"),
            inner,
        );
        ("[a-z]{1,6}", attributes(), vec(slot, 0..4), option::of("\\PC{1,12}"))
            .prop_map(|(name, attributes, slots, tail)| build(name, attributes, slots, tail))
    })
}

use crate::model::{ContentKind, ListType};

use super::tree::{ContentNode, ItemChild, ListNode, MarkerNode, ViewNode, ViewTree};

/// Renders the view tree as an HTML fragment.
pub fn to_html(tree: &ViewTree) -> String {
    let mut out = String::new();
    for node in &tree.nodes {
        match node {
            ViewNode::Block(content) => write_content(&mut out, content),
            ViewNode::List(list) => write_list(&mut out, list),
        }
    }
    out
}

/// `type` attribute value for ordered list styles that have one.
fn ordered_type(style: &str) -> Option<&'static str> {
    match style {
        "decimal" => Some("1"),
        "lower-roman" => Some("i"),
        "upper-roman" => Some("I"),
        "lower-alpha" | "lower-latin" => Some("a"),
        "upper-alpha" | "upper-latin" => Some("A"),
        _ => None,
    }
}

fn write_list(out: &mut String, list: &ListNode) {
    let tag = list.list_type.container_tag();
    out.push('<');
    out.push_str(tag);
    if let ListType::Custom(name) = &list.list_type {
        out.push_str(&format!(
            " class=\"{}-list\"",
            html_escape::encode_double_quoted_attribute(name)
        ));
    }
    if let Some(style) = &list.style {
        if list.list_type.is_ordered()
            && let Some(kind) = ordered_type(style)
        {
            out.push_str(&format!(" type=\"{kind}\""));
        }
        out.push_str(&format!(
            " style=\"list-style-type:{}\"",
            html_escape::encode_double_quoted_attribute(style)
        ));
    }
    if list.list_type.is_ordered() {
        if let Some(start) = list.start {
            out.push_str(&format!(" start=\"{start}\""));
        }
        if list.reversed == Some(true) {
            out.push_str(" reversed");
        }
    }
    out.push('>');

    for item in &list.items {
        out.push_str("<li>");
        for child in &item.children {
            match child {
                ItemChild::Marker(marker) => write_marker(out, marker),
                ItemChild::Content(content) => write_content(out, content),
                ItemChild::List(nested) => write_list(out, nested),
            }
        }
        out.push_str("</li>");
    }
    out.push_str(&format!("</{tag}>"));
}

fn write_marker(out: &mut String, marker: &MarkerNode) {
    out.push_str(&format!(
        "<span class=\"marker marker-{}\">{}</span>",
        html_escape::encode_double_quoted_attribute(&marker.strategy),
        html_escape::encode_text(&marker.text)
    ));
}

fn write_content(out: &mut String, content: &ContentNode) {
    let text = html_escape::encode_text(&content.text);
    match &content.kind {
        ContentKind::HorizontalRule => out.push_str("<hr>"),
        ContentKind::Image => out.push_str(&format!(
            "<img alt=\"{}\">",
            html_escape::encode_double_quoted_attribute(&content.text)
        )),
        ContentKind::CodeBlock { language } => {
            out.push_str("<pre><code");
            if let Some(language) = language {
                out.push_str(&format!(
                    " class=\"language-{}\"",
                    html_escape::encode_double_quoted_attribute(language)
                ));
            }
            out.push('>');
            for marker in &content.markers {
                write_marker(out, marker);
            }
            out.push_str(&format!("{text}</code></pre>"));
        }
        kind => {
            let tag = kind.tag();
            out.push_str(&format!("<{tag}>"));
            for marker in &content.markers {
                write_marker(out, marker);
            }
            out.push_str(&format!("{text}</{tag}>"));
        }
    }
}

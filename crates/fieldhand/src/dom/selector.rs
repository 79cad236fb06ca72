// ABOUTME: CSS selector synthesis for an element the user picked.
// ABOUTME: Tries #id, then a document-unique tag.class selector, then a capped nth-of-type path.

use scraper::{ElementRef, Html, Selector};

/// Maximum number of ancestors added above the picked element in a path selector.
pub const MAX_ANCESTOR_LEVELS: usize = 5;

/// Builds a selector that locates `element`, best effort.
///
/// 1. `#id` when the element has an id.
/// 2. `tag.class1.class2` when that matches exactly one element in `doc`.
/// 3. A `>`-joined path of `tag` / `tag:nth-of-type(n)` steps, anchored at the
///    nearest ancestor with an id and capped at [`MAX_ANCESTOR_LEVELS`].
///
/// The result is not guaranteed to be unique on later loads of a similar page.
pub fn synthesize_selector(doc: &Html, element: ElementRef<'_>) -> String {
    if let Some(id) = element_id(&element) {
        return format!("#{}", css_escape(id));
    }

    if let Some(selector) = unique_class_selector(doc, &element) {
        return selector;
    }

    path_selector(element)
}

fn element_id<'a>(element: &ElementRef<'a>) -> Option<&'a str> {
    element.value().id().filter(|id| !id.is_empty())
}

fn unique_class_selector(doc: &Html, element: &ElementRef<'_>) -> Option<String> {
    let mut selector = element.value().name().to_string();
    let mut has_class = false;
    let classes = element.value().attr("class").unwrap_or("");
    for class in classes.split_ascii_whitespace() {
        selector.push('.');
        selector.push_str(&css_escape(class));
        has_class = true;
    }
    if !has_class {
        return None;
    }

    let compiled = Selector::parse(&selector).ok()?;
    if doc.select(&compiled).take(2).count() == 1 {
        Some(selector)
    } else {
        None
    }
}

fn path_selector(element: ElementRef<'_>) -> String {
    let mut path = Vec::new();
    let mut current = Some(element);

    while let Some(el) = current {
        if let Some(id) = element_id(&el) {
            path.push(format!("#{}", css_escape(id)));
            break;
        }

        let tag = el.value().name();
        let nth = nth_of_type(&el);
        if nth > 1 {
            path.push(format!("{}:nth-of-type({})", tag, nth));
        } else {
            path.push(tag.to_string());
        }

        if path.len() > MAX_ANCESTOR_LEVELS {
            break;
        }
        current = el.parent().and_then(ElementRef::wrap);
    }

    path.reverse();
    path.join(" > ")
}

/// 1-based position of the element among its element siblings sharing its tag.
fn nth_of_type(element: &ElementRef<'_>) -> usize {
    let tag = element.value().name();
    1 + element
        .prev_siblings()
        .filter_map(ElementRef::wrap)
        .filter(|sibling| sibling.value().name() == tag)
        .count()
}

/// Escapes an id or class name so it can be embedded in a selector.
///
/// Plain identifiers are returned unchanged.
pub fn css_escape(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    for (i, c) in ident.chars().enumerate() {
        let leading_digit = c.is_ascii_digit()
            && (i == 0 || (i == 1 && ident.starts_with('-')));
        if leading_digit {
            out.push_str(&format!("\\{:x} ", c as u32));
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    if out == "-" {
        return "\\-".to_string();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn synth(html: &str, target: &str) -> String {
        let doc = Html::parse_document(html);
        let sel = Selector::parse(target).unwrap();
        let el = doc.select(&sel).next().unwrap();
        synthesize_selector(&doc, el)
    }

    fn count_matches(html: &str, selector: &str) -> usize {
        let doc = Html::parse_document(html);
        doc.select(&Selector::parse(selector).unwrap()).count()
    }

    #[test]
    fn test_id_wins() {
        let html = r#"<div class="card"><span id="phone" class="v">1</span></div>"#;
        assert_eq!(synth(html, "span"), "#phone");
    }

    #[test]
    fn test_unique_class_selector() {
        let html = r#"<div><span class="label">a</span><span class="value big">b</span></div>"#;
        assert_eq!(synth(html, "span.value"), "span.value.big");
    }

    #[test]
    fn test_class_order_follows_document() {
        let html = r#"<ul><li class="zeta alpha mid">x</li><li class="alpha">y</li></ul>"#;
        assert_eq!(synth(html, "li.zeta"), "li.zeta.alpha.mid");
    }

    #[test]
    fn test_shared_class_falls_through_to_path() {
        let html = r#"<body><p class="item">one</p><p class="item">two</p></body>"#;
        let selector = synth(html, "p.item:nth-of-type(2)");
        assert_eq!(selector, "html > body > p:nth-of-type(2)");
        assert_eq!(count_matches(html, &selector), 1);
    }

    #[test]
    fn test_nth_of_type_counts_same_tag_only() {
        let html = r#"<body>
            <div class="row"><span>a</span></div>
            <h2>title</h2>
            <div class="row"><span>b</span><span class="x">c</span></div>
        </body>"#;
        let selector = synth(html, "h2 + div span:first-child");
        assert_eq!(selector, "html > body > div:nth-of-type(2) > span");
    }

    #[test]
    fn test_ancestor_id_anchors_path() {
        let html = r#"<div id="contact"><ul><li>a</li><li>b</li></ul></div>"#;
        assert_eq!(
            synth(html, "li:nth-of-type(2)"),
            "#contact > ul > li:nth-of-type(2)"
        );
    }

    #[test]
    fn test_path_is_capped() {
        let html = "<div><div><div><div><div><div><div><div><em>deep</em></div></div></div></div></div></div></div></div>";
        let selector = synth(html, "em");
        let segments: Vec<&str> = selector.split(" > ").collect();
        assert_eq!(segments.len(), MAX_ANCESTOR_LEVELS + 1);
        assert_eq!(segments.last(), Some(&"em"));
        assert!(segments[..MAX_ANCESTOR_LEVELS].iter().all(|s| *s == "div"));
    }

    #[test]
    fn test_odd_ids_are_escaped() {
        let html = r#"<p id="1st:item">x</p><b class="a/b">y</b>"#;
        let id_sel = synth(html, "p");
        assert_eq!(id_sel, "#\\31 st\\:item");
        assert_eq!(count_matches(html, &id_sel), 1);

        let class_sel = synth(html, "b");
        assert_eq!(class_sel, "b.a\\/b");
        assert_eq!(count_matches(html, &class_sel), 1);
    }

    #[test]
    fn test_css_escape_plain_idents_unchanged() {
        assert_eq!(css_escape("phone-number_2"), "phone-number_2");
        assert_eq!(css_escape("-x"), "-x");
        assert_eq!(css_escape("-"), "\\-");
    }
}

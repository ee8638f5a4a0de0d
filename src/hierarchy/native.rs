//! Native UI-automation XML (uiautomator style dumps)

use super::{attach, BoundingBox, CanonicalNode, NormalizeOptions};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// The attributes we care about on a dumped `<node>`.
#[derive(Debug, Default)]
struct NativeAttrs {
    class: String,
    bounds: String,
    visible_to_user: String,
    text: String,
    clickable: String,
    long_clickable: String,
    checkable: String,
}

impl NativeAttrs {
    fn parse(element: &BytesStart<'_>) -> Result<Self, String> {
        let mut attrs = Self::default();
        for attr in element.attributes() {
            let attr = attr.map_err(|e| format!("bad attribute: {}", e))?;
            let slot = match attr.key.as_ref() {
                b"class" => &mut attrs.class,
                b"bounds" => &mut attrs.bounds,
                b"visible-to-user" => &mut attrs.visible_to_user,
                b"text" => &mut attrs.text,
                b"clickable" => &mut attrs.clickable,
                b"long-clickable" => &mut attrs.long_clickable,
                b"checkable" => &mut attrs.checkable,
                _ => continue,
            };
            *slot = attr
                .unescape_value()
                .map_err(|e| format!("bad attribute value: {}", e))?
                .into_owned();
        }
        Ok(attrs)
    }

    /// Layout containers, scrollers, groups, hidden nodes and empty text labels are not views.
    fn passes_visibility(&self, naive: bool) -> bool {
        let class = self.class.as_str();
        let short_name = class.rsplit('.').next().unwrap_or(class);
        if class.ends_with("Layout") || short_name.starts_with("Scroll") || class.ends_with("Group")
        {
            return false;
        }
        if !naive && !self.visible_to_user.starts_with('t') {
            return false;
        }
        if class.ends_with("TextView") && self.text.trim().is_empty() {
            return false;
        }
        true
    }

    fn into_node(self, options: &NormalizeOptions) -> Option<CanonicalNode> {
        if options.only_visible && !self.passes_visibility(options.naive) {
            return None;
        }
        let bbox = parse_bounds(&self.bounds)?;
        let visible = options.only_visible || self.visible_to_user.starts_with('t');
        let interactable = self.clickable.starts_with('t')
            || self.long_clickable.starts_with('t')
            || self.checkable.starts_with('t');

        Some(CanonicalNode {
            label: self.class,
            bbox,
            visible,
            text: self.text,
            interactable,
            children: Vec::new(),
        })
    }
}

/// Parse `[x1,y1][x2,y2]`.
pub(crate) fn parse_bounds(raw: &str) -> Option<BoundingBox> {
    let raw = raw.trim();
    if !raw.starts_with('[') || !raw.ends_with(']') {
        return None;
    }
    let coords = raw
        .split(['[', ']', ','])
        .filter(|part| !part.trim().is_empty())
        .map(|part| part.trim().parse::<i64>().ok())
        .collect::<Option<Vec<_>>>()?;
    match coords.as_slice() {
        [x1, y1, x2, y2] => BoundingBox::new(*x1, *y1, *x2, *y2),
        _ => None,
    }
}

/// Dump tools sometimes print a status line before the document.
fn strip_preamble(raw: &str) -> Option<&str> {
    let start = raw.find('<')?;
    let end = raw.rfind('>')?;
    (start < end).then(|| &raw[start..=end])
}

pub(super) fn read_nodes(
    raw: &str,
    options: &NormalizeOptions,
) -> Result<Vec<CanonicalNode>, String> {
    let xml = strip_preamble(raw).ok_or_else(|| "no markup found".to_string())?;
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut nodes = Vec::new();
    // nearest retained ancestor of every open element
    let mut open: Vec<Option<usize>> = Vec::new();
    let mut seen_root = false;
    let mut depth_warned = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {}", reader.error_position(), e))?;

        match event {
            Event::Start(ref element) | Event::Empty(ref element) => {
                let self_closing = matches!(event, Event::Empty(_));
                let parent = open.last().copied().flatten();

                let retained = if open.is_empty() {
                    if seen_root {
                        return Err("multiple root elements".to_string());
                    }
                    seen_root = true;
                    None
                } else if open.len() > options.max_depth {
                    if !depth_warned {
                        log::warn!("hierarchy deeper than {} levels, ignoring the rest", options.max_depth);
                        depth_warned = true;
                    }
                    None
                } else {
                    NativeAttrs::parse(element)?
                        .into_node(options)
                        .map(|node| attach(&mut nodes, parent, node))
                };

                if !self_closing {
                    open.push(retained.or(parent));
                }
            }
            Event::End(_) => {
                open.pop().ok_or_else(|| "unexpected closing tag".to_string())?;
            }
            Event::Eof => {
                if !open.is_empty() {
                    return Err(format!("{} element(s) left unclosed", open.len()));
                }
                if !seen_root {
                    return Err("no root element".to_string());
                }
                break;
            }
            _ => {}
        }
    }

    Ok(nodes)
}

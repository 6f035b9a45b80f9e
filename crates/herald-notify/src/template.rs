//! `{{var}}` template rendering.

use std::collections::BTreeMap;

/// Variable name to value.
pub type Variables = BTreeMap<String, String>;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Renders `template`, replacing each `{{name}}` with its value in `vars`.
///
/// The template is scanned once, left to right. Placeholders without a value
/// are copied through verbatim (`{{missing}}` stays `{{missing}}`), and
/// substituted values are never rescanned.
pub fn render(template: &str, vars: &Variables) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];

        let Some(end) = after_open.find(CLOSE) else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = &after_open[..end];
        if name.contains(OPEN) {
            // `{{a {{b}}`: the first opener is literal text.
            out.push_str(OPEN);
            rest = after_open;
            continue;
        }

        match vars.get(name) {
            Some(value) => out.push_str(value),
            None => {
                out.push_str(OPEN);
                out.push_str(name);
                out.push_str(CLOSE);
            }
        }
        rest = &after_open[end + CLOSE.len()..];
    }

    out.push_str(rest);
    out
}

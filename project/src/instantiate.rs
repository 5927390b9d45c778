//! Text for instantiating an entity in a VHDL architecture body.

use vhdl_types::{Entity, EntityInterface, InterfaceItem};

/// Default instance label.
const DEFAULT_INSTANCE: &str = "inst";
const INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstantiationStyle {
    /// Plain text, associations left empty.
    #[default]
    Plain,
    /// Editor snippet: instance label and every association are tab stops.
    Snippet,
}

/// Renders an entity instantiation.
///
/// ```text
/// u_fifo: entity work.fifo
///   generic map (
///     DEPTH => 
///   )
///   port map (
///     clk => ,
///     din => 
///   );
/// ```
///
/// A map with no items is left out entirely.
#[must_use]
pub fn instantiation(
    entity: &Entity,
    interface: &EntityInterface,
    instance: Option<&str>,
    style: InstantiationStyle,
) -> String {
    let instance = instance.unwrap_or(DEFAULT_INSTANCE);
    // Tab stop 1 is the label; associations follow.
    let mut next_stop = 2;

    let mut out = match style {
        InstantiationStyle::Plain => format!("{instance}: entity {}", entity.qualified_name()),
        InstantiationStyle::Snippet => {
            format!("${{1:{instance}}}: entity {}", entity.qualified_name())
        }
    };
    if !interface.generics.is_empty() {
        out.push('\n');
        push_map(&mut out, "generic map", &interface.generics, style, &mut next_stop);
    }
    if !interface.ports.is_empty() {
        out.push('\n');
        push_map(&mut out, "port map", &interface.ports, style, &mut next_stop);
    }
    out.push_str(";\n");
    out
}

fn push_map(
    out: &mut String,
    keyword: &str,
    items: &[InterfaceItem],
    style: InstantiationStyle,
    next_stop: &mut usize,
) {
    out.push_str(&format!("{INDENT}{keyword} (\n"));
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!("{INDENT}{INDENT}{} => ", item.name));
        if style == InstantiationStyle::Snippet {
            out.push_str(&format!("${{{next_stop}}}"));
            *next_stop += 1;
        }
        if i + 1 < items.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str(&format!("{INDENT})"));
}

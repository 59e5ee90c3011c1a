//! UPPAAL NTA rendering.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{Automaton, LocationKind, NetworkDescription};
use crate::error::{Error, Result};

const DOCTYPE: &str = "nta PUBLIC '-//Uppaal Team//DTD Flat System 1.1//EN' \
'http://www.it.uu.se/research/group/darts/uppaal/flat-1_2.dtd'";

type XmlWriter = Writer<Vec<u8>>;

/// Render the network as an UPPAAL XML document with embedded queries.
pub fn render_xml(net: &NetworkDescription) -> Result<String> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
    emit(&mut w, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    emit(&mut w, Event::DocType(BytesText::from_escaped(DOCTYPE)))?;
    emit(&mut w, Event::Start(BytesStart::new("nta")))?;
    text_element(&mut w, "declaration", &net.declarations)?;

    for (idx, automaton) in net.automata.iter().enumerate() {
        render_template(&mut w, idx, automaton)?;
    }

    let names: Vec<&str> = net.automata.iter().map(|a| a.name.as_str()).collect();
    text_element(&mut w, "system", &format!("system {};", names.join(", ")))?;

    emit(&mut w, Event::Start(BytesStart::new("queries")))?;
    for q in &net.queries {
        emit(&mut w, Event::Start(BytesStart::new("query")))?;
        text_element(&mut w, "formula", &q.formula)?;
        text_element(&mut w, "comment", &q.name)?;
        emit(&mut w, Event::End(BytesEnd::new("query")))?;
    }
    emit(&mut w, Event::End(BytesEnd::new("queries")))?;
    emit(&mut w, Event::End(BytesEnd::new("nta")))?;

    let mut bytes = w.into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).map_err(|e| Error::Xml(format!("output is not UTF-8: {}", e)))
}

/// Render the query file `verifyta` reads alongside the model, one
/// formula per line in query order.
pub fn render_queries(net: &NetworkDescription) -> String {
    let mut out = String::new();
    for q in &net.queries {
        out.push_str(&format!("// {}\n{}\n", q.name, q.formula));
    }
    out
}

fn render_template(w: &mut XmlWriter, idx: usize, a: &Automaton) -> Result<()> {
    let loc_id = |l: usize| format!("id{}_{}", idx, l);

    emit(w, Event::Start(BytesStart::new("template")))?;
    text_element(w, "name", &a.name)?;
    if !a.clocks.is_empty() {
        text_element(w, "declaration", &format!("clock {};", a.clocks.join(", ")))?;
    }
    for (l, loc) in a.locations.iter().enumerate() {
        let id = loc_id(l);
        let x = (l * 160).to_string();
        let mut start = BytesStart::new("location");
        start.push_attribute(("id", id.as_str()));
        start.push_attribute(("x", x.as_str()));
        start.push_attribute(("y", "0"));
        emit(w, Event::Start(start))?;
        text_element(w, "name", &loc.name)?;
        if let Some(inv) = &loc.invariant {
            label(w, "invariant", inv)?;
        }
        match loc.kind {
            LocationKind::Normal => {}
            LocationKind::Committed => emit(w, Event::Empty(BytesStart::new("committed")))?,
            LocationKind::Urgent => emit(w, Event::Empty(BytesStart::new("urgent")))?,
        }
        emit(w, Event::End(BytesEnd::new("location")))?;
    }

    let init = loc_id(a.init);
    let mut init_ref = BytesStart::new("init");
    init_ref.push_attribute(("ref", init.as_str()));
    emit(w, Event::Empty(init_ref))?;

    for e in &a.edges {
        emit(w, Event::Start(BytesStart::new("transition")))?;
        for (tag, l) in [("source", e.from), ("target", e.to)] {
            let id = loc_id(l);
            let mut node = BytesStart::new(tag);
            node.push_attribute(("ref", id.as_str()));
            emit(w, Event::Empty(node))?;
        }
        if let Some(g) = &e.guard {
            label(w, "guard", g)?;
        }
        if let Some(s) = &e.sync {
            label(w, "synchronisation", s)?;
        }
        if let Some(u) = &e.update {
            label(w, "assignment", u)?;
        }
        emit(w, Event::End(BytesEnd::new("transition")))?;
    }
    emit(w, Event::End(BytesEnd::new("template")))
}

fn label(w: &mut XmlWriter, kind: &str, text: &str) -> Result<()> {
    let mut start = BytesStart::new("label");
    start.push_attribute(("kind", kind));
    emit(w, Event::Start(start))?;
    emit(w, Event::Text(BytesText::new(text)))?;
    emit(w, Event::End(BytesEnd::new("label")))
}

fn text_element(w: &mut XmlWriter, tag: &str, text: &str) -> Result<()> {
    emit(w, Event::Start(BytesStart::new(tag)))?;
    emit(w, Event::Text(BytesText::new(text)))?;
    emit(w, Event::End(BytesEnd::new(tag)))
}

fn emit(w: &mut XmlWriter, event: Event<'_>) -> Result<()> {
    w.write_event(event)
        .map_err(|e| Error::Xml(format!("write error: {}", e)))
}

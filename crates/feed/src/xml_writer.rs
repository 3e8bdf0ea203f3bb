//! Minimal hand-rolled XML writer.
//!
//! The feed DTD is small and fixed, so this favors direct string
//! building with an escaping helper over pulling in a generic writer
//! crate for a handful of element shapes.

use std::fmt::Write as _;

#[derive(Debug, Default)]
pub struct XmlWriter {
    buf: String,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self { buf: String::new() }
    }

    pub fn declaration(&mut self, encoding: &str) -> &mut Self {
        let _ = write!(self.buf, "<?xml version=\"1.0\" encoding=\"{encoding}\"?>\n");
        self
    }

    pub fn raw(&mut self, text: &str) -> &mut Self {
        self.buf.push_str(text);
        self
    }

    pub fn open_tag(&mut self, name: &str, attrs: &[(&str, &str)]) -> &mut Self {
        let _ = write!(self.buf, "<{name}");
        for (k, v) in attrs {
            let _ = write!(self.buf, " {k}=\"{}\"", escape_attr(v));
        }
        self.buf.push('>');
        self
    }

    pub fn self_closing_tag(&mut self, name: &str, attrs: &[(&str, &str)]) -> &mut Self {
        let _ = write!(self.buf, "<{name}");
        for (k, v) in attrs {
            let _ = write!(self.buf, " {k}=\"{}\"", escape_attr(v));
        }
        self.buf.push_str("/>");
        self
    }

    pub fn close_tag(&mut self, name: &str) -> &mut Self {
        let _ = write!(self.buf, "</{name}>");
        self
    }

    pub fn text(&mut self, text: &str) -> &mut Self {
        self.buf.push_str(&escape_text(text));
        self
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_reserved_characters_in_text() {
        let mut w = XmlWriter::new();
        w.open_tag("a", &[]).text("<tag> & \"quoted\"").close_tag("a");
        assert_eq!(w.into_string(), "<a>&lt;tag&gt; &amp; \"quoted\"</a>");
    }

    #[test]
    fn escapes_quotes_in_attributes() {
        let mut w = XmlWriter::new();
        w.self_closing_tag("meta", &[("name", "a\"b")]);
        assert_eq!(w.into_string(), "<meta name=\"a&quot;b\"/>");
    }

    #[test]
    fn declaration_includes_encoding() {
        let mut w = XmlWriter::new();
        w.declaration("UTF-8");
        assert!(w.into_string().starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    }
}

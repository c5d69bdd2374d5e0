//! Minimal XML writer for the report documents.
//!
//! Output layout is one element per line without indentation, preceded by the
//! declaration. The host reads these files with a plain XML parser, so only
//! attribute escaping matters.

pub const DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

#[derive(Debug, Default)]
pub struct XmlWriter {
    out: String,
    open: Vec<&'static str>,
}

impl XmlWriter {
    pub fn new() -> Self {
        let mut out = String::from(DECLARATION);
        out.push('\n');
        Self {
            out,
            open: Vec::new(),
        }
    }

    pub fn open(&mut self, name: &'static str, attributes: &[(&str, &str)]) -> &mut Self {
        self.tag(name, attributes, false);
        self.open.push(name);
        self
    }

    pub fn empty(&mut self, name: &'static str, attributes: &[(&str, &str)]) -> &mut Self {
        self.tag(name, attributes, true);
        self
    }

    pub fn close(&mut self) -> &mut Self {
        if let Some(name) = self.open.pop() {
            self.out.push_str("</");
            self.out.push_str(name);
            self.out.push_str(">\n");
        }
        self
    }

    /// Close every open element and return the document.
    pub fn finish(mut self) -> String {
        while !self.open.is_empty() {
            self.close();
        }
        self.out
    }

    fn tag(&mut self, name: &str, attributes: &[(&str, &str)], empty: bool) {
        self.out.push('<');
        self.out.push_str(name);
        for (key, value) in attributes {
            self.out.push(' ');
            self.out.push_str(key);
            self.out.push_str("=\"");
            self.out.push_str(&escape_attribute(value));
            self.out.push('"');
        }
        self.out.push_str(if empty { "/>\n" } else { ">\n" });
    }
}

pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Shortest round-trip decimal; `nan`, `inf` and `-inf` for non-finite values.
///
/// Integral values print without a fractional part (`5`, not `5.0`) and small
/// magnitudes stay positional (`0.0000001`, not `1e-07`). Host parsers read
/// both forms, so this output is intentional.
pub fn fmt_number(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value == f64::INFINITY {
        "inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_element_per_line() {
        let mut xml = XmlWriter::new();
        xml.open("columns", &[]).open("column", &[("id", "1"), ("nickname", "a<b & \"c\"")]);
        xml.empty("bounds", &[("lb", "0.1"), ("ub", "0.2")]);

        assert_eq!(
            xml.finish(),
            concat!(
                "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n",
                "<columns>\n",
                "<column id=\"1\" nickname=\"a&lt;b &amp; &quot;c&quot;\">\n",
                "<bounds lb=\"0.1\" ub=\"0.2\"/>\n",
                "</column>\n",
                "</columns>\n",
            )
        );
    }

    #[test]
    fn numbers_round_trip() {
        assert_eq!(fmt_number(798.6390840260021), "798.6390840260021");
        assert_eq!(fmt_number(0.5), "0.5");
        assert_eq!(fmt_number(5.0), "5");
        assert_eq!(fmt_number(1e-7), "0.0000001");
        assert_eq!(fmt_number(f64::NAN), "nan");
        assert_eq!(fmt_number(f64::NEG_INFINITY), "-inf");
    }
}

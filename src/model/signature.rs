//! Generic signature scanning and rewriting.
//!
//! Signatures are walked with a small recursive-descent parser so that type
//! variable names and inner-class suffixes are never mistaken for class names.

use super::descriptor::JAVA_LANG_OBJECT;

/// Internal names of every class mentioned in a signature.
///
/// Inner-class suffixes resolve to their binary names, so
/// `Lpkg/Outer<TT;>.Inner;` yields `pkg/Outer$Inner`.
pub fn class_names(signature: &str) -> Vec<String> {
    let mut names = Vec::new();
    walk(signature, &mut |name| {
        names.push(name.to_string());
        false
    });
    names
}

/// Rewrite class types for which `replace` answers true to `java/lang/Object`.
///
/// Returns `None` when nothing changed or the signature cannot be parsed.
pub fn rewrite(signature: &str, replace: &mut dyn FnMut(&str) -> bool) -> Option<String> {
    let mut changed = false;
    let rewritten = walk(signature, &mut |name| {
        let hit = replace(name);
        changed |= hit;
        hit
    })?;
    changed.then_some(rewritten)
}

/// Walk a signature, calling `visit` with the binary name of each class type.
/// A `true` answer replaces the whole class type.
fn walk(signature: &str, visit: &mut dyn FnMut(&str) -> bool) -> Option<String> {
    let mut parser = Parser {
        input: signature.as_bytes(),
        source: signature,
        pos: 0,
        out: String::with_capacity(signature.len()),
        visit,
    };
    parser.signature()?;
    Some(parser.out)
}

struct Parser<'a, 'v> {
    input: &'a [u8],
    source: &'a str,
    pos: usize,
    out: String,
    visit: &'v mut dyn FnMut(&str) -> bool,
}

impl Parser<'_, '_> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.out.push(c as char);
        self.pos += 1;
        Some(c)
    }

    fn expect(&mut self, c: u8) -> Option<()> {
        (self.bump()? == c).then_some(())
    }

    fn identifier(&mut self, stops: &[u8]) -> Option<&str> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if stops.contains(&c) {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        Some(&self.source[start..self.pos])
    }

    fn signature(&mut self) -> Option<()> {
        if self.peek() == Some(b'<') {
            self.type_parameters()?;
        }
        if self.peek() == Some(b'(') {
            self.bump();
            while self.peek()? != b')' {
                self.java_type()?;
            }
            self.bump();
            self.java_type()?;
            while self.peek() == Some(b'^') {
                self.bump();
                self.java_type()?;
            }
        } else {
            while self.peek().is_some() {
                self.java_type()?;
            }
        }
        (self.pos == self.input.len()).then_some(())
    }

    fn type_parameters(&mut self) -> Option<()> {
        self.expect(b'<')?;
        while self.peek()? != b'>' {
            let name = self.identifier(b":")?.to_string();
            self.out.push_str(&name);
            self.expect(b':')?;
            if !matches!(self.peek(), Some(b':')) {
                self.java_type()?;
            }
            while self.peek() == Some(b':') {
                self.bump();
                self.java_type()?;
            }
        }
        self.expect(b'>')
    }

    fn java_type(&mut self) -> Option<()> {
        match self.peek()? {
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b'V' => {
                self.bump();
                Some(())
            }
            b'[' => {
                self.bump();
                self.java_type()
            }
            b'T' => {
                self.bump();
                let name = self.identifier(b";")?.to_string();
                self.out.push_str(&name);
                self.expect(b';')
            }
            b'L' => self.class_type(),
            _ => None,
        }
    }

    fn class_type(&mut self) -> Option<()> {
        let mark = self.out.len();
        self.expect(b'L')?;
        let mut binary_name = self.identifier(b"<.;")?.to_string();
        self.out.push_str(&binary_name);
        if self.peek() == Some(b'<') {
            self.type_arguments()?;
        }
        while self.peek() == Some(b'.') {
            self.bump();
            let inner = self.identifier(b"<.;")?.to_string();
            self.out.push_str(&inner);
            binary_name.push('$');
            binary_name.push_str(&inner);
            if self.peek() == Some(b'<') {
                self.type_arguments()?;
            }
        }
        self.expect(b';')?;

        if (self.visit)(&binary_name) {
            self.out.truncate(mark);
            self.out.push('L');
            self.out.push_str(JAVA_LANG_OBJECT);
            self.out.push(';');
        }
        Some(())
    }

    fn type_arguments(&mut self) -> Option<()> {
        self.expect(b'<')?;
        while self.peek()? != b'>' {
            match self.peek()? {
                b'*' => {
                    self.bump();
                }
                b'+' | b'-' => {
                    self.bump();
                    self.java_type()?;
                }
                _ => self.java_type()?,
            }
        }
        self.expect(b'>')
    }
}

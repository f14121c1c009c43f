//! Structure block walker.
//!
//! [`StructIter`] turns the token stream of a blob into a flat sequence of
//! [`StructItem`]s. It checks nesting as it goes: the stream must open with
//! the root node, every `EndNode` must close an open node and `End` may only
//! follow the root's `EndNode`. NOP tokens are skipped.

use log::error;

use crate::{
    FdtError, Token,
    data::{Reader, string_at},
};

/// Deepest node nesting the walker accepts.
pub const MAX_DEPTH: usize = 64;

/// One element of the structure block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructItem<'a> {
    /// A node starts; its properties and children follow.
    BeginNode(&'a str),
    /// A property of the innermost open node.
    Property {
        /// Property name, resolved through the strings block
        name: &'a str,
        /// Raw value bytes
        data: &'a [u8],
    },
    /// The innermost open node ends.
    EndNode,
}

/// Iterator over the structure block of a blob.
///
/// Yields `Err` at most once; iteration stops after an error.
pub struct StructIter<'a> {
    reader: Reader<'a>,
    strings: &'a [u8],
    open: heapless::Vec<&'a str, MAX_DEPTH>,
    started: bool,
    finished: bool,
}

impl<'a> StructIter<'a> {
    /// Walks the structure block starting at `reader`, resolving names in
    /// `strings`.
    pub fn new(reader: Reader<'a>, strings: &'a [u8]) -> Self {
        Self {
            reader,
            strings,
            open: heapless::Vec::new(),
            started: false,
            finished: false,
        }
    }

    /// Number of currently open nodes.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Name of the innermost open node, if any.
    pub fn current_node(&self) -> Option<&'a str> {
        self.open.last().copied()
    }

    fn fail(&mut self, err: FdtError) -> Option<Result<StructItem<'a>, FdtError>> {
        error!("FDT structure error: {}", err);
        self.finished = true;
        Some(Err(err))
    }

    fn bad_token(&self, token: Token) -> FdtError {
        FdtError::BadStructure {
            token: token.into(),
            pos: self.reader.position() - 4,
        }
    }

    fn read_property(&mut self) -> Result<StructItem<'a>, FdtError> {
        let len = self.reader.read_u32()? as usize;
        let nameoff = self.reader.read_u32()? as usize;
        let data = self.reader.read_bytes(len)?;
        self.reader.align()?;
        let name = string_at(self.strings, nameoff)?;
        Ok(StructItem::Property { name, data })
    }
}

impl<'a> Iterator for StructIter<'a> {
    type Item = Result<StructItem<'a>, FdtError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let token = match self.reader.read_token() {
                Ok(token) => token,
                Err(e) => return self.fail(e),
            };

            match token {
                Token::Nop => continue,
                Token::BeginNode => {
                    if self.started && self.open.is_empty() {
                        // A second top-level node.
                        let err = self.bad_token(token);
                        return self.fail(err);
                    }
                    let name = match self.reader.read_padded_str() {
                        Ok(name) => name,
                        Err(e) => return self.fail(e),
                    };
                    if self.open.push(name).is_err() {
                        return self.fail(FdtError::InvalidInput);
                    }
                    self.started = true;
                    return Some(Ok(StructItem::BeginNode(name)));
                }
                Token::Prop if !self.open.is_empty() => {
                    return match self.read_property() {
                        Ok(item) => Some(Ok(item)),
                        Err(e) => self.fail(e),
                    };
                }
                Token::EndNode if !self.open.is_empty() => {
                    self.open.pop();
                    return Some(Ok(StructItem::EndNode));
                }
                Token::End if self.started && self.open.is_empty() => {
                    self.finished = true;
                    return None;
                }
                other => {
                    let err = self.bad_token(other);
                    return self.fail(err);
                }
            }
        }
    }
}

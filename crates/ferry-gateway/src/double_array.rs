//! Double-array trie over field paths.
//!
//! Routes use it to find query parameters that name a field already bound
//! from the path or the body: such a parameter is a path that has one of
//! the filter's sequences as a prefix.

use std::collections::HashMap;

/// A read-only double-array trie of token sequences
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoubleArray {
    /// Token -> code. The code `encoding.len()` terminates a sequence.
    encoding: HashMap<String, usize>,
    base: Vec<usize>,
    check: Vec<usize>,
}

/// A node while building: rows `left..right` of the sorted sequences share
/// a prefix up to column `col`.
#[derive(Debug, Clone, Copy)]
struct Node {
    row: usize,
    col: Option<usize>,
    left: usize,
    right: usize,
}

impl Node {
    fn value(&self, seqs: &[Vec<usize>]) -> usize {
        match self.col {
            Some(col) => seqs[self.row][col],
            None => 0,
        }
    }

    fn next_col(&self) -> usize {
        self.col.map_or(0, |c| c + 1)
    }

    fn children(&self, seqs: &[Vec<usize>]) -> Vec<Node> {
        let col = self.next_col();
        let mut result: Vec<Node> = Vec::new();
        for i in self.left..self.right {
            let value = seqs[i][col];
            if let Some(last) = result.last_mut() {
                if seqs[last.row][col] == value {
                    continue;
                }
                last.right = i;
            }
            result.push(Node {
                row: i,
                col: Some(col),
                left: i,
                right: self.right,
            });
        }
        result
    }
}

impl DoubleArray {
    /// Build the trie from token sequences, e.g. `[["item"], ["id"]]`
    pub fn new<S: AsRef<str>>(seqs: &[&[S]]) -> Self {
        let mut da = DoubleArray::default();
        if seqs.is_empty() {
            return da;
        }

        let mut encoded = da.register_tokens(seqs);
        encoded.sort();

        let root = Node {
            row: 0,
            col: None,
            left: 0,
            right: encoded.len(),
        };
        da.add_seqs(&encoded, 0, root);

        while da.check.last() == Some(&0) {
            da.check.pop();
            da.base.pop();
        }
        da
    }

    /// Rebuild a trie from its serialized parts
    pub fn from_parts(encoding: HashMap<String, usize>, base: Vec<usize>, check: Vec<usize>) -> Self {
        Self {
            encoding,
            base,
            check,
        }
    }

    pub fn encoding(&self) -> &HashMap<String, usize> {
        &self.encoding
    }

    pub fn base(&self) -> &[usize] {
        &self.base
    }

    pub fn check(&self) -> &[usize] {
        &self.check
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// Whether some registered sequence is a prefix of `seq`
    pub fn has_common_prefix<S: AsRef<str>>(&self, seq: &[S]) -> bool {
        if self.base.is_empty() {
            return false;
        }

        let mut i = 0usize;
        for token in seq {
            let Some(&code) = self.encoding.get(token.as_ref()) else {
                break;
            };
            let j = self.base[i] + code;
            if self.check.get(j) != Some(&(i + 1)) {
                break;
            }
            i = j;
        }

        let j = self.base[i] + self.terminator();
        self.check.get(j) == Some(&(i + 1))
    }

    fn terminator(&self) -> usize {
        self.encoding.len()
    }

    fn register_tokens<S: AsRef<str>>(&mut self, seqs: &[&[S]]) -> Vec<Vec<usize>> {
        let mut result: Vec<Vec<usize>> = seqs
            .iter()
            .map(|seq| {
                seq.iter()
                    .map(|token| {
                        let next = self.encoding.len();
                        *self.encoding.entry(token.as_ref().to_string()).or_insert(next)
                    })
                    .collect()
            })
            .collect();

        let terminator = self.terminator();
        for seq in &mut result {
            seq.push(terminator);
        }
        result
    }

    fn add_seqs(&mut self, seqs: &[Vec<usize>], pos: usize, node: Node) {
        self.ensure_size(pos);

        let children = node.children(seqs);
        let mut offset = 1usize;
        loop {
            let free = children.iter().all(|child| {
                let j = offset + child.value(seqs);
                self.ensure_size(j);
                self.check[j] == 0
            });
            if free {
                break;
            }
            offset += 1;
        }

        self.base[pos] = offset;
        for child in &children {
            self.check[offset + child.value(seqs)] = pos + 1;
        }

        let terminator = self.terminator();
        for child in &children {
            let code = child.value(seqs);
            if code != terminator {
                self.add_seqs(seqs, offset + code, *child);
            }
        }
    }

    fn ensure_size(&mut self, i: usize) {
        while i >= self.base.len() {
            let grow = self.base.len() + 1;
            self.base.resize(self.base.len() + grow, 0);
            self.check.resize(self.check.len() + grow, 0);
        }
    }
}

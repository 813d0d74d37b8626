pub mod error;
pub mod sequence;

use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use bit_vec::BitVec;
use log::debug;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::sequence::{SequenceStore, Symbol};

pub type NodeId = usize;

const ROOT: NodeId = 0;

struct Node {
    suffix_link: Option<NodeId>,
    depth: usize,
}

/// An edge labelled with the stream positions `start..=end`. Labels are
/// position ranges, never owned substrings; leaf edges end at their own
/// input's terminator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Edge {
    start: usize,
    end: usize,
    source: NodeId,
    target: NodeId,
}

impl Edge {
    fn length(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Owns the nodes and the edge index. Nodes are addressed by dense
/// indices into a flat vector; edges are keyed by the source node and
/// the first symbol of their label.
struct TreeStore {
    nodes: Vec<Node>,
    edges: HashMap<(NodeId, Symbol), Edge>,
}

impl TreeStore {
    fn new() -> TreeStore {
        TreeStore {
            nodes: vec![Node { suffix_link: None, depth: 0 }],
            edges: HashMap::new(),
        }
    }

    fn new_node(&mut self) -> NodeId {
        self.nodes.push(Node { suffix_link: None, depth: 0 });
        self.nodes.len() - 1
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn depth(&self, node: NodeId) -> usize {
        self.nodes[node].depth
    }

    fn set_depth(&mut self, node: NodeId, depth: usize) {
        self.nodes[node].depth = depth;
    }

    fn suffix_link(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].suffix_link
    }

    /// Links to the root stay implicit: the follower reads a missing
    /// link as a link to the root.
    fn set_suffix_link(&mut self, node: NodeId, target: NodeId) {
        if target != ROOT {
            self.nodes[node].suffix_link = Some(target);
        }
    }

    fn get_edge(&self, source: NodeId, first: Symbol) -> Option<Edge> {
        self.edges.get(&(source, first)).copied()
    }

    fn put_edge(&mut self, first: Symbol, edge: Edge) -> Result<()> {
        match self.edges.entry((edge.source, first)) {
            Entry::Occupied(_) => Err(Error::DuplicateEdgeKey {
                node: edge.source,
                symbol: first,
            }),
            Entry::Vacant(slot) => {
                slot.insert(edge);
                Ok(())
            }
        }
    }

    fn remove_edge(&mut self, source: NodeId, first: Symbol) -> Result<Edge> {
        self.edges
            .remove(&(source, first))
            .ok_or(Error::MissingEdge { node: source, symbol: first })
    }

    fn iter_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }
}

/// The point where the next symbol will be inserted: start at `base`,
/// walk the symbols `S[head..stop]` down the edge beginning with
/// `S[head]`. Explicit when the span is empty. `head` may transiently
/// run one past `stop` inside an extension; the length saturates to
/// zero there, which is exactly the explicit case.
#[derive(Debug, Copy, Clone)]
struct ActivePoint {
    base: NodeId,
    head: usize,
    stop: usize,
}

impl ActivePoint {
    fn length(&self) -> usize {
        self.stop.saturating_sub(self.head)
    }

    fn is_explicit(&self) -> bool {
        self.stop <= self.head
    }
}

/// Ukkonen construction state. Strictly sequential; consumed by `run`.
struct Construction<'s> {
    seq: &'s SequenceStore,
    tree: TreeStore,
    active: ActivePoint,
    phase_end: usize,
}

impl<'s> Construction<'s> {
    fn new(seq: &'s SequenceStore) -> Construction<'s> {
        Construction {
            seq,
            tree: TreeStore::new(),
            active: ActivePoint { base: ROOT, head: 0, stop: 0 },
            phase_end: 0,
        }
    }

    fn run(mut self) -> Result<TreeStore> {
        let mut segment_start = 0;
        for k in 0..self.seq.input_count() {
            self.phase_end = self.seq.terminator_position(k);
            debug!(
                "input {}: extending over positions {}..={}",
                k, segment_start, self.phase_end
            );
            for i in segment_start..=self.phase_end {
                self.extend(i)?;
            }
            segment_start = self.phase_end + 1;
        }
        Ok(self.tree)
    }

    /// Insert the symbol at position `i`, adding one leaf per suffix of
    /// `S[..=i]` that is not yet present, longest first.
    fn extend(&mut self, i: usize) -> Result<()> {
        let next = self.seq.at(i);
        // A split node from an earlier iteration of this extension,
        // awaiting its suffix link. Nodes from earlier extensions
        // already carry theirs and are never re-linked.
        let mut pending: Option<NodeId> = None;

        loop {
            let parent;
            if self.active.is_explicit() {
                if self.tree.get_edge(self.active.base, next).is_some() {
                    break;
                }
                parent = self.active.base;
            } else {
                let first = self.seq.at(self.active.head);
                let edge = self
                    .tree
                    .get_edge(self.active.base, first)
                    .ok_or(Error::MissingEdge {
                        node: self.active.base,
                        symbol: first,
                    })?;
                let past_point = self.seq.symbol(edge.start + self.active.length())?;
                if past_point == next {
                    break;
                }
                parent = self.split_edge(edge)?;
            }

            let leaf = self.tree.new_node();
            let edge = Edge {
                start: i,
                end: self.phase_end,
                source: parent,
                target: leaf,
            };
            self.tree.set_depth(leaf, self.tree.depth(parent) + edge.length());
            self.tree.put_edge(next, edge)?;

            if let Some(node) = pending.take() {
                self.tree.set_suffix_link(node, parent);
            }
            if parent != self.active.base {
                // `parent` is the split node created above.
                pending = Some(parent);
            }

            // Advance to the next shorter suffix.
            if self.active.base == ROOT {
                self.active.head += 1;
            } else {
                self.active.base = self.tree.suffix_link(self.active.base).unwrap_or(ROOT);
            }
            self.canonicalize()?;
        }

        if let Some(node) = pending.take() {
            self.tree.set_suffix_link(node, self.active.base);
        }
        self.active.stop += 1;
        self.canonicalize()?;
        Ok(())
    }

    /// Split `edge` at the active point: one new internal node, the old
    /// edge shortened to hang below it.
    fn split_edge(&mut self, edge: Edge) -> Result<NodeId> {
        let span = self.active.length();
        let mid = self.tree.new_node();
        self.tree.set_depth(mid, self.tree.depth(edge.source) + span);

        let first = self.seq.symbol(edge.start)?;
        self.tree.remove_edge(edge.source, first)?;
        self.tree.put_edge(
            first,
            Edge {
                start: edge.start,
                end: edge.start + span - 1,
                source: edge.source,
                target: mid,
            },
        )?;

        let rest_first = self.seq.symbol(edge.start + span)?;
        self.tree.put_edge(
            rest_first,
            Edge {
                start: edge.start + span,
                end: edge.end,
                source: mid,
                target: edge.target,
            },
        )?;

        Ok(mid)
    }

    /// Walk the active point down across whole edges until it lies
    /// strictly within one edge or exactly at a node.
    fn canonicalize(&mut self) -> Result<()> {
        while !self.active.is_explicit() {
            let first = self.seq.symbol(self.active.head)?;
            let edge = self
                .tree
                .get_edge(self.active.base, first)
                .ok_or(Error::MissingEdge {
                    node: self.active.base,
                    symbol: first,
                })?;
            if edge.length() > self.active.length() {
                break;
            }
            self.active.head += edge.length();
            self.active.base = edge.target;
        }
        Ok(())
    }
}

/// Accumulates input sequences, then builds the tree in one pass.
///
/// # Examples
/// ```
/// use strand_tree::TreeBuilder;
///
/// let mut builder = TreeBuilder::new();
/// builder.add_sequence(b"abcde");
/// builder.add_sequence(b"cdefg");
/// let tree = builder.build().unwrap();
/// assert_eq!(tree.longest_common().unwrap().0, 3);
/// ```
pub struct TreeBuilder<'a> {
    inputs: Vec<&'a [u8]>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new() -> TreeBuilder<'a> {
        TreeBuilder { inputs: Vec::new() }
    }

    /// Appends one input. Order is significant: the input's index is
    /// reported in query results.
    pub fn add_sequence(&mut self, input: &'a [u8]) {
        self.inputs.push(input);
    }

    pub fn build(self) -> Result<SuffixTree> {
        let seq = SequenceStore::from_inputs(&self.inputs);
        let tree = Construction::new(&seq).run()?;
        debug!(
            "built tree over {} symbols: {} nodes, {} edges",
            seq.len(),
            tree.node_count(),
            tree.edge_count()
        );
        Ok(SuffixTree { seq, tree })
    }
}

impl<'a> Default for TreeBuilder<'a> {
    fn default() -> TreeBuilder<'a> {
        TreeBuilder::new()
    }
}

/// A generalized suffix tree over several byte sequences, write-once.
/// Queries take `&self` and may run concurrently once built.
pub struct SuffixTree {
    seq: SequenceStore,
    tree: TreeStore,
}

impl SuffixTree {
    pub fn from_sequences(inputs: &[&[u8]]) -> Result<SuffixTree> {
        let mut builder = TreeBuilder::new();
        for input in inputs {
            builder.add_sequence(input);
        }
        builder.build()
    }

    pub fn input_count(&self) -> usize {
        self.seq.input_count()
    }

    /// Byte length of input `k`, excluding its terminator.
    pub fn input_len(&self, k: usize) -> usize {
        self.seq.input_len(k)
    }

    pub fn node_count(&self) -> usize {
        self.tree.node_count()
    }

    /// The longest contiguous byte sequence appearing in at least two
    /// inputs, as `(length, occurrences)`. Each occurrence is
    /// `(input index, signed offset)`; the start position within the
    /// input is `input_len(k) + offset`. At most one occurrence per
    /// input is listed, and at least two inputs are always present.
    /// Returns `None` when the inputs share no byte sequence.
    ///
    /// # Examples
    /// ```
    /// use strand_tree::SuffixTree;
    ///
    /// let tree = SuffixTree::from_sequences(&[b"hello", b"yellow"]).unwrap();
    /// let (length, occurrences) = tree.longest_common().unwrap();
    /// assert_eq!(length, 4);
    /// for (k, offset) in occurrences {
    ///     let start = (tree.input_len(k) as isize + offset) as usize;
    ///     assert_eq!(start, 1); // "ello" in both inputs
    /// }
    /// ```
    pub fn longest_common(&self) -> Option<(usize, Vec<(usize, isize)>)> {
        let input_count = self.seq.input_count();
        let node_count = self.tree.node_count();

        // Which inputs have a leaf below each node: a terminal edge
        // seeds its leaf with the input whose terminator it carries,
        // then children fold into parents, deepest first.
        let mut parent: Vec<Option<NodeId>> = vec![None; node_count];
        let mut reach: Vec<BitVec> = vec![BitVec::from_elem(input_count, false); node_count];
        for edge in self.tree.iter_edges() {
            parent[edge.target] = Some(edge.source);
            if let Some(k) = self.seq.terminator_index(edge.end) {
                reach[edge.target].set(k, true);
            }
        }
        let mut order: Vec<NodeId> = (0..node_count).collect();
        order.sort_by_key(|&node| Reverse(self.tree.depth(node)));
        for &node in &order {
            if let Some(up) = parent[node] {
                let folded = std::mem::replace(&mut reach[node], BitVec::new());
                reach[up].union(&folded);
                reach[node] = folded;
            }
        }

        let best = (0..node_count)
            .filter(|&node| self.tree.depth(node) > 0)
            .filter(|&node| reach[node].iter().filter(|&b| b).count() >= 2)
            .max_by_key(|&node| self.tree.depth(node))?;
        let depth = self.tree.depth(best);

        // One occurrence per input reaching the witness node. A leaf of
        // input k at depth d stands for the suffix starting
        // `d - 1` symbols before k's terminator, so the witness label
        // starts at signed offset `-(d - 1)` within input k.
        let children = self.children_map();
        let mut seen = BitVec::from_elem(input_count, false);
        let mut occurrences = Vec::new();
        let mut stack = vec![best];
        while let Some(node) = stack.pop() {
            for edge in children.get(&node).into_iter().flatten() {
                if let Some(k) = self.seq.terminator_index(edge.end) {
                    if !seen[k] {
                        seen.set(k, true);
                        occurrences.push((k, -((self.tree.depth(edge.target) - 1) as isize)));
                    }
                }
                stack.push(edge.target);
            }
        }

        debug!(
            "longest common strand: length {}, {} occurrences",
            depth,
            occurrences.len()
        );
        Some((depth, occurrences))
    }

    /// Renders the tree for debugging. Printable bytes appear as
    /// themselves, other bytes as `\xNN`, and the terminator of input
    /// `k` as `$k`. Children are ordered bytes first (ascending), then
    /// terminators (ascending), so the output is deterministic.
    pub fn pretty_print(&self) -> String {
        let mut children = self.children_map();
        for edges in children.values_mut() {
            edges.sort_by_key(|e| match self.seq.at(e.start) {
                Symbol::Byte(b) => (0, b as usize),
                Symbol::Terminator(k) => (1, k),
            });
        }

        self.render(&children, ROOT, String::new()).join("\n")
    }

    fn children_map(&self) -> HashMap<NodeId, SmallVec<[Edge; 4]>> {
        let mut children: HashMap<NodeId, SmallVec<[Edge; 4]>> = HashMap::new();
        for &edge in self.tree.iter_edges() {
            children.entry(edge.source).or_default().push(edge);
        }
        children
    }

    fn render(
        &self,
        children: &HashMap<NodeId, SmallVec<[Edge; 4]>>,
        node: NodeId,
        label: String,
    ) -> Vec<String> {
        let edges = match children.get(&node) {
            Some(edges) => edges,
            None => return vec![label],
        };

        let indent = " ".repeat(label.chars().count());
        let mut lines = Vec::new();
        for (i, edge) in edges.iter().enumerate() {
            let rendered = self.render(children, edge.target, self.edge_label(edge));
            for (j, line) in rendered.into_iter().enumerate() {
                let line = match (i, j) {
                    (0, 0) => format!("{}┳{}", label, line),
                    (_, 0) if i < edges.len() - 1 => format!("{}┣{}", indent, line),
                    (_, _) if i < edges.len() - 1 => format!("{}┃{}", indent, line),
                    (_, 0) => format!("{}┗{}", indent, line),
                    (_, _) => format!("{} {}", indent, line),
                };
                lines.push(line);
            }
        }
        lines
    }

    fn edge_label(&self, edge: &Edge) -> String {
        let mut label = String::new();
        for i in edge.start..=edge.end {
            match self.seq.at(i) {
                Symbol::Byte(b) if b.is_ascii_graphic() => label.push(b as char),
                Symbol::Byte(b) => label.push_str(&format!("\\x{:02x}", b)),
                Symbol::Terminator(k) => label.push_str(&format!("${}", k)),
            }
        }
        label
    }
}

/// Convenience over [`SuffixTree::longest_common`] that resolves the
/// first occurrence back to a slice of the input it came from.
///
/// # Examples
/// ```
/// use strand_tree::longest_common_strand;
///
/// let strand = longest_common_strand(&[b"testing", b"festung", b"estland"]).unwrap();
/// assert_eq!(strand.unwrap(), b"est");
/// ```
pub fn longest_common_strand<'a>(inputs: &[&'a [u8]]) -> Result<Option<&'a [u8]>> {
    let tree = SuffixTree::from_sequences(inputs)?;
    Ok(tree.longest_common().map(|(length, occurrences)| {
        let (k, offset) = occurrences[0];
        let start = (inputs[k].len() as isize + offset) as usize;
        &inputs[k][start..start + length]
    }))
}
